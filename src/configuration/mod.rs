//! Resolved configurations: roles, device bundles, the object store and the
//! resolver that builds it from a definition.

pub mod device;
pub mod resolver;
pub mod role;
pub mod store;
pub mod usage;
pub mod xml_dump;

pub use device::DeviceConfiguration;
pub use resolver::ObjectGraphResolver;
pub use role::{is_reserved_type_name, Role, DEVICE_TYPE_NAME};
pub use store::{Configuration, PlacedObject, COMMAND_LINE_SOURCE, INJECTED_SOURCE};
pub use usage::{JsonValue, ObjectUsage, OptionUsage};
