//! Declaration documents and the definitions parsed from them.

pub mod cache;
pub mod loader;
pub mod locator;
pub mod model;
pub mod reader;

pub use cache::{ConfigId, DefinitionCache};
pub use loader::DefinitionLoader;
pub use locator::{BundledResources, DocumentLocator, DocumentSource, LocatedDocument, ResourceLoader};
pub use model::{ConfigObjectDef, Definition, OptionDef, SourceStamp, DEFAULT_DEVICE_NAME};
