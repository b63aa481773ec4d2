//! Option metadata, typed values and the field binder.

pub mod descriptor;
pub mod fields;
pub mod help;
pub mod setter;
pub mod time_val;
pub mod value;

pub use descriptor::{
    FieldKind, Importance, OptionDescriptor, UpdateRule, ValueType, BOOL_FALSE_PREFIX,
    NAMESPACE_SEPARATOR,
};
pub use fields::{FieldSlot, OptionFields};
pub use help::{option_help, render_value};
pub use setter::{is_negated_name, Binding, FieldDef, Incoming, OptionSetter, OptionSource};
pub use value::{split_key_value, FieldHandler, FieldValue, Handler, Value};
