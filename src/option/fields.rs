//! Per-instance storage for an object's bindable fields.

use super::descriptor::{FieldKind, OptionDescriptor};
use super::value::{FieldHandler, FieldValue, Value};
use log::warn;

/// One field of an object: its static descriptor and current value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub descriptor: &'static OptionDescriptor,
    pub value: FieldValue,
}

/// Ordered field storage built from a class's option tables.
///
/// Tables are listed most-derived first, so a class's own options precede
/// the ones it inherits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionFields {
    slots: Vec<FieldSlot>,
}

impl OptionFields {
    pub fn from_tables(class_name: &str, tables: &'static [&'static [OptionDescriptor]]) -> Self {
        let slots = tables
            .iter()
            .flat_map(|table| table.iter())
            .map(|descriptor| FieldSlot {
                descriptor,
                value: initial_value(class_name, descriptor),
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSlot> {
        self.slots.iter()
    }

    pub fn slot(&self, index: usize) -> Option<&FieldSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FieldSlot> {
        self.slots.get_mut(index)
    }

    /// First field with the given option name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.slots
            .iter()
            .find(|slot| slot.descriptor.name == name)
            .map(|slot| &slot.value)
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_scalar)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.scalar(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.scalar(name).and_then(Value::as_i64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.scalar(name).and_then(Value::as_str)
    }

    /// Elements of a collection field, empty for any other shape.
    pub fn get_list(&self, name: &str) -> &[Value] {
        match self.get(name) {
            Some(FieldValue::Collection(items)) => items,
            _ => &[],
        }
    }

    /// Overwrite a field directly, bypassing update rules.
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        match self.slots.iter_mut().find(|slot| slot.descriptor.name == name) {
            Some(slot) => {
                slot.value = value;
                true
            }
            None => false,
        }
    }
}

impl FieldSlot {
    /// True when a scalar field still holds its declared default.
    pub fn holds_default(&self) -> bool {
        match (&self.value, default_value(self.descriptor)) {
            (FieldValue::Scalar(Some(current)), Some(default)) => *current == default,
            _ => false,
        }
    }
}

fn default_value(descriptor: &OptionDescriptor) -> Option<Value> {
    let (Some(text), FieldKind::Scalar(_)) = (descriptor.default, descriptor.kind) else {
        return None;
    };
    FieldHandler::for_kind(&descriptor.kind, descriptor.is_time_val)
        .and_then(|handler| handler.value_handler().translate(text))
}

fn initial_value(class_name: &str, descriptor: &OptionDescriptor) -> FieldValue {
    match (default_value(descriptor), descriptor.default) {
        (Some(value), _) => FieldValue::Scalar(Some(value)),
        (None, Some(text)) if matches!(descriptor.kind, FieldKind::Scalar(_)) => {
            warn!(
                "Ignoring default '{}' for option '{}' in class '{}': not a valid value",
                text, descriptor.name, class_name
            );
            FieldValue::empty(&descriptor.kind)
        }
        _ => FieldValue::empty(&descriptor.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::descriptor::ValueType;

    const BASE: &[OptionDescriptor] =
        &[OptionDescriptor::new("base-flag", FieldKind::Scalar(ValueType::Bool)).default_value("true")];
    const OWN: &[OptionDescriptor] = &[
        OptionDescriptor::new("count", FieldKind::Scalar(ValueType::Int)).default_value("4"),
        OptionDescriptor::new("names", FieldKind::Collection(ValueType::Str)),
        OptionDescriptor::new("broken", FieldKind::Scalar(ValueType::Int)).default_value("four"),
    ];
    const TABLES: &[&[OptionDescriptor]] = &[OWN, BASE];

    #[test]
    fn test_defaults_and_order() {
        let fields = OptionFields::from_tables("com.example.Sample", TABLES);
        let names: Vec<&str> = fields.iter().map(|s| s.descriptor.name).collect();
        assert_eq!(names, vec!["count", "names", "broken", "base-flag"]);
        assert_eq!(fields.get_i64("count"), Some(4));
        assert_eq!(fields.get_bool("base-flag"), Some(true));
        assert!(fields.get_list("names").is_empty());
    }

    #[test]
    fn test_invalid_default_is_unset() {
        let fields = OptionFields::from_tables("com.example.Sample", TABLES);
        assert_eq!(fields.get("broken"), Some(&FieldValue::Scalar(None)));
    }

    #[test]
    fn test_direct_set() {
        let mut fields = OptionFields::from_tables("com.example.Sample", TABLES);
        assert!(fields.set("count", FieldValue::Scalar(Some(Value::Int(9)))));
        assert!(!fields.set("missing", FieldValue::Scalar(None)));
        assert_eq!(fields.get_i64("count"), Some(9));
    }

    #[test]
    fn test_holds_default() {
        let mut fields = OptionFields::from_tables("com.example.Sample", TABLES);
        let holds = |fields: &OptionFields, name: &str| {
            fields.iter().find(|s| s.descriptor.name == name).map(FieldSlot::holds_default)
        };
        assert_eq!(holds(&fields, "count"), Some(true));
        assert_eq!(holds(&fields, "names"), Some(false));
        assert_eq!(holds(&fields, "broken"), Some(false));

        fields.set("count", FieldValue::Scalar(Some(Value::Int(5))));
        assert_eq!(holds(&fields, "count"), Some(false));
        fields.set("count", FieldValue::Scalar(Some(Value::Int(4))));
        assert_eq!(holds(&fields, "count"), Some(true));
    }
}
