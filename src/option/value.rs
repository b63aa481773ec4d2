//! Option values and the handlers that coerce text into them.

use super::descriptor::{FieldKind, ValueType};
use super::time_val::{format_time_val_millis, parse_time_val, parse_time_val_millis};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A single typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    File(PathBuf),
    Duration(Duration),
    Enum(String),
}

impl Value {
    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::File(_) => "file",
            Value::Duration(_) => "time",
            Value::Enum(_) => "enum",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(v) | Value::Enum(v) => f.write_str(v),
            Value::File(v) => write!(f, "{}", v.display()),
            Value::Duration(v) => {
                let millis = u64::try_from(v.as_millis()).unwrap_or(u64::MAX);
                f.write_str(&format_time_val_millis(millis))
            }
        }
    }
}

/// Current contents of a bindable field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Option<Value>),
    Collection(Vec<Value>),
    /// Insertion-ordered entries with unique keys.
    Map(Vec<(Value, Value)>),
}

impl FieldValue {
    /// Empty value for a field of the given shape.
    pub fn empty(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar(_) => FieldValue::Scalar(None),
            FieldKind::Collection(_) => FieldValue::Collection(Vec::new()),
            FieldKind::Map(..) => FieldValue::Map(Vec::new()),
        }
    }

    /// True when the field holds nothing: a null scalar or an empty collection or map.
    pub fn is_unset(&self) -> bool {
        match self {
            FieldValue::Scalar(v) => v.is_none(),
            FieldValue::Collection(items) => items.is_empty(),
            FieldValue::Map(entries) => entries.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => v.as_ref(),
            _ => None,
        }
    }

    /// Put `value` under `key`, replacing any existing entry in place.
    pub fn map_put(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn map_get<'v>(&'v self, key: &Value) -> Option<&'v Value> {
        match self {
            FieldValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Coerces option text into a [`Value`] of one element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    /// A long holding milliseconds, parsed from a time value.
    TimeValLong,
    Float,
    Double,
    Str,
    File,
    Duration,
    Enum(&'static [&'static str]),
}

impl Handler {
    /// Handler for an element type, or `None` when the combination is unsupported.
    pub fn for_type(value_type: ValueType, is_time_val: bool) -> Option<Self> {
        let handler = match value_type {
            ValueType::Bool => Handler::Bool,
            ValueType::Byte => Handler::Byte,
            ValueType::Short => Handler::Short,
            ValueType::Int => Handler::Int,
            ValueType::Long if is_time_val => return Some(Handler::TimeValLong),
            ValueType::Long => Handler::Long,
            ValueType::Float => Handler::Float,
            ValueType::Double => Handler::Double,
            ValueType::Str => Handler::Str,
            ValueType::File => Handler::File,
            ValueType::TimeVal => Handler::Duration,
            ValueType::Enum(choices) => Handler::Enum(choices),
        };
        if is_time_val && handler != Handler::Duration {
            return None;
        }
        Some(handler)
    }

    /// Translate option text, returning `None` when it is not a valid value.
    pub fn translate(&self, text: &str) -> Option<Value> {
        match self {
            Handler::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(Value::Bool(true)),
                "false" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            Handler::Byte => text.parse().ok().map(Value::Byte),
            Handler::Short => text.parse().ok().map(Value::Short),
            Handler::Int => text.parse().ok().map(Value::Int),
            Handler::Long => text.parse().ok().map(Value::Long),
            Handler::TimeValLong => parse_time_val_millis(text)
                .ok()
                .and_then(|millis| i64::try_from(millis).ok())
                .map(Value::Long),
            Handler::Float => text.parse().ok().map(Value::Float),
            Handler::Double => text.parse().ok().map(Value::Double),
            Handler::Str => Some(Value::Str(text.to_string())),
            Handler::File => Some(Value::File(PathBuf::from(text))),
            Handler::Duration => parse_time_val(text).ok().map(Value::Duration),
            Handler::Enum(choices) => {
                let upper = text.to_ascii_uppercase();
                choices
                    .iter()
                    .find(|choice| **choice == text)
                    .or_else(|| choices.iter().find(|choice| **choice == upper))
                    .map(|choice| Value::Enum(choice.to_string()))
            }
        }
    }

    /// True if `value` is a value this handler could have produced.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Handler::Bool, Value::Bool(_))
            | (Handler::Byte, Value::Byte(_))
            | (Handler::Short, Value::Short(_))
            | (Handler::Int, Value::Int(_))
            | (Handler::Long | Handler::TimeValLong, Value::Long(_))
            | (Handler::Float, Value::Float(_))
            | (Handler::Double, Value::Double(_))
            | (Handler::Str, Value::Str(_))
            | (Handler::File, Value::File(_))
            | (Handler::Duration, Value::Duration(_)) => true,
            (Handler::Enum(choices), Value::Enum(name)) => choices.contains(&name.as_str()),
            _ => false,
        }
    }

    /// False only for booleans, which cannot carry the greatest or least rules.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Handler::Bool)
    }

    /// Compare two values produced by this handler.
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Byte(x), Value::Byte(y)) => Some(x.cmp(y)),
            (Value::Short(x), Value::Short(y)) => Some(x.cmp(y)),
            (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
            (Value::Long(x), Value::Long(y)) => Some(x.cmp(y)),
            (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
            (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
            (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
            (Value::File(x), Value::File(y)) => Some(x.cmp(y)),
            (Value::Duration(x), Value::Duration(y)) => Some(x.cmp(y)),
            (Value::Enum(x), Value::Enum(y)) => match self {
                Handler::Enum(choices) => {
                    let ordinal = |name: &str| choices.iter().position(|c| *c == name);
                    Some(ordinal(x)?.cmp(&ordinal(y)?))
                }
                _ => None,
            },
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Handler::Bool => "bool",
            Handler::Byte => "byte",
            Handler::Short => "short",
            Handler::Int => "int",
            Handler::Long => "long",
            Handler::TimeValLong => "time value",
            Handler::Float => "float",
            Handler::Double => "double",
            Handler::Str => "string",
            Handler::File => "file",
            Handler::Duration => "time",
            Handler::Enum(_) => "enum",
        }
    }

    pub fn enum_choices(&self) -> Option<&'static [&'static str]> {
        match self {
            Handler::Enum(choices) => Some(choices),
            _ => None,
        }
    }
}

/// Handlers for a field, one per element slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHandler {
    Scalar(Handler),
    Collection(Handler),
    Map(Handler, Handler),
}

impl FieldHandler {
    pub fn for_kind(kind: &FieldKind, is_time_val: bool) -> Option<Self> {
        Some(match *kind {
            FieldKind::Scalar(t) => FieldHandler::Scalar(Handler::for_type(t, is_time_val)?),
            FieldKind::Collection(t) => FieldHandler::Collection(Handler::for_type(t, is_time_val)?),
            FieldKind::Map(k, v) => FieldHandler::Map(
                Handler::for_type(k, false)?,
                Handler::for_type(v, is_time_val)?,
            ),
        })
    }

    /// Handler for the value slot.
    pub fn value_handler(&self) -> Handler {
        match self {
            FieldHandler::Scalar(h) | FieldHandler::Collection(h) => *h,
            FieldHandler::Map(_, v) => *v,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            FieldHandler::Scalar(h) => h.type_name().to_string(),
            FieldHandler::Collection(h) => format!("list<{}>", h.type_name()),
            FieldHandler::Map(k, v) => format!("map<{}, {}>", k.type_name(), v.type_name()),
        }
    }
}

/// Split `key=value` on the single unescaped `=`, unescaping `\=` in both halves.
///
/// Returns `None` unless exactly one unescaped `=` is present.
pub fn split_key_value(text: &str) -> Option<(String, String)> {
    let bytes = text.as_bytes();
    let mut split_at = None;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'=' && (i == 0 || bytes[i - 1] != b'\\') {
            if split_at.is_some() {
                return None;
            }
            split_at = Some(i);
        }
    }
    let at = split_at?;
    Some((unescape_equals(&text[..at]), unescape_equals(&text[at + 1..])))
}

/// Replace every `\=` with `=`.
pub fn unescape_equals(text: &str) -> String {
    text.replace("\\=", "=")
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLORS: &[&str] = &["RED", "GREEN", "BLUE"];

    #[test]
    fn test_bool_words() {
        for text in ["true", "TRUE", "yes", "Yes"] {
            assert_eq!(Handler::Bool.translate(text), Some(Value::Bool(true)), "{}", text);
        }
        for text in ["false", "no", "NO"] {
            assert_eq!(Handler::Bool.translate(text), Some(Value::Bool(false)), "{}", text);
        }
        assert_eq!(Handler::Bool.translate("maybe"), None);
    }

    #[test]
    fn test_numeric_ranges() {
        assert_eq!(Handler::Byte.translate("127"), Some(Value::Byte(127)));
        assert_eq!(Handler::Byte.translate("128"), None);
        assert_eq!(Handler::Short.translate("-3"), Some(Value::Short(-3)));
        assert_eq!(Handler::Int.translate("abc"), None);
        assert_eq!(Handler::Long.translate("9000000000"), Some(Value::Long(9_000_000_000)));
        assert_eq!(Handler::Double.translate("2.5"), Some(Value::Double(2.5)));
    }

    #[test]
    fn test_enum_exact_then_uppercase() {
        let handler = Handler::Enum(COLORS);
        assert_eq!(handler.translate("GREEN"), Some(Value::Enum("GREEN".to_string())));
        assert_eq!(handler.translate("blue"), Some(Value::Enum("BLUE".to_string())));
        assert_eq!(handler.translate("purple"), None);
        assert_eq!(
            handler.compare(&Value::Enum("RED".into()), &Value::Enum("BLUE".into())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_time_val_long() {
        let handler = Handler::for_type(ValueType::Long, true).unwrap();
        assert_eq!(handler, Handler::TimeValLong);
        assert_eq!(handler.translate("2s"), Some(Value::Long(2000)));
        assert_eq!(handler.translate("15"), Some(Value::Long(15)));
        assert!(Handler::for_type(ValueType::Str, true).is_none());
        assert_eq!(Handler::for_type(ValueType::TimeVal, true), Some(Handler::Duration));
    }

    #[test]
    fn test_split_key_value() {
        assert_eq!(split_key_value("k=v"), Some(("k".to_string(), "v".to_string())));
        assert_eq!(
            split_key_value("a\\=b=c\\=d"),
            Some(("a=b".to_string(), "c=d".to_string()))
        );
        assert_eq!(split_key_value("too=many=equals"), None);
        assert_eq!(split_key_value("novalue"), None);
    }

    #[test]
    fn test_map_put_replaces_in_place() {
        let mut entries = vec![
            (Value::Str("a".into()), Value::Int(1)),
            (Value::Str("b".into()), Value::Int(2)),
        ];
        FieldValue::map_put(&mut entries, Value::Str("a".into()), Value::Int(9));
        assert_eq!(entries[0], (Value::Str("a".into()), Value::Int(9)));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_field_handler_type_names() {
        let handler = FieldHandler::for_kind(&FieldKind::Map(ValueType::Str, ValueType::Int), false).unwrap();
        assert_eq!(handler.type_name(), "map<string, int>");
        assert!(FieldValue::empty(&FieldKind::Collection(ValueType::Int)).is_unset());
    }
}
