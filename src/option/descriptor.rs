//! Static option metadata.
//!
//! Each bindable class declares its options as `const` tables of
//! [`OptionDescriptor`]s. The field binder reads these tables instead of
//! discovering fields at runtime.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Separator between namespace parts of an option name.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Prefix turning a boolean option name into its negation.
pub const BOOL_FALSE_PREFIX: &str = "no-";

/// How a new value interacts with the value a field already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateRule {
    /// Keep the first value ever set.
    First,
    /// Always take the newest value.
    Last,
    /// Keep the greatest value seen.
    ///
    /// Only valid on ordered scalar types. Boolean fields are unordered and
    /// declaring this rule on one fails with `NotComparable` at binding time.
    Greatest,
    /// Keep the least value seen. Same type restriction as [`UpdateRule::Greatest`].
    Least,
    /// Allow a single assignment to an unset field.
    Immutable,
}

/// Outcome of [`UpdateRule::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Update,
    Keep,
    Reject,
}

impl UpdateRule {
    /// Decide whether `update` should replace `current`.
    ///
    /// `ordering` is the result of comparing `update` against `current`, and
    /// is only consulted by the ordering rules.
    pub fn decide(self, current_is_set: bool, ordering: Option<Ordering>) -> Decision {
        if !current_is_set {
            return Decision::Update;
        }
        match self {
            UpdateRule::First => Decision::Keep,
            UpdateRule::Last => Decision::Update,
            UpdateRule::Greatest => match ordering {
                Some(Ordering::Greater) => Decision::Update,
                _ => Decision::Keep,
            },
            UpdateRule::Least => match ordering {
                Some(Ordering::Less) => Decision::Update,
                _ => Decision::Keep,
            },
            UpdateRule::Immutable => Decision::Reject,
        }
    }

    pub fn requires_ordering(self) -> bool {
        matches!(self, UpdateRule::Greatest | UpdateRule::Least)
    }
}

impl fmt::Display for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateRule::First => "FIRST",
            UpdateRule::Last => "LAST",
            UpdateRule::Greatest => "GREATEST",
            UpdateRule::Least => "LEAST",
            UpdateRule::Immutable => "IMMUTABLE",
        };
        f.write_str(name)
    }
}

/// When an option shows up in abbreviated help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importance {
    Never,
    IfUnset,
    Always,
}

/// Element type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Str,
    File,
    /// A time value held as a [`std::time::Duration`].
    TimeVal,
    /// One of a fixed set of variant names.
    Enum(&'static [&'static str]),
}

/// Shape of a bindable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ValueType),
    Collection(ValueType),
    Map(ValueType, ValueType),
}

impl FieldKind {
    pub fn is_map(&self) -> bool {
        matches!(self, FieldKind::Map(..))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::Collection(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldKind::Scalar(ValueType::Bool))
    }
}

/// Metadata for one bindable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub short_name: Option<char>,
    pub description: &'static str,
    pub importance: Importance,
    pub mandatory: bool,
    /// Long-typed fields parse their text as a time value in milliseconds.
    pub is_time_val: bool,
    pub update_rule: UpdateRule,
    pub kind: FieldKind,
    /// Initial scalar value, in the same text form accepted on the command line.
    pub default: Option<&'static str>,
}

impl OptionDescriptor {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            short_name: None,
            description: "",
            importance: Importance::Never,
            mandatory: false,
            is_time_val: false,
            update_rule: UpdateRule::Last,
            kind,
            default: None,
        }
    }

    pub const fn short(self, short_name: char) -> Self {
        Self {
            short_name: Some(short_name),
            ..self
        }
    }

    pub const fn description(self, description: &'static str) -> Self {
        Self {
            description,
            ..self
        }
    }

    pub const fn importance(self, importance: Importance) -> Self {
        Self { importance, ..self }
    }

    pub const fn mandatory(self) -> Self {
        Self {
            mandatory: true,
            ..self
        }
    }

    pub const fn time_val(self) -> Self {
        Self {
            is_time_val: true,
            ..self
        }
    }

    pub const fn rule(self, update_rule: UpdateRule) -> Self {
        Self {
            update_rule,
            ..self
        }
    }

    pub const fn default_value(self, default: &'static str) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRIES: OptionDescriptor = OptionDescriptor::new("retries", FieldKind::Scalar(ValueType::Int))
        .short('r')
        .description("number of retries")
        .mandatory()
        .rule(UpdateRule::Greatest)
        .default_value("3");

    #[test]
    fn test_const_builder() {
        assert_eq!(RETRIES.name, "retries");
        assert_eq!(RETRIES.short_name, Some('r'));
        assert!(RETRIES.mandatory);
        assert_eq!(RETRIES.update_rule, UpdateRule::Greatest);
        assert_eq!(RETRIES.default, Some("3"));
        assert!(!RETRIES.is_time_val);
    }

    #[test]
    fn test_unset_always_updates() {
        for rule in [
            UpdateRule::First,
            UpdateRule::Last,
            UpdateRule::Greatest,
            UpdateRule::Least,
            UpdateRule::Immutable,
        ] {
            assert_eq!(rule.decide(false, None), Decision::Update, "{}", rule);
        }
    }

    #[test]
    fn test_rules_on_set_field() {
        assert_eq!(UpdateRule::First.decide(true, Some(Ordering::Greater)), Decision::Keep);
        assert_eq!(UpdateRule::Last.decide(true, Some(Ordering::Less)), Decision::Update);
        assert_eq!(UpdateRule::Greatest.decide(true, Some(Ordering::Greater)), Decision::Update);
        assert_eq!(UpdateRule::Greatest.decide(true, Some(Ordering::Equal)), Decision::Keep);
        assert_eq!(UpdateRule::Least.decide(true, Some(Ordering::Less)), Decision::Update);
        assert_eq!(UpdateRule::Least.decide(true, None), Decision::Keep);
        assert_eq!(UpdateRule::Immutable.decide(true, Some(Ordering::Equal)), Decision::Reject);
    }
}
