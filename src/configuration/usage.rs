//! Help text and structured option dumps for a configuration.

use super::store::{Configuration, PlacedObject};
use crate::option::{option_help, FieldHandler, FieldValue, Importance, UpdateRule, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Options of one object, as dumped by [`Configuration::json_command_usage`].
#[derive(Debug, Clone, Serialize)]
pub struct ObjectUsage {
    pub name: String,
    pub alias: Option<String>,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub options: Vec<OptionUsage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionUsage {
    pub name: String,
    pub short_name: Option<String>,
    pub description: String,
    pub importance: Importance,
    pub mandatory: bool,
    pub is_time_val: bool,
    pub update_rule: UpdateRule,
    pub value_type: String,
    pub value: Option<JsonValue>,
    pub source: Vec<String>,
}

/// An option value in JSON form. Durations are written in humantime form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Duration(#[serde(with = "humantime_serde")] Duration),
    Text(String),
    List(Vec<JsonValue>),
    Map(BTreeMap<String, JsonValue>),
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                JsonValue::Integer(value.as_i64().unwrap_or_default())
            }
            Value::Float(f) => JsonValue::Number(f64::from(*f)),
            Value::Double(d) => JsonValue::Number(*d),
            Value::Duration(d) => JsonValue::Duration(*d),
            other => JsonValue::Text(other.to_string()),
        }
    }
}

fn json_value(value: &FieldValue) -> Option<JsonValue> {
    if value.is_unset() {
        return None;
    }
    Some(match value {
        FieldValue::Scalar(v) => v.as_ref().map(JsonValue::from)?,
        FieldValue::Collection(items) => JsonValue::List(items.iter().map(JsonValue::from).collect()),
        FieldValue::Map(entries) => JsonValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), JsonValue::from(v)))
                .collect(),
        ),
    })
}

fn object_label<'c>(placed: &PlacedObject<'c>) -> &'c str {
    placed.object().class_spec().alias.unwrap_or(placed.type_name)
}

impl Configuration {
    /// Human-readable help for every object's options.
    ///
    /// With `important_only`, objects with no important options are skipped.
    pub fn print_command_usage(&self, important_only: bool) -> String {
        let mut out = format!("'{}' configuration: {}\n", self.name(), self.description());
        for placed in self.all_objects() {
            let help = option_help(important_only, placed.object());
            if important_only && help.is_empty() {
                continue;
            }
            out.push('\n');
            match placed.device.filter(|_| self.is_multi_device()) {
                Some(device) => out.push_str(&format!(
                    "  '{}' {} options for device '{}':\n",
                    object_label(&placed),
                    placed.type_name,
                    device.name()
                )),
                None => out.push_str(&format!(
                    "  '{}' {} options:\n",
                    object_label(&placed),
                    placed.type_name
                )),
            }
            out.push_str(&help);
        }
        out
    }

    /// Every option of every object with its current value and provenance.
    pub fn json_command_usage(&self) -> Vec<ObjectUsage> {
        self.all_objects()
            .into_iter()
            .map(|placed| {
                let object = placed.object();
                let spec = object.class_spec();
                let options = object
                    .fields()
                    .iter()
                    .map(|slot| {
                        let descriptor = slot.descriptor;
                        OptionUsage {
                            name: descriptor.name.to_string(),
                            short_name: descriptor.short_name.map(String::from),
                            description: descriptor.description.to_string(),
                            importance: descriptor.importance,
                            mandatory: descriptor.mandatory,
                            is_time_val: descriptor.is_time_val,
                            update_rule: descriptor.update_rule,
                            value_type: FieldHandler::for_kind(&descriptor.kind, descriptor.is_time_val)
                                .map(|h| h.type_name())
                                .unwrap_or_default(),
                            value: json_value(&slot.value),
                            source: self.field_sources(placed.slot.id, descriptor.name),
                        }
                    })
                    .collect();
                ObjectUsage {
                    name: placed.type_name.to_string(),
                    alias: spec.alias.map(String::from),
                    class: spec.class_name.to_string(),
                    device: placed
                        .device
                        .filter(|_| self.is_multi_device())
                        .map(|d| d.name().to_string()),
                    options,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::builtin::STDOUT_LOGGER;

    #[test]
    fn test_usage_header_and_sections() {
        let config = Configuration::new("my-config", "does things");
        let usage = config.print_command_usage(false);
        assert!(usage.starts_with("'my-config' configuration: does things\n"));
        assert!(usage.contains("  'stdout' logger options:"));
        assert!(usage.contains("  'build_provider' build_provider options:"));
        assert!(usage.contains("--build-id"));
    }

    #[test]
    fn test_important_only_skips_quiet_objects() {
        let config = Configuration::new("cfg", "");
        let usage = config.print_command_usage(true);
        assert!(usage.contains("--help"));
        assert!(usage.contains("--serial, -s"));
        assert!(!usage.contains("--build-id"));
        assert!(!usage.contains("'log_saver'"));
    }

    #[test]
    fn test_json_usage() {
        let mut config = Configuration::new("cfg", "");
        config.inject_option_value("min-loop-time", "90s").unwrap();
        config.inject_option_value("invocation-timeout", "1h").unwrap();
        let usage = config.json_command_usage();
        let logger = usage.iter().find(|o| o.class == STDOUT_LOGGER.class_name).unwrap();
        assert_eq!(logger.alias.as_deref(), Some("stdout"));
        assert_eq!(logger.options[0].value, Some(JsonValue::Text("INFO".to_string())));

        let json = serde_json::to_value(&usage).unwrap();
        let command = json
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["name"] == "cmd_options")
            .unwrap();
        let options = command["options"].as_array().unwrap();
        let loop_time = options.iter().find(|o| o["name"] == "min-loop-time").unwrap();
        assert_eq!(loop_time["value"], 90_000);
        assert_eq!(loop_time["isTimeVal"], true);
        assert_eq!(loop_time["updateRule"], "LAST");
        assert_eq!(loop_time["source"][0], "injected");
        let timeout = options.iter().find(|o| o["name"] == "invocation-timeout").unwrap();
        assert_eq!(timeout["value"], "1h");
        assert_eq!(timeout["valueType"], "time");
    }
}
