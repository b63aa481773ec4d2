//! Help text for bindable options.

use super::descriptor::Importance;
use super::fields::FieldSlot;
use super::value::{FieldHandler, FieldValue};
use crate::objects::ConfigObject;

/// Render a field's current value, or `None` when it is unset.
pub fn render_value(value: &FieldValue) -> Option<String> {
    if value.is_unset() {
        return None;
    }
    Some(match value {
        FieldValue::Scalar(Some(v)) => v.to_string(),
        FieldValue::Scalar(None) => String::new(),
        FieldValue::Collection(items) => {
            let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        FieldValue::Map(entries) => {
            let parts: Vec<String> = entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{{{}}}", parts.join(", "))
        }
    })
}

fn should_output(important_only: bool, slot: &FieldSlot) -> bool {
    if !important_only {
        return true;
    }
    match slot.descriptor.importance {
        Importance::Always => true,
        Importance::IfUnset => slot.value.is_unset(),
        Importance::Never => false,
    }
}

/// One help line for a field.
pub fn option_help_line(slot: &FieldSlot) -> String {
    let descriptor = slot.descriptor;
    let mut line = format!("    --{}", descriptor.name);
    if let Some(short) = descriptor.short_name {
        line.push_str(&format!(", -{}", short));
    }
    line.push_str(": ");
    line.push_str(descriptor.description);
    if let Some(value) = render_value(&slot.value) {
        line.push_str(&format!(" Default: {}.", value));
    }
    let choices = FieldHandler::for_kind(&descriptor.kind, descriptor.is_time_val)
        .and_then(|handler| handler.value_handler().enum_choices());
    if let Some(choices) = choices {
        line.push_str(&format!(" Valid values: [{}].", choices.join(", ")));
    }
    if descriptor.mandatory {
        line.push_str(" Mandatory.");
    }
    line
}

/// Help text for every option of `object`, one line per option.
///
/// With `important_only`, only options marked always-important, or
/// important-while-unset and still unset, are listed.
pub fn option_help(important_only: bool, object: &dyn ConfigObject) -> String {
    object
        .fields()
        .iter()
        .filter(|slot| should_output(important_only, slot))
        .map(|slot| option_help_line(slot) + "\n")
        .collect()
}
