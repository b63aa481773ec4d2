//! Re-serialisation of a configuration into the declaration format.

use super::role::{Role, DEVICE_TYPE_NAME};
use super::store::Configuration;
use crate::definition::reader::escape_attribute;
use crate::objects::ConfigObject;
use crate::option::FieldValue;
use std::fmt::Write;

fn write_option(out: &mut String, indent: &str, name: &str, key: Option<String>, value: String) {
    let _ = write!(out, "{}<option name=\"{}\"", indent, escape_attribute(name));
    if let Some(key) = key {
        let _ = write!(out, " key=\"{}\"", escape_attribute(&key));
    }
    let _ = writeln!(out, " value=\"{}\" />", escape_attribute(&value));
}

fn write_object(out: &mut String, indent: &str, type_name: &str, object: &dyn ConfigObject) {
    let class_name = escape_attribute(object.class_name());
    let element = if Role::from_type_name(type_name).is_some() {
        let _ = write!(out, "{}<{} class=\"{}\"", indent, type_name, class_name);
        type_name
    } else {
        let _ = write!(
            out,
            "{}<object type=\"{}\" class=\"{}\"",
            indent,
            escape_attribute(type_name),
            class_name
        );
        "object"
    };

    // Defaults are restored on load; writing them again trips update rules.
    let set_fields: Vec<_> = object
        .fields()
        .iter()
        .filter(|slot| !slot.value.is_unset() && !slot.holds_default())
        .collect();
    if set_fields.is_empty() {
        out.push_str(" />\n");
        return;
    }
    out.push_str(">\n");
    let inner = format!("{}    ", indent);
    for slot in set_fields {
        let name = slot.descriptor.name;
        match &slot.value {
            FieldValue::Scalar(Some(value)) => write_option(out, &inner, name, None, value.to_string()),
            FieldValue::Scalar(None) => {}
            FieldValue::Collection(items) => {
                for item in items {
                    write_option(out, &inner, name, None, item.to_string());
                }
            }
            FieldValue::Map(entries) => {
                for (key, value) in entries {
                    write_option(out, &inner, name, Some(key.to_string()), value.to_string());
                }
            }
        }
    }
    let _ = writeln!(out, "{}</{}>", indent, element);
}

impl Configuration {
    /// Serialise the configuration so that loading the output yields the same
    /// objects and option values.
    ///
    /// Objects whose type name or class name appears in `excludes` are left out.
    pub fn dump_xml(&self, excludes: &[String]) -> String {
        let excluded = |type_name: &str, object: &dyn ConfigObject| {
            excludes
                .iter()
                .any(|e| e == type_name || e == object.class_name())
        };

        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            "<configuration description=\"{}\">",
            escape_attribute(self.description())
        );

        let placed = self.all_objects();
        for role in Role::ALL {
            if role.is_device_role() {
                if self.is_multi_device() {
                    continue;
                }
                for device in self.devices() {
                    for object in device.objects_for(role) {
                        if !excluded(role.type_name(), object) {
                            write_object(&mut out, "    ", role.type_name(), object);
                        }
                    }
                }
                continue;
            }
            for entry in placed.iter().filter(|p| p.device.is_none() && p.type_name == role.type_name()) {
                if !excluded(entry.type_name, entry.object()) {
                    write_object(&mut out, "    ", entry.type_name, entry.object());
                }
            }
        }

        for entry in placed
            .iter()
            .filter(|p| p.device.is_none() && Role::from_type_name(p.type_name).is_none())
        {
            if !excluded(entry.type_name, entry.object()) {
                write_object(&mut out, "    ", entry.type_name, entry.object());
            }
        }

        if self.is_multi_device() {
            for device in self.devices() {
                let _ = writeln!(
                    out,
                    "    <{} name=\"{}\" isFake=\"{}\">",
                    DEVICE_TYPE_NAME,
                    escape_attribute(device.name()),
                    device.is_fake()
                );
                for (role, slot) in device.all_slots() {
                    if !excluded(role.type_name(), slot.object.as_ref()) {
                        write_object(&mut out, "        ", role.type_name(), slot.object.as_ref());
                    }
                }
                let _ = writeln!(out, "    </{}>", DEVICE_TYPE_NAME);
            }
        }

        out.push_str("</configuration>\n");
        out
    }
}
