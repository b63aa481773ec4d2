//! `--template:map` argument handling.

use crate::error::{ConfigError, Result};
use crate::option::split_key_value;
use std::collections::BTreeMap;

/// Flag naming a template substitution.
pub const TEMPLATE_MAP_OPTION: &str = "--template:map";

/// Move every `--template:map` occurrence, with its value tokens, to just
/// after the configuration name.
///
/// A `key=value` token takes one slot, `key value` takes two, and a trailing
/// flag with nothing after it is moved on its own.
pub fn reorder_args(args: &[String]) -> Vec<String> {
    let Some((name, rest)) = args.split_first() else {
        return Vec::new();
    };
    let mut templates = Vec::new();
    let mut others = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let arg = &rest[i];
        if arg == TEMPLATE_MAP_OPTION {
            templates.push(arg.clone());
            if let Some(next) = rest.get(i + 1) {
                templates.push(next.clone());
                i += 1;
                if !next.contains('=') {
                    if let Some(value) = rest.get(i + 1) {
                        templates.push(value.clone());
                        i += 1;
                    }
                }
            }
        } else {
            others.push(arg.clone());
        }
        i += 1;
    }

    let mut reordered = Vec::with_capacity(args.len());
    reordered.push(name.clone());
    reordered.extend(templates);
    reordered.extend(others);
    reordered
}

/// Collect the leading `--template:map` arguments into a map.
///
/// Returns the templates and the remaining arguments.
pub fn extract_templates(args: &[String]) -> Result<(BTreeMap<String, String>, Vec<String>)> {
    let mut templates = BTreeMap::new();
    let mut i = 0;
    while i < args.len() && args[i] == TEMPLATE_MAP_OPTION {
        let key_token = args.get(i + 1).ok_or_else(|| ConfigError::MissingArgument {
            option: "template:map".to_string(),
            detail: "for its key".to_string(),
        })?;
        let (key, value, consumed) = match split_key_value(key_token) {
            Some((key, value)) => (key, value, 2),
            None => {
                let value = args.get(i + 2).ok_or_else(|| ConfigError::MissingArgument {
                    option: "template:map".to_string(),
                    detail: "for its value".to_string(),
                })?;
                (key_token.clone(), value.clone(), 3)
            }
        };
        if templates.contains_key(&key) {
            return Err(ConfigError::DuplicateTemplate { key });
        }
        templates.insert(key, value);
        i += consumed;
    }
    Ok((templates, args[i..].to_vec()))
}
