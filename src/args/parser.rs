//! Command-line style argument parsing onto bound options.

use super::keystore::{resolve_keystore_value, KeyStoreClient};
use crate::error::{ConfigError, Result};
use crate::option::{is_negated_name, split_key_value, FieldDef, OptionSetter};
use crate::option::value::unescape_equals;
use log::debug;

const BOOLEAN_WORDS: [&str; 4] = ["true", "false", "yes", "no"];

/// Parses `--name value`, `--name=value`, `--no-flag`, grouped `-abc` and
/// map forms, applying each assignment through an [`OptionSetter`].
pub struct ArgsParser<'p, 'a> {
    setter: &'p mut OptionSetter<'a>,
    keystore: Option<&'p dyn KeyStoreClient>,
    applied: Vec<FieldDef>,
}

impl<'p, 'a> ArgsParser<'p, 'a> {
    pub fn new(setter: &'p mut OptionSetter<'a>) -> Self {
        Self {
            setter,
            keystore: None,
            applied: Vec::new(),
        }
    }

    pub fn with_keystore(mut self, keystore: Option<&'p dyn KeyStoreClient>) -> Self {
        self.keystore = keystore;
        self
    }

    /// Fields that received a value so far.
    pub fn applied(&self) -> &[FieldDef] {
        &self.applied
    }

    /// Parse until the first positional token or `--`, failing on any bad option.
    ///
    /// Returns the positional tokens that follow.
    pub fn parse(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut i = 0;
        while i < args.len() {
            match self.parse_one(args, i)? {
                Step::Next(next) => i = next,
                Step::Stop(rest) => return Ok(args[rest..].to_vec()),
            }
        }
        Ok(Vec::new())
    }

    /// Parse as far as possible, returning unconsumed tokens instead of failing.
    ///
    /// Without `force_continue`, the first failing option and every token after
    /// it are returned. With it, only the failing option token is set aside and
    /// parsing resumes with the next token.
    pub fn parse_best_effort(&mut self, args: &[String], force_continue: bool) -> Vec<String> {
        let mut leftovers = Vec::new();
        let mut i = 0;
        while i < args.len() {
            match self.parse_one(args, i) {
                Ok(Step::Next(next)) => i = next,
                Ok(Step::Stop(rest)) => {
                    leftovers.extend_from_slice(&args[rest..]);
                    return leftovers;
                }
                Err(e) => {
                    debug!("Stopping best-effort parse at '{}': {}", args[i], e);
                    if force_continue {
                        leftovers.push(args[i].clone());
                        i += 1;
                    } else {
                        leftovers.extend_from_slice(&args[i..]);
                        return leftovers;
                    }
                }
            }
        }
        leftovers
    }

    /// Fail if any mandatory option is still unset.
    pub fn validate_mandatory(&self) -> Result<()> {
        self.setter.validate_mandatory()
    }

    fn parse_one(&mut self, args: &[String], i: usize) -> Result<Step> {
        let arg = args[i].as_str();
        if arg == "--" {
            Ok(Step::Stop(i + 1))
        } else if let Some(long) = arg.strip_prefix("--") {
            self.parse_long_option(long, args, i + 1).map(Step::Next)
        } else if arg.len() > 1 && arg.starts_with('-') {
            self.parse_grouped_short_options(&arg[1..], args, i + 1)
                .map(Step::Next)
        } else {
            Ok(Step::Stop(i))
        }
    }

    /// Returns the index of the first token not consumed.
    fn parse_long_option(&mut self, spec: &str, args: &[String], mut next: usize) -> Result<usize> {
        let (name, inline_value) = match spec.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (spec, None),
        };

        let (key, value) = if self.setter.is_map_option(name)? {
            let (key, value) = match inline_value {
                Some(text) => split_map_token(name, &text)?,
                None => {
                    let token = grab_next(args, next, name, "for its key")?;
                    next += 1;
                    match split_key_value(token) {
                        Some(pair) => pair,
                        None => {
                            let value = grab_next(args, next, name, "for its value")?;
                            next += 1;
                            (unescape_equals(token), unescape_equals(value))
                        }
                    }
                }
            };
            (Some(key), value)
        } else if let Some(value) = inline_value {
            (None, value)
        } else if self.setter.is_boolean_option(name)? {
            if is_negated_name(name) {
                (None, "false".to_string())
            } else {
                match args.get(next).filter(|t| is_boolean_word(t)) {
                    Some(word) => {
                        next += 1;
                        (None, word.clone())
                    }
                    None => (None, "true".to_string()),
                }
            }
        } else {
            let value = grab_next(args, next, name, "")?;
            next += 1;
            (None, value.clone())
        };

        self.apply(name, key.as_deref(), &value)?;
        Ok(next)
    }

    fn parse_grouped_short_options(&mut self, group: &str, args: &[String], mut next: usize) -> Result<usize> {
        for (offset, ch) in group.char_indices() {
            let name = ch.to_string();
            if self.setter.is_boolean_option(&name)? {
                self.apply(&name, None, "true")?;
                continue;
            }
            let remainder = &group[offset + ch.len_utf8()..];
            let value = if remainder.is_empty() {
                let value = grab_next(args, next, &name, "")?.clone();
                next += 1;
                value
            } else {
                remainder.to_string()
            };
            if self.setter.is_map_option(&name)? {
                let (key, value) = split_map_token(&name, &value)?;
                self.apply(&name, Some(&key), &value)?;
            } else {
                self.apply(&name, None, &value)?;
            }
            break;
        }
        Ok(next)
    }

    fn apply(&mut self, name: &str, key: Option<&str>, value: &str) -> Result<()> {
        let value = resolve_keystore_value(value, self.keystore)?;
        let affected = self.setter.set_option_value(name, key, &value)?;
        self.applied.extend(affected);
        Ok(())
    }
}

enum Step {
    /// Continue at this token index.
    Next(usize),
    /// Stop; positional tokens start at this index.
    Stop(usize),
}

fn is_boolean_word(token: &str) -> bool {
    BOOLEAN_WORDS.iter().any(|w| token.eq_ignore_ascii_case(w))
}

fn grab_next<'t>(args: &'t [String], index: usize, name: &str, detail: &str) -> Result<&'t String> {
    args.get(index).ok_or_else(|| ConfigError::MissingArgument {
        option: name.to_string(),
        detail: detail.to_string(),
    })
}

fn split_map_token(name: &str, token: &str) -> Result<(String, String)> {
    split_key_value(token).ok_or_else(|| ConfigError::TypeCoercion {
        option: name.to_string(),
        what: "value",
        value: token.to_string(),
        type_name: "key=value pair".to_string(),
    })
}
