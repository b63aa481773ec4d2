//! Field binder: indexes option names across a set of objects and applies
//! values to every field bound under a name.
//!
//! Each field is reachable under several equivalent names:
//!
//! - `name` and `{device}name`, unless the owner opts out of the global namespace
//! - `Class:name`, `Class:idx:name`, `alias:name`, `alias:idx:name`
//! - the class and alias forms prefixed with `{device}` for device bundle members
//!
//! Short names follow the same scheme without the `{device}` bare form, and
//! boolean fields additionally register every form of `no-name`.

use super::descriptor::{Decision, FieldKind, BOOL_FALSE_PREFIX, NAMESPACE_SEPARATOR};
use super::value::{FieldHandler, FieldValue, Handler, Value};
use crate::error::{ConfigError, Result};
use crate::objects::{ConfigObject, ObjectId, ObjectSlot};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// One object taking part in option binding.
pub struct OptionSource<'a> {
    pub id: ObjectId,
    pub object: &'a mut dyn ConfigObject,
    /// Device bundle holding the object, if any.
    pub device: Option<String>,
    /// Appearance index recorded at placement time.
    pub appearance: Option<usize>,
}

impl<'a> OptionSource<'a> {
    pub fn new(object: &'a mut dyn ConfigObject) -> Self {
        Self {
            id: ObjectId::next(),
            object,
            device: None,
            appearance: None,
        }
    }

    pub fn from_slot(slot: &'a mut ObjectSlot, device: Option<&str>) -> Self {
        Self {
            id: slot.id,
            object: slot.object.as_mut(),
            device: device.map(str::to_string),
            appearance: slot.appearance,
        }
    }
}

/// A field that received a value, used to record provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub object: ObjectId,
    pub class_name: &'static str,
    pub field: &'static str,
    pub key: Option<String>,
}

/// A value that has already been coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Scalar(Value),
    Collection(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

/// Position of one bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub source: usize,
    pub field: usize,
}

/// Name index over a set of option sources.
pub struct OptionSetter<'a> {
    sources: Vec<OptionSource<'a>>,
    index: HashMap<String, Vec<Binding>>,
    handlers: HashMap<String, FieldHandler>,
}

impl<'a> OptionSetter<'a> {
    /// Build the index. Sources are numbered per class in order, starting at 1,
    /// unless an appearance index was recorded for them.
    pub fn new(sources: Vec<OptionSource<'a>>) -> Result<Self> {
        let mut setter = OptionSetter {
            sources,
            index: HashMap::new(),
            handlers: HashMap::new(),
        };
        setter.build_index()?;
        Ok(setter)
    }

    /// Convenience for binding against a single object.
    pub fn for_object(object: &'a mut dyn ConfigObject) -> Result<Self> {
        Self::new(vec![OptionSource::new(object)])
    }

    fn build_index(&mut self) -> Result<()> {
        let mut class_frequency: HashMap<&'static str, usize> = HashMap::new();
        let mut registrations = Vec::new();

        for (source_index, source) in self.sources.iter().enumerate() {
            let spec = source.object.class_spec();
            let counted = class_frequency.entry(spec.class_name).or_insert(0);
            *counted += 1;
            let instance = source.appearance.unwrap_or(*counted);
            let device = source.device.as_deref();

            for (field_index, slot) in source.object.fields().iter().enumerate() {
                let descriptor = slot.descriptor;
                if descriptor.name.contains(NAMESPACE_SEPARATOR) {
                    return Err(ConfigError::InvalidOptionDeclaration {
                        name: descriptor.name.to_string(),
                        class_name: spec.class_name.to_string(),
                        reason: format!(
                            "option names cannot contain the namespace separator character '{}'",
                            NAMESPACE_SEPARATOR
                        ),
                    });
                }
                let handler = FieldHandler::for_kind(&descriptor.kind, descriptor.is_time_val)
                    .ok_or_else(|| ConfigError::InvalidOptionDeclaration {
                        name: descriptor.name.to_string(),
                        class_name: spec.class_name.to_string(),
                        reason: "time values must be long or duration typed".to_string(),
                    })?;
                if descriptor.update_rule.requires_ordering()
                    && matches!(descriptor.kind, FieldKind::Scalar(_))
                    && !handler.value_handler().is_ordered()
                {
                    return Err(ConfigError::NotComparable {
                        name: descriptor.name.to_string(),
                        class_name: spec.class_name.to_string(),
                        rule: descriptor.update_rule.to_string(),
                    });
                }

                let names = NameScheme {
                    class_name: spec.class_name,
                    alias: spec.alias,
                    global: spec.global_namespace,
                    instance,
                    device,
                }
                .names_for(descriptor.name, descriptor.short_name, descriptor.kind.is_boolean());

                let binding = Binding {
                    source: source_index,
                    field: field_index,
                };
                for name in names {
                    registrations.push((name, binding, handler, spec.class_name));
                }
            }
        }

        for (name, binding, handler, class_name) in registrations {
            self.add_name(name, binding, handler, class_name)?;
        }
        Ok(())
    }

    fn add_name(
        &mut self,
        name: String,
        binding: Binding,
        handler: FieldHandler,
        class_name: &'static str,
    ) -> Result<()> {
        let bindings = self.index.entry(name.clone()).or_default();
        if bindings.iter().any(|b| b.source == binding.source) {
            return Err(ConfigError::DuplicateOption {
                name,
                class_name: class_name.to_string(),
                reason: format!("is defined more than once in class '{}'", class_name),
            });
        }
        match self.handlers.get(&name) {
            Some(existing) if *existing != handler => {
                let other = bindings
                    .first()
                    .map(|b| self.sources[b.source].object.class_name())
                    .unwrap_or_default();
                return Err(ConfigError::DuplicateOption {
                    reason: format!(
                        "in class '{}' is defined with a different type than same option in class '{}'",
                        class_name, other
                    ),
                    name,
                    class_name: class_name.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.handlers.insert(name.clone(), handler);
            }
        }
        bindings.push(binding);
        Ok(())
    }

    /// Bindings registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<&[Binding]> {
        match self.index.get(name) {
            Some(bindings) if !bindings.is_empty() => Ok(bindings),
            _ => Err(ConfigError::UnknownOption {
                name: name.to_string(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn handler(&self, name: &str) -> Result<FieldHandler> {
        self.handlers
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownOption {
                name: name.to_string(),
            })
    }

    /// Element type description for the option bound under `name`.
    pub fn type_name(&self, name: &str) -> Result<String> {
        self.handler(name).map(|h| h.type_name())
    }

    pub fn is_boolean_option(&self, name: &str) -> Result<bool> {
        Ok(matches!(self.handler(name)?, FieldHandler::Scalar(Handler::Bool)))
    }

    pub fn is_map_option(&self, name: &str) -> Result<bool> {
        Ok(matches!(self.handler(name)?, FieldHandler::Map(..)))
    }

    /// Coerce `value` (and `key` for maps) and apply it to every field bound
    /// under `name`.
    pub fn set_option_value(
        &mut self,
        name: &str,
        key: Option<&str>,
        value: &str,
    ) -> Result<Vec<FieldDef>> {
        let handler = self.handler(name)?;
        let value_handler = handler.value_handler();
        let translated = value_handler
            .translate(value)
            .ok_or_else(|| ConfigError::TypeCoercion {
                option: name.to_string(),
                what: "value",
                value: value.to_string(),
                type_name: value_handler.type_name().to_string(),
            })?;

        let incoming = match (handler, key) {
            (FieldHandler::Map(key_handler, _), Some(key_text)) => {
                let translated_key =
                    key_handler
                        .translate(key_text)
                        .ok_or_else(|| ConfigError::TypeCoercion {
                            option: name.to_string(),
                            what: "key",
                            value: key_text.to_string(),
                            type_name: key_handler.type_name().to_string(),
                        })?;
                Incoming::Map(vec![(translated_key, translated)])
            }
            (FieldHandler::Map(..), None) => {
                return Err(ConfigError::InvalidKeyUsage {
                    option: name.to_string(),
                    reason: "is a map and requires a key".to_string(),
                });
            }
            (_, Some(_)) => {
                return Err(ConfigError::InvalidKeyUsage {
                    option: name.to_string(),
                    reason: "is not a map and does not take a key".to_string(),
                });
            }
            (_, None) => Incoming::Scalar(translated),
        };

        debug!("Setting option '{}' to '{}'", name, value);
        self.apply_value(name, key, incoming)
    }

    /// Apply an already-typed value to every field bound under `name`.
    ///
    /// Collection fields append (or extend from a collection), map fields put
    /// (or merge a map), scalar fields follow their update rule. Only fields
    /// that took the value are returned.
    pub fn apply_value(
        &mut self,
        name: &str,
        key: Option<&str>,
        incoming: Incoming,
    ) -> Result<Vec<FieldDef>> {
        let handler = self.handler(name)?;
        let bindings = self.resolve(name)?.to_vec();
        check_shape(name, handler, &incoming)?;

        let mut affected = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let source = &mut self.sources[binding.source];
            let id = source.id;
            let class_name = source.object.class_name();
            let slot = source
                .object
                .fields_mut()
                .slot_mut(binding.field)
                .ok_or_else(|| ConfigError::UnknownOption {
                    name: name.to_string(),
                })?;
            let descriptor = slot.descriptor;

            match (&mut slot.value, &incoming) {
                (FieldValue::Collection(items), Incoming::Scalar(v)) => items.push(v.clone()),
                (FieldValue::Collection(items), Incoming::Collection(vs)) => {
                    items.extend(vs.iter().cloned())
                }
                (FieldValue::Map(entries), Incoming::Map(pairs)) => {
                    for (k, v) in pairs {
                        FieldValue::map_put(entries, k.clone(), v.clone());
                    }
                }
                (FieldValue::Scalar(current), Incoming::Scalar(update)) => {
                    let ordering = current
                        .as_ref()
                        .and_then(|c| handler.value_handler().compare(update, c));
                    match descriptor.update_rule.decide(current.is_some(), ordering) {
                        Decision::Update => *current = Some(update.clone()),
                        Decision::Keep => continue,
                        Decision::Reject => {
                            return Err(ConfigError::ImmutableOption {
                                option: name.to_string(),
                                class_name: class_name.to_string(),
                                value: update.to_string(),
                            });
                        }
                    }
                }
                _ => {
                    return Err(ConfigError::TypeMismatch {
                        option: name.to_string(),
                        expected: handler.type_name(),
                        actual: incoming_type_name(&incoming),
                    });
                }
            }

            affected.push(FieldDef {
                object: id,
                class_name,
                field: descriptor.name,
                key: key.map(str::to_string),
            });
        }
        Ok(affected)
    }

    /// Names of mandatory options whose fields are still unset.
    pub fn mandatory_unset(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.object.fields().iter())
            .filter(|slot| slot.descriptor.mandatory && slot.value.is_unset())
            .map(|slot| slot.descriptor.name.to_string())
            .collect()
    }

    pub fn validate_mandatory(&self) -> Result<()> {
        let unset = self.mandatory_unset();
        if unset.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingMandatoryOptions {
                names: unset.into_iter().collect(),
            })
        }
    }

    pub fn sources(&self) -> &[OptionSource<'a>] {
        &self.sources
    }

    /// Every registered name, sorted.
    pub fn option_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn check_shape(name: &str, handler: FieldHandler, incoming: &Incoming) -> Result<()> {
    let ok = match (handler, incoming) {
        (FieldHandler::Scalar(h) | FieldHandler::Collection(h), Incoming::Scalar(v)) => h.accepts(v),
        (FieldHandler::Collection(h), Incoming::Collection(vs)) => vs.iter().all(|v| h.accepts(v)),
        (FieldHandler::Map(kh, vh), Incoming::Map(pairs)) => {
            pairs.iter().all(|(k, v)| kh.accepts(k) && vh.accepts(v))
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::TypeMismatch {
            option: name.to_string(),
            expected: handler.type_name(),
            actual: incoming_type_name(incoming),
        })
    }
}

fn incoming_type_name(incoming: &Incoming) -> String {
    match incoming {
        Incoming::Scalar(v) => v.type_name().to_string(),
        Incoming::Collection(vs) => format!(
            "list<{}>",
            vs.first().map(Value::type_name).unwrap_or("?")
        ),
        Incoming::Map(pairs) => match pairs.first() {
            Some((k, v)) => format!("map<{}, {}>", k.type_name(), v.type_name()),
            None => "map<?, ?>".to_string(),
        },
    }
}

/// Naming context of one owner.
struct NameScheme<'n> {
    class_name: &'n str,
    alias: Option<&'n str>,
    global: bool,
    instance: usize,
    device: Option<&'n str>,
}

impl NameScheme<'_> {
    fn names_for(&self, name: &str, short_name: Option<char>, boolean: bool) -> Vec<String> {
        let mut names = Vec::new();
        if self.global {
            names.push(name.to_string());
            if let Some(device) = self.device {
                names.push(format!("{{{}}}{}", device, name));
            }
        }
        self.push_namespaced(&mut names, name);

        if let Some(short) = short_name {
            let short = short.to_string();
            if self.global {
                names.push(short.clone());
            }
            self.push_namespaced(&mut names, &short);
        }

        if boolean {
            let negated = format!("{}{}", BOOL_FALSE_PREFIX, name);
            if self.global {
                names.push(negated.clone());
                if let Some(device) = self.device {
                    names.push(format!("{{{}}}{}", device, negated));
                }
            }
            self.push_namespaced(&mut names, &negated);
        }
        names
    }

    fn push_namespaced(&self, names: &mut Vec<String>, name: &str) {
        let sep = NAMESPACE_SEPARATOR;
        let idx = self.instance;
        let prefixes = self.alias.into_iter().chain(std::iter::once(self.class_name));
        for prefix in prefixes {
            names.push(format!("{prefix}{sep}{name}"));
            names.push(format!("{prefix}{sep}{idx}{sep}{name}"));
            if let Some(device) = self.device {
                names.push(format!("{{{device}}}{prefix}{sep}{name}"));
                names.push(format!("{{{device}}}{prefix}{sep}{idx}{sep}{name}"));
            }
        }
    }
}

/// True if the final segment of an option name carries the negation prefix.
///
/// Handles `no-flag`, `{device}no-flag` and namespaced `Class:1:no-flag`.
pub fn is_negated_name(name: &str) -> bool {
    let without_device = match (name.starts_with('{'), name.find('}')) {
        (true, Some(end)) => &name[end + 1..],
        _ => name,
    };
    let last = without_device
        .rsplit(NAMESPACE_SEPARATOR)
        .next()
        .unwrap_or(without_device);
    last.starts_with(BOOL_FALSE_PREFIX)
}
