//! Loads declaration documents, and everything they include, into a
//! [`Definition`].

use super::locator::{DocumentLocator, LocatedDocument};
use super::model::{Definition, OptionDef, SourceStamp, DEFAULT_DEVICE_NAME};
use super::reader::{parse_document, Element};
use crate::configuration::{is_reserved_type_name, Role, DEVICE_TYPE_NAME};
use crate::error::{ConfigError, Location, Result};
use crate::option::NAMESPACE_SEPARATOR;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const ROOT_TAG: &str = "configuration";
const OBJECT_TAG: &str = "object";
const OPTION_TAG: &str = "option";
const INCLUDE_TAG: &str = "include";
const TEMPLATE_INCLUDE_TAG: &str = "template-include";

/// Directed "includer -> included" graph over document identities.
#[derive(Debug, Default)]
struct IncludeGraph {
    edges: HashMap<String, Vec<String>>,
}

impl IncludeGraph {
    /// Add an edge. If it closes a cycle, the edge is still recorded and the
    /// cycle is returned starting and ending at `from`.
    fn add_edge(&mut self, from: &str, to: &str) -> std::result::Result<(), Vec<String>> {
        self.edges.entry(from.to_string()).or_default().push(to.to_string());
        let mut path = vec![to.to_string()];
        if self.find_path(to, from, &mut path, &mut Vec::new()) {
            let mut cycle = vec![from.to_string()];
            cycle.extend(path);
            return Err(cycle);
        }
        Ok(())
    }

    fn find_path(&self, current: &str, target: &str, path: &mut Vec<String>, visited: &mut Vec<String>) -> bool {
        if current == target {
            return true;
        }
        if visited.iter().any(|v| v == current) {
            return false;
        }
        visited.push(current.to_string());
        for next in self.edges.get(current).into_iter().flatten() {
            path.push(next.clone());
            if self.find_path(next, target, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }
}

/// Mutable state shared by every document of one load.
struct LoadState {
    definition: Definition,
    templates: BTreeMap<String, String>,
    includes: IncludeGraph,
    outside_roles: Vec<String>,
}

/// The document currently being walked.
struct DocumentContext<'d> {
    name: &'d str,
    id: &'d str,
    path: Option<&'d Path>,
    chain: &'d [String],
}

impl DocumentContext<'_> {
    fn location(&self, line: usize) -> Location {
        Location::new(self.name).at_line(line).with_chain(self.chain.to_vec())
    }
}

/// Element nesting around the element being handled.
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'s> {
    device: Option<&'s str>,
    object: Option<(&'s str, usize)>,
}

/// Reads declaration documents through a [`DocumentLocator`].
#[derive(Debug, Clone, Copy)]
pub struct DefinitionLoader<'l> {
    locator: &'l DocumentLocator,
}

impl<'l> DefinitionLoader<'l> {
    pub fn new(locator: &'l DocumentLocator) -> Self {
        Self { locator }
    }

    /// Load `name` and its includes.
    ///
    /// `templates` maps `<template-include>` keys to documents; every key
    /// must be used exactly once.
    pub fn load(&self, name: &str, templates: &BTreeMap<String, String>) -> Result<Definition> {
        let document = self.locator.locate(name, None)?;
        let mut state = LoadState {
            definition: Definition::new(name),
            templates: templates.clone(),
            includes: IncludeGraph::default(),
            outside_roles: Vec::new(),
        };
        self.load_document(&mut state, &document, name, &[], None)?;

        let LoadState {
            definition,
            templates,
            outside_roles,
            ..
        } = state;
        if definition.is_multi_device()
            && !outside_roles.is_empty()
            && definition.hybrid_real_device().is_none()
        {
            return Err(ConfigError::RolesOutsideDevice { roles: outside_roles });
        }
        if !templates.is_empty() {
            return Err(ConfigError::UnusedTemplates { templates });
        }

        info!(
            "Loaded configuration '{}' ({} object types, {} options{})",
            name,
            definition.object_entries().len(),
            definition.options().len(),
            if definition.is_multi_device() {
                format!(", {} devices", definition.expected_devices().len())
            } else {
                String::new()
            }
        );
        Ok(definition)
    }

    fn load_document(
        &self,
        state: &mut LoadState,
        document: &LocatedDocument,
        name: &str,
        chain: &[String],
        device: Option<&str>,
    ) -> Result<()> {
        debug!("Reading configuration document '{}'", name);
        if let Some(stamp) = document.local_path().and_then(SourceStamp::capture) {
            state.definition.track_source(stamp);
        }

        let root = parse_document(&document.content).map_err(|e| ConfigError::Parse {
            location: Location::new(name).at_line(e.line).with_chain(chain.to_vec()),
            reason: e.reason,
        })?;
        let context = DocumentContext {
            name,
            id: &document.id,
            path: document.local_path(),
            chain,
        };
        if root.name != ROOT_TAG {
            return Err(ConfigError::Parse {
                location: context.location(root.line),
                reason: format!("root element must be <{}>, found <{}>", ROOT_TAG, root.name),
            });
        }
        if let Some(description) = root.attribute("description") {
            state.definition.set_description_once(description);
        }

        let scope = Scope { device, object: None };
        for child in &root.children {
            self.handle_element(state, &context, child, scope)?;
        }
        Ok(())
    }

    fn handle_element(
        &self,
        state: &mut LoadState,
        context: &DocumentContext<'_>,
        element: &Element,
        scope: Scope<'_>,
    ) -> Result<()> {
        let location = || context.location(element.line);
        let tag = element.name.as_str();

        if scope.object.is_some() && tag != OPTION_TAG {
            return Err(ConfigError::Parse {
                location: location(),
                reason: format!("<{}> is not allowed inside an object declaration", tag),
            });
        }

        match tag {
            OBJECT_TAG => {
                if scope.device.is_some() {
                    return Err(ConfigError::RoleNotAllowedInDevice {
                        location: location(),
                        role: OBJECT_TAG.to_string(),
                    });
                }
                let type_name = element
                    .attribute("type")
                    .ok_or_else(|| ConfigError::MissingTypeAttribute { location: location() })?;
                if is_reserved_type_name(type_name) {
                    return Err(ConfigError::ReservedTypeName {
                        location: location(),
                        type_name: type_name.to_string(),
                    });
                }
                let class_name = required(element, "class", location)?;
                self.declare_object(state, context, element, type_name, class_name, scope)
            }
            DEVICE_TYPE_NAME => {
                if scope.device.is_some() {
                    return Err(ConfigError::NestedDevice { location: location() });
                }
                let name = required(element, "name", location)?;
                if name == DEFAULT_DEVICE_NAME {
                    return Err(ConfigError::InvalidDeviceName {
                        location: location(),
                        name: name.to_string(),
                        reason: "the name is reserved".to_string(),
                    });
                }
                if name.contains(NAMESPACE_SEPARATOR) {
                    return Err(ConfigError::InvalidDeviceName {
                        location: location(),
                        name: name.to_string(),
                        reason: format!("it cannot contain '{}'", NAMESPACE_SEPARATOR),
                    });
                }
                let is_fake = element
                    .attribute("isFake")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                if let Some(first) = state.definition.add_expected_device(name, is_fake) {
                    return Err(ConfigError::DeviceFakeMismatch {
                        location: location(),
                        device: name.to_string(),
                        first,
                        second: is_fake,
                    });
                }
                state.definition.set_multi_device(true);

                let inner = Scope {
                    device: Some(name),
                    object: None,
                };
                for child in &element.children {
                    self.handle_element(state, context, child, inner)?;
                }
                Ok(())
            }
            OPTION_TAG => {
                let name = required(element, "name", location)?;
                let value = required(element, "value", location)?;
                let mut full_name = match scope.object {
                    Some((class_name, appearance)) => format!(
                        "{}{sep}{}{sep}{}",
                        class_name,
                        appearance,
                        name,
                        sep = NAMESPACE_SEPARATOR
                    ),
                    None => name.to_string(),
                };
                if let Some(device) = scope.device {
                    full_name = format!("{{{}}}{}", device, full_name);
                }
                let mut option = OptionDef::new(full_name, value, context.name);
                if let Some(key) = element.attribute("key") {
                    option = option.with_key(key);
                }
                state.definition.add_option(option);
                Ok(())
            }
            INCLUDE_TAG => {
                if let Some((extra, _)) = element.attributes.iter().find(|(key, _)| key != "name") {
                    return Err(ConfigError::Parse {
                        location: location(),
                        reason: format!("<{}> only accepts a 'name' attribute, found '{}'", INCLUDE_TAG, extra),
                    });
                }
                let target = required(element, "name", location)?;
                self.include(state, context, element.line, target, scope.device)
            }
            TEMPLATE_INCLUDE_TAG => {
                if scope.device.is_some() {
                    return Err(ConfigError::TemplateInDevice { location: location() });
                }
                let key = required(element, "name", location)?;
                let target = match state.templates.remove(key) {
                    Some(target) => target,
                    None => element
                        .attribute("default")
                        .map(str::to_string)
                        .ok_or_else(|| ConfigError::TemplateResolution {
                            location: location(),
                            template: key.to_string(),
                        })?,
                };
                debug!("Template '{}' resolved to '{}'", key, target);
                self.include(state, context, element.line, &target, None)
            }
            _ => match Role::from_type_name(tag) {
                Some(role) => {
                    let type_name = match scope.device {
                        Some(_) if !role.is_device_role() => {
                            return Err(ConfigError::RoleNotAllowedInDevice {
                                location: location(),
                                role: tag.to_string(),
                            })
                        }
                        Some(device) => format!("{}{}{}", device, NAMESPACE_SEPARATOR, tag),
                        None => {
                            if role.is_device_role() && !state.outside_roles.iter().any(|r| r == tag) {
                                state.outside_roles.push(tag.to_string());
                            }
                            tag.to_string()
                        }
                    };
                    let class_name = required(element, "class", location)?;
                    self.declare_object(state, context, element, &type_name, class_name, scope)
                }
                None => Err(ConfigError::Parse {
                    location: location(),
                    reason: format!("unknown element <{}>", tag),
                }),
            },
        }
    }

    fn declare_object(
        &self,
        state: &mut LoadState,
        context: &DocumentContext<'_>,
        element: &Element,
        type_name: &str,
        class_name: &str,
        scope: Scope<'_>,
    ) -> Result<()> {
        let appearance = state.definition.add_object(type_name, class_name);
        let inner = Scope {
            device: scope.device,
            object: Some((class_name, appearance)),
        };
        for child in &element.children {
            self.handle_element(state, context, child, inner)?;
        }
        Ok(())
    }

    fn include(
        &self,
        state: &mut LoadState,
        context: &DocumentContext<'_>,
        line: usize,
        target: &str,
        device: Option<&str>,
    ) -> Result<()> {
        let document = self.locator.locate(target, context.path).map_err(|e| match e {
            ConfigError::DocumentNotFound { name, .. } => ConfigError::DocumentNotFound {
                name,
                location: Some(context.location(line)),
            },
            other => other,
        })?;
        if let Err(cycle) = state.includes.add_edge(context.id, &document.id) {
            return Err(ConfigError::CircularInclude {
                document: target.to_string(),
                cycle,
            });
        }

        debug!("'{}' includes '{}'", context.name, target);
        let mut chain = context.chain.to_vec();
        chain.push(context.name.to_string());
        self.load_document(state, &document, target, &chain, device)
    }
}

fn required<'e>(element: &'e Element, attribute: &str, location: impl Fn() -> Location) -> Result<&'e str> {
    element
        .attribute(attribute)
        .ok_or_else(|| ConfigError::MissingAttribute {
            location: location(),
            element: element.name.clone(),
            attribute: attribute.to_string(),
        })
}
