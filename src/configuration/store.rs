//! The resolved configuration: live objects by role plus device bundles.

use super::device::DeviceConfiguration;
use super::role::Role;
use crate::args::{ArgsParser, KeyStoreClient};
use crate::definition::{OptionDef, DEFAULT_DEVICE_NAME};
use crate::error::{ConfigError, Result};
use crate::objects::builtin::{
    new_object, COMMAND_OPTIONS_CLASS, CONFIGURATION_DESCRIPTOR, FILE_SYSTEM_LOG_SAVER,
    STDOUT_LOGGER, STUB_TEST, TEXT_RESULT_REPORTER,
};
use crate::objects::{ConfigObject, ObjectId, ObjectSlot};
use crate::option::{split_key_value, FieldDef, OptionSetter, OptionSource};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Provenance recorded for values applied from the command line.
pub const COMMAND_LINE_SOURCE: &str = "command line";
/// Provenance recorded for values injected without a named source.
pub const INJECTED_SOURCE: &str = "injected";

/// One object of a configuration together with where it is placed.
#[derive(Debug, Clone, Copy)]
pub struct PlacedObject<'c> {
    pub type_name: &'c str,
    /// Device bundle holding the object, for device roles.
    pub device: Option<&'c DeviceConfiguration>,
    pub slot: &'c ObjectSlot,
}

impl<'c> PlacedObject<'c> {
    pub fn object(&self) -> &'c dyn ConfigObject {
        self.slot.object.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    name: String,
    description: String,
    objects: Vec<(String, Vec<ObjectSlot>)>,
    devices: Vec<DeviceConfiguration>,
    multi_device: bool,
    field_sources: HashMap<FieldDef, Vec<String>>,
    command_line: Option<Vec<String>>,
}

impl Configuration {
    /// A configuration holding the default object for each role and a single
    /// default device.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let defaults = [
            (Role::Test, &STUB_TEST),
            (Role::Logger, &STDOUT_LOGGER),
            (Role::LogSaver, &FILE_SYSTEM_LOG_SAVER),
            (Role::ResultReporter, &TEXT_RESULT_REPORTER),
            (Role::CommandOptions, &COMMAND_OPTIONS_CLASS),
            (Role::ConfigDescriptor, &CONFIGURATION_DESCRIPTOR),
        ];
        let objects = defaults
            .into_iter()
            .map(|(role, spec)| (role.type_name().to_string(), vec![ObjectSlot::new(new_object(spec))]))
            .collect();
        Self {
            name: name.into(),
            description: description.into(),
            objects,
            devices: vec![DeviceConfiguration::new(DEFAULT_DEVICE_NAME, false)],
            multi_device: false,
            field_sources: HashMap::new(),
            command_line: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    fn slots_of(&self, type_name: &str) -> &[ObjectSlot] {
        self.objects
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, slots)| slots.as_slice())
            .unwrap_or_default()
    }

    fn single_device(&self, type_name: &str) -> Result<&DeviceConfiguration> {
        if self.multi_device {
            return Err(ConfigError::MultiDeviceAccess {
                type_name: type_name.to_string(),
            });
        }
        self.devices.first().ok_or_else(|| ConfigError::UnknownDevice {
            name: DEFAULT_DEVICE_NAME.to_string(),
        })
    }

    fn single_device_mut(&mut self, type_name: &str) -> Result<&mut DeviceConfiguration> {
        if self.multi_device {
            return Err(ConfigError::MultiDeviceAccess {
                type_name: type_name.to_string(),
            });
        }
        self.devices.first_mut().ok_or_else(|| ConfigError::UnknownDevice {
            name: DEFAULT_DEVICE_NAME.to_string(),
        })
    }

    /// The single object stored under `type_name`.
    ///
    /// Device roles are read from the single device and fail in multi-device
    /// mode. Built-in list roles must be read with [`Configuration::get_list`].
    pub fn get(&self, type_name: &str) -> Result<&dyn ConfigObject> {
        let role = Role::from_type_name(type_name);
        if role.is_some_and(Role::supports_list) {
            return Err(ConfigError::WrongAccessor {
                type_name: type_name.to_string(),
            });
        }
        let objects: Vec<&dyn ConfigObject> = match role {
            Some(role) if role.is_device_role() => self.single_device(type_name)?.objects_for(role),
            _ => self.slots_of(type_name).iter().map(|s| s.object.as_ref()).collect(),
        };
        match objects.as_slice() {
            [only] => Ok(*only),
            _ => Err(ConfigError::AmbiguousSingleAccess {
                type_name: type_name.to_string(),
                count: objects.len(),
            }),
        }
    }

    /// Every object stored under `type_name`, in order. Device roles are
    /// collected across all devices.
    pub fn get_list(&self, type_name: &str) -> Vec<&dyn ConfigObject> {
        match Role::from_type_name(type_name) {
            Some(role) if role.is_device_role() => self
                .devices
                .iter()
                .flat_map(|device| device.objects_for(role))
                .collect(),
            _ => self.slots_of(type_name).iter().map(|s| s.object.as_ref()).collect(),
        }
    }

    pub fn set(&mut self, type_name: &str, object: Box<dyn ConfigObject>) -> Result<()> {
        self.set_list(type_name, vec![object])
    }

    /// Replace every object stored under `type_name`.
    pub fn set_list(&mut self, type_name: &str, objects: Vec<Box<dyn ConfigObject>>) -> Result<()> {
        self.set_slot_list(type_name, objects.into_iter().map(ObjectSlot::new).collect())
    }

    /// Replace every object stored under `type_name`, keeping the slots'
    /// identities and appearance indexes.
    pub fn set_slot_list(&mut self, type_name: &str, slots: Vec<ObjectSlot>) -> Result<()> {
        if let Some(role) = Role::from_type_name(type_name) {
            for slot in &slots {
                let spec = slot.object.class_spec();
                if !spec.has_capability(role.capability()) {
                    return Err(ConfigError::WrongObjectType {
                        type_name: type_name.to_string(),
                        expected: role.capability().to_string(),
                        actual: spec.class_name.to_string(),
                    });
                }
            }
            if !role.supports_list() && slots.len() > 1 {
                return Err(ConfigError::TooManyObjects {
                    type_name: type_name.to_string(),
                });
            }
            if role.is_device_role() {
                return self.single_device_mut(type_name)?.replace_slots(role, slots);
            }
        }
        match self.objects.iter_mut().find(|(name, _)| name == type_name) {
            Some((_, existing)) => *existing = slots,
            None => self.objects.push((type_name.to_string(), slots)),
        }
        Ok(())
    }

    pub fn devices(&self) -> &[DeviceConfiguration] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Result<&DeviceConfiguration> {
        self.devices
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| ConfigError::UnknownDevice {
                name: name.to_string(),
            })
    }

    pub fn device_mut(&mut self, name: &str) -> Result<&mut DeviceConfiguration> {
        self.devices
            .iter_mut()
            .find(|d| d.name() == name)
            .ok_or_else(|| ConfigError::UnknownDevice {
                name: name.to_string(),
            })
    }

    pub fn set_devices(&mut self, devices: Vec<DeviceConfiguration>, multi_device: bool) {
        self.devices = devices;
        self.multi_device = multi_device;
    }

    pub fn is_multi_device(&self) -> bool {
        self.multi_device
    }

    pub fn build_provider(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::BuildProvider.type_name())
    }

    pub fn target_preparers(&self) -> Result<Vec<&dyn ConfigObject>> {
        Ok(self
            .single_device(Role::TargetPreparer.type_name())?
            .target_preparers())
    }

    pub fn device_recovery(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::DeviceRecovery.type_name())
    }

    pub fn device_requirements(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::DeviceRequirements.type_name())
    }

    pub fn device_options(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::DeviceOptions.type_name())
    }

    pub fn tests(&self) -> Vec<&dyn ConfigObject> {
        self.get_list(Role::Test.type_name())
    }

    pub fn multi_target_preparers(&self) -> Vec<&dyn ConfigObject> {
        self.get_list(Role::MultiTargetPreparer.type_name())
    }

    pub fn result_reporters(&self) -> Vec<&dyn ConfigObject> {
        self.get_list(Role::ResultReporter.type_name())
    }

    pub fn metric_collectors(&self) -> Vec<&dyn ConfigObject> {
        self.get_list(Role::MetricsCollector.type_name())
    }

    pub fn system_checkers(&self) -> Vec<&dyn ConfigObject> {
        self.get_list(Role::SystemChecker.type_name())
    }

    pub fn logger(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::Logger.type_name())
    }

    pub fn log_saver(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::LogSaver.type_name())
    }

    pub fn command_options(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::CommandOptions.type_name())
    }

    pub fn configuration_descriptor(&self) -> Result<&dyn ConfigObject> {
        self.get(Role::ConfigDescriptor.type_name())
    }

    /// Every object: flat objects by type name, then each device's members.
    pub fn all_objects(&self) -> Vec<PlacedObject<'_>> {
        let mut placed: Vec<PlacedObject<'_>> = self
            .objects
            .iter()
            .flat_map(|(type_name, slots)| {
                slots.iter().map(move |slot| PlacedObject {
                    type_name,
                    device: None,
                    slot,
                })
            })
            .collect();
        for device in &self.devices {
            placed.extend(device.all_slots().into_iter().map(|(role, slot)| PlacedObject {
                type_name: role.type_name(),
                device: Some(device),
                slot,
            }));
        }
        placed
    }

    /// Binding sources over every object, in [`Configuration::all_objects`] order.
    pub fn option_sources(&mut self) -> Vec<OptionSource<'_>> {
        let mut sources = Vec::new();
        for (_, slots) in &mut self.objects {
            sources.extend(slots.iter_mut().map(|slot| OptionSource::from_slot(slot, None)));
        }
        for device in &mut self.devices {
            let name = device.name().to_string();
            for slot in device.all_slots_mut() {
                sources.push(OptionSource::from_slot(slot, Some(&name)));
            }
        }
        sources
    }

    pub fn inject_option_value(&mut self, name: &str, value: &str) -> Result<()> {
        self.inject_option_values(&[OptionDef::new(name, value, INJECTED_SOURCE)])
    }

    pub fn inject_option_value_with_key(&mut self, name: &str, key: &str, value: &str) -> Result<()> {
        self.inject_option_values(&[OptionDef::new(name, value, INJECTED_SOURCE).with_key(key)])
    }

    /// Apply option values in order, recording each value's source against
    /// the fields it reached.
    pub fn inject_option_values(&mut self, defs: &[OptionDef]) -> Result<()> {
        if defs.is_empty() {
            return Ok(());
        }
        let mut applied = Vec::with_capacity(defs.len());
        {
            let mut setter = OptionSetter::new(self.option_sources())?;
            for def in defs {
                let affected = inject_into(&mut setter, def)?;
                applied.push((affected, def.source.as_str()));
            }
        }
        for (affected, source) in applied {
            self.record_sources(affected, source);
        }
        Ok(())
    }

    /// Apply command-line arguments strictly and return the positional
    /// arguments that follow the options.
    pub fn set_options_from_command_line(
        &mut self,
        args: &[String],
        keystore: Option<&dyn KeyStoreClient>,
    ) -> Result<Vec<String>> {
        let descriptor_ids: HashSet<ObjectId> = self
            .slots_of(Role::ConfigDescriptor.type_name())
            .iter()
            .map(|slot| slot.id)
            .collect();
        let (leftovers, applied) = {
            let mut setter = OptionSetter::new(self.option_sources())?;
            let mut parser = ArgsParser::new(&mut setter).with_keystore(keystore);
            let leftovers = parser.parse(args)?;
            (leftovers, parser.applied().to_vec())
        };
        if let Some(def) = applied.iter().find(|def| descriptor_ids.contains(&def.object)) {
            return Err(ConfigError::OptionNotAllowed {
                name: def.field.to_string(),
            });
        }
        self.record_sources(applied, COMMAND_LINE_SOURCE);
        Ok(leftovers)
    }

    fn field_accumulates(&self, def: &FieldDef) -> bool {
        self.all_objects()
            .into_iter()
            .find(|placed| placed.slot.id == def.object)
            .and_then(|placed| {
                placed
                    .object()
                    .fields()
                    .iter()
                    .find(|slot| slot.descriptor.name == def.field)
                    .map(|slot| slot.descriptor.kind.is_collection() || slot.descriptor.kind.is_map())
            })
            .unwrap_or(false)
    }

    fn record_sources(&mut self, affected: Vec<FieldDef>, source: &str) {
        for def in affected {
            let accumulates = self.field_accumulates(&def);
            let sources = self.field_sources.entry(def).or_default();
            if !accumulates {
                sources.clear();
            }
            sources.push(source.to_string());
        }
    }

    /// Sources recorded for one field, across map keys, sorted.
    pub fn field_sources(&self, object: ObjectId, field: &str) -> Vec<String> {
        let found: BTreeSet<&String> = self
            .field_sources
            .iter()
            .filter(|(def, _)| def.object == object && def.field == field)
            .flat_map(|(_, sources)| sources.iter())
            .collect();
        found.into_iter().cloned().collect()
    }

    /// Sources recorded for exactly this field and key, in application order.
    pub fn option_provenance(&self, def: &FieldDef) -> &[String] {
        self.field_sources.get(def).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set_command_line(&mut self, args: &[String]) {
        self.command_line = Some(args.to_vec());
    }

    pub fn command_line(&self) -> Option<String> {
        self.command_line.as_ref().map(|args| args.join(" "))
    }

    /// Names of mandatory options still unset on any object.
    pub fn missing_mandatory_options(&self) -> BTreeSet<String> {
        self.all_objects()
            .into_iter()
            .flat_map(|placed| placed.object().fields().iter())
            .filter(|slot| slot.descriptor.mandatory && slot.value.is_unset())
            .map(|slot| slot.descriptor.name.to_string())
            .collect()
    }

    /// Check mandatory options on every object and the sharding options.
    pub fn validate_options(&self) -> Result<()> {
        let missing = self.missing_mandatory_options();
        if !missing.is_empty() {
            return Err(ConfigError::MissingMandatoryOptions {
                names: missing.into_iter().collect(),
            });
        }
        let Ok(command) = self.command_options() else {
            return Ok(());
        };
        let fields = command.fields();
        match (fields.get_i64("shard-count"), fields.get_i64("shard-index")) {
            (Some(count), _) if count < 1 => Err(ConfigError::InvalidOptionValue {
                option: "shard-count".to_string(),
                reason: format!("must be at least 1, got {}", count),
            }),
            (Some(count), Some(index)) if index < 0 || index >= count => Err(ConfigError::InvalidOptionValue {
                option: "shard-index".to_string(),
                reason: format!("{} must be between 0 and shard-count ({}) exclusive", index, count),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidOptionValue {
                option: "shard-index".to_string(),
                reason: "requires --shard-count to be set".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn inject_into(setter: &mut OptionSetter<'_>, def: &OptionDef) -> Result<Vec<FieldDef>> {
    debug!("Injecting option '{}' from {}", def.name, def.source);
    if def.key.is_none() && setter.is_map_option(&def.name)? {
        let (key, value) = split_key_value(&def.value).ok_or_else(|| ConfigError::TypeCoercion {
            option: def.name.clone(),
            what: "value",
            value: def.value.clone(),
            type_name: "key=value pair".to_string(),
        })?;
        return setter.set_option_value(&def.name, Some(&key), &value);
    }
    setter.set_option_value(&def.name, def.key.as_deref(), &def.value)
}
