//! Turns a [`Definition`] into a live [`Configuration`].

use super::device::DeviceConfiguration;
use super::role::Role;
use super::store::Configuration;
use crate::definition::{Definition, DEFAULT_DEVICE_NAME};
use crate::error::{ConfigError, Result};
use crate::objects::{Capability, ClassRegistry, ConfigObject, ObjectSlot};
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;

static DEVICE_TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*):(.*)$").unwrap());

/// Instantiates declared objects through a [`ClassRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct ObjectGraphResolver<'r> {
    registry: &'r ClassRegistry,
}

impl<'r> ObjectGraphResolver<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self { registry }
    }

    /// Build a configuration from `definition` and apply its option values.
    ///
    /// Every class that fails to load is collected before the error is
    /// returned, so the caller sees all broken references at once.
    pub fn resolve(&self, definition: &Definition) -> Result<Configuration> {
        let mut config = Configuration::new(definition.name(), definition.description());
        let multi_device = definition.is_multi_device();

        let mut devices = Vec::new();
        let mut hybrid_device = None;
        if multi_device {
            let real = definition.expected_devices().iter().filter(|(_, fake)| !fake).count();
            if real == 0 {
                return Err(ConfigError::NoDutDevice);
            }
            hybrid_device = definition.hybrid_real_device();
            for (name, is_fake) in definition.expected_devices() {
                devices.push(DeviceConfiguration::new(name.clone(), *is_fake));
            }
            info!(
                "Resolving '{}' for {} devices{}",
                definition.name(),
                devices.len(),
                if hybrid_device.is_some() { " (single real device)" } else { "" }
            );
        } else {
            devices.push(DeviceConfiguration::new(DEFAULT_DEVICE_NAME, false));
        }

        let mut rejected: Vec<(String, String)> = Vec::new();
        for (type_name, defs) in definition.object_entries() {
            let (device_name, role_name) = match DEVICE_TYPE_PATTERN.captures(type_name) {
                Some(caps) => (
                    caps.get(1).map(|m| m.as_str()),
                    caps.get(2).map_or(type_name.as_str(), |m| m.as_str()),
                ),
                None => (None, type_name.as_str()),
            };
            let role = Role::from_type_name(role_name);

            let mut flat_slots = Vec::new();
            for def in defs {
                let object = match self.registry.create(&def.class_name, type_name) {
                    Ok(object) => object,
                    Err(ConfigError::ClassNotFound { rejected: mut failures }) => {
                        warn!("Could not load class '{}' for '{}'", def.class_name, type_name);
                        rejected.append(&mut failures);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                check_coherence(role_name, object.as_ref())?;

                let target = match (device_name, role) {
                    (Some(name), Some(role)) => Some((name, role)),
                    (Some(_), None) => {
                        return Err(ConfigError::NotADeviceRole {
                            class_name: def.class_name.clone(),
                            type_name: type_name.clone(),
                        })
                    }
                    (None, Some(role)) if role.is_device_role() => {
                        let name = match (multi_device, hybrid_device) {
                            (false, _) => DEFAULT_DEVICE_NAME,
                            (true, Some(real)) => real,
                            (true, None) => {
                                return Err(ConfigError::RolesOutsideDevice {
                                    roles: vec![role_name.to_string()],
                                })
                            }
                        };
                        Some((name, role))
                    }
                    (None, _) => None,
                };

                match target {
                    Some((name, role)) => {
                        let device = match devices.iter_mut().position(|d| d.name() == name) {
                            Some(index) => &mut devices[index],
                            None => {
                                let is_fake = definition
                                    .expected_devices()
                                    .iter()
                                    .find(|(n, _)| n == name)
                                    .is_some_and(|(_, fake)| *fake);
                                devices.push(DeviceConfiguration::new(name, is_fake));
                                let last = devices.len() - 1;
                                &mut devices[last]
                            }
                        };
                        debug!("Placing {} as {} on device '{}'", def.class_name, role, name);
                        device.add_specific(role, object, Some(def.appearance))?;
                    }
                    None => flat_slots.push(ObjectSlot::with_appearance(object, def.appearance)),
                }
            }
            if !flat_slots.is_empty() {
                config.set_slot_list(type_name, flat_slots)?;
            }
        }

        if !rejected.is_empty() {
            return Err(ConfigError::ClassNotFound { rejected });
        }

        config.set_devices(devices, multi_device);
        config.inject_option_values(definition.options())?;
        Ok(config)
    }
}

fn check_coherence(role_name: &str, object: &dyn ConfigObject) -> Result<()> {
    if role_name == Role::ResultReporter.type_name()
        && object.class_spec().has_capability(Capability::MetricCollector)
    {
        return Err(ConfigError::IncoherentDeclaration {
            class_name: object.class_name().to_string(),
            type_name: role_name.to_string(),
            reason: format!(
                "metric collectors must be declared as <{}>",
                Role::MetricsCollector.type_name()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::OptionDef;
    use crate::objects::builtin::{
        BASE_METRIC_COLLECTOR, STUB_BUILD_PROVIDER, STUB_TARGET_PREPARER, STUB_TEST,
    };
    use crate::objects::ClassSpec;
    use crate::option::descriptor::{FieldKind, OptionDescriptor, ValueType};

    const FOO_OPTIONS: &[OptionDescriptor] =
        &[OptionDescriptor::new("iterations", FieldKind::Scalar(ValueType::Int)).default_value("1")];
    static FOO_TEST: ClassSpec = ClassSpec {
        class_name: "com.x.FooTest",
        alias: None,
        global_namespace: true,
        capabilities: &[Capability::RemoteTest],
        options: &[FOO_OPTIONS],
    };

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::with_builtins();
        registry.register_spec(&FOO_TEST);
        registry
    }

    #[test]
    fn test_flat_objects_and_options() {
        let mut def = Definition::new("cfg");
        def.add_object("test", FOO_TEST.class_name);
        def.add_option(OptionDef::new("com.x.FooTest:1:iterations", "3", "cfg.xml"));
        let config = ObjectGraphResolver::new(&registry()).resolve(&def).unwrap();
        let tests = config.tests();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].class_name(), "com.x.FooTest");
        assert_eq!(tests[0].fields().get_i64("iterations"), Some(3));
        assert!(!config.is_multi_device());
    }

    #[test]
    fn test_class_errors_are_aggregated() {
        let mut def = Definition::new("cfg");
        def.add_object("test", "com.x.Missing");
        def.add_object("target_preparer", STUB_TARGET_PREPARER.class_name);
        def.add_object("result_reporter", "com.x.AlsoMissing");
        match ObjectGraphResolver::new(&registry()).resolve(&def) {
            Err(ConfigError::ClassNotFound { rejected }) => assert_eq!(
                rejected,
                vec![
                    ("com.x.Missing".to_string(), "test".to_string()),
                    ("com.x.AlsoMissing".to_string(), "result_reporter".to_string()),
                ]
            ),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_hybrid_topology() {
        let mut def = Definition::new("cfg");
        def.set_multi_device(true);
        def.add_expected_device("dut", false);
        def.add_expected_device("fake1", true);
        def.add_expected_device("fake2", true);
        def.add_object("target_preparer", STUB_TARGET_PREPARER.class_name);
        def.add_object("fake1:build_provider", STUB_BUILD_PROVIDER.class_name);
        let config = ObjectGraphResolver::new(&registry()).resolve(&def).unwrap();

        assert!(config.is_multi_device());
        assert_eq!(config.devices().len(), 3);
        assert_eq!(config.device("dut").unwrap().target_preparers().len(), 1);
        assert!(config.device("fake1").unwrap().target_preparers().is_empty());
        assert!(config.device("fake1").unwrap().is_fake());
        let provider = config.device("fake1").unwrap().slots_for(Role::BuildProvider)[0];
        assert_eq!(provider.appearance, Some(1));
    }

    #[test]
    fn test_two_real_devices_reject_outside_roles() {
        let mut def = Definition::new("cfg");
        def.set_multi_device(true);
        def.add_expected_device("dut1", false);
        def.add_expected_device("dut2", false);
        def.add_object("target_preparer", STUB_TARGET_PREPARER.class_name);
        assert!(matches!(
            ObjectGraphResolver::new(&registry()).resolve(&def),
            Err(ConfigError::RolesOutsideDevice { .. })
        ));
    }

    #[test]
    fn test_no_real_device() {
        let mut def = Definition::new("cfg");
        def.set_multi_device(true);
        def.add_expected_device("fake", true);
        assert!(matches!(
            ObjectGraphResolver::new(&registry()).resolve(&def),
            Err(ConfigError::NoDutDevice)
        ));
    }

    #[test]
    fn test_metric_collector_as_reporter_is_incoherent() {
        let mut def = Definition::new("cfg");
        def.add_object("result_reporter", BASE_METRIC_COLLECTOR.class_name);
        assert!(matches!(
            ObjectGraphResolver::new(&registry()).resolve(&def),
            Err(ConfigError::IncoherentDeclaration { .. })
        ));
    }

    #[test]
    fn test_wrong_object_type_for_role() {
        let mut def = Definition::new("cfg");
        def.add_object("build_provider", STUB_TEST.class_name);
        assert!(matches!(
            ObjectGraphResolver::new(&registry()).resolve(&def),
            Err(ConfigError::WrongObjectType { .. })
        ));
    }

    #[test]
    fn test_device_options_bind_with_device_prefix() {
        let mut def = Definition::new("cfg");
        def.set_multi_device(true);
        def.add_expected_device("dut1", false);
        def.add_expected_device("dut2", false);
        def.add_object("dut1:build_provider", STUB_BUILD_PROVIDER.class_name);
        def.add_object("dut2:build_provider", STUB_BUILD_PROVIDER.class_name);
        def.add_option(OptionDef::new("{dut2}build-id", "42", "cfg.xml"));
        let config = ObjectGraphResolver::new(&registry()).resolve(&def).unwrap();
        let id_of = |name: &str| {
            config
                .device(name)
                .unwrap()
                .build_provider()
                .fields()
                .get_str("build-id")
                .map(str::to_string)
        };
        assert_eq!(id_of("dut1").as_deref(), Some("0"));
        assert_eq!(id_of("dut2").as_deref(), Some("42"));
    }
}
