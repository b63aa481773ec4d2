//! Per-device object bundles.

use super::role::Role;
use crate::error::{ConfigError, Result};
use crate::objects::builtin::{
    new_object, DEVICE_SELECTION_OPTIONS, STUB_BUILD_PROVIDER, TEST_DEVICE_OPTIONS,
    WAIT_DEVICE_RECOVERY,
};
use crate::objects::{ConfigObject, ObjectId, ObjectSlot};

/// The objects attached to one device: a build provider, target preparers,
/// recovery, device selection and device options.
#[derive(Debug, Clone)]
pub struct DeviceConfiguration {
    name: String,
    is_fake: bool,
    build_provider: ObjectSlot,
    target_preparers: Vec<ObjectSlot>,
    recovery: ObjectSlot,
    selection: ObjectSlot,
    options: ObjectSlot,
}

impl DeviceConfiguration {
    /// A bundle holding the default object for every single-valued role.
    pub fn new(name: impl Into<String>, is_fake: bool) -> Self {
        Self {
            name: name.into(),
            is_fake,
            build_provider: ObjectSlot::new(new_object(&STUB_BUILD_PROVIDER)),
            target_preparers: Vec::new(),
            recovery: ObjectSlot::new(new_object(&WAIT_DEVICE_RECOVERY)),
            selection: ObjectSlot::new(new_object(&DEVICE_SELECTION_OPTIONS)),
            options: ObjectSlot::new(new_object(&TEST_DEVICE_OPTIONS)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_fake(&self) -> bool {
        self.is_fake
    }

    /// Place an object. Single-valued roles replace the current object,
    /// target preparers append.
    pub fn add_specific(
        &mut self,
        role: Role,
        object: Box<dyn ConfigObject>,
        appearance: Option<usize>,
    ) -> Result<()> {
        let slot = ObjectSlot {
            appearance,
            ..ObjectSlot::new(object)
        };
        self.add_slot(role, slot)
    }

    pub(crate) fn add_slot(&mut self, role: Role, slot: ObjectSlot) -> Result<()> {
        check_device_role(role, slot.object.as_ref())?;
        match role {
            Role::BuildProvider => self.build_provider = slot,
            Role::TargetPreparer => self.target_preparers.push(slot),
            Role::DeviceRecovery => self.recovery = slot,
            Role::DeviceRequirements => self.selection = slot,
            Role::DeviceOptions => self.options = slot,
            _ => unreachable_role(role, slot.object.as_ref())?,
        }
        Ok(())
    }

    /// Replace every object of a role.
    pub(crate) fn replace_slots(&mut self, role: Role, mut slots: Vec<ObjectSlot>) -> Result<()> {
        for slot in &slots {
            check_device_role(role, slot.object.as_ref())?;
        }
        if role == Role::TargetPreparer {
            self.target_preparers = slots;
            return Ok(());
        }
        match (slots.pop(), slots.is_empty()) {
            (Some(slot), true) => self.add_slot(role, slot),
            (Some(_), false) => Err(ConfigError::TooManyObjects {
                type_name: role.type_name().to_string(),
            }),
            (None, _) => Err(ConfigError::AmbiguousSingleAccess {
                type_name: role.type_name().to_string(),
                count: 0,
            }),
        }
    }

    /// Objects filling `role`, in placement order.
    pub fn objects_for(&self, role: Role) -> Vec<&dyn ConfigObject> {
        self.slots_for(role).into_iter().map(|s| s.object.as_ref()).collect()
    }

    pub fn slots_for(&self, role: Role) -> Vec<&ObjectSlot> {
        match role {
            Role::BuildProvider => vec![&self.build_provider],
            Role::TargetPreparer => self.target_preparers.iter().collect(),
            Role::DeviceRecovery => vec![&self.recovery],
            Role::DeviceRequirements => vec![&self.selection],
            Role::DeviceOptions => vec![&self.options],
            _ => Vec::new(),
        }
    }

    /// Every member with its role: build provider, preparers, recovery,
    /// selection, options.
    pub fn all_slots(&self) -> Vec<(Role, &ObjectSlot)> {
        let mut slots = vec![(Role::BuildProvider, &self.build_provider)];
        slots.extend(self.target_preparers.iter().map(|s| (Role::TargetPreparer, s)));
        slots.push((Role::DeviceRecovery, &self.recovery));
        slots.push((Role::DeviceRequirements, &self.selection));
        slots.push((Role::DeviceOptions, &self.options));
        slots
    }

    pub fn all_slots_mut(&mut self) -> Vec<&mut ObjectSlot> {
        let mut slots = vec![&mut self.build_provider];
        slots.extend(self.target_preparers.iter_mut());
        slots.push(&mut self.recovery);
        slots.push(&mut self.selection);
        slots.push(&mut self.options);
        slots
    }

    /// Appearance index recorded for a member object.
    pub fn appearance_of(&self, id: ObjectId) -> Option<usize> {
        self.all_slots()
            .into_iter()
            .find(|(_, slot)| slot.id == id)
            .and_then(|(_, slot)| slot.appearance)
    }

    pub fn build_provider(&self) -> &dyn ConfigObject {
        self.build_provider.object.as_ref()
    }

    pub fn target_preparers(&self) -> Vec<&dyn ConfigObject> {
        self.objects_for(Role::TargetPreparer)
    }

    pub fn device_recovery(&self) -> &dyn ConfigObject {
        self.recovery.object.as_ref()
    }

    pub fn device_requirements(&self) -> &dyn ConfigObject {
        self.selection.object.as_ref()
    }

    pub fn device_options(&self) -> &dyn ConfigObject {
        self.options.object.as_ref()
    }
}

fn check_device_role(role: Role, object: &dyn ConfigObject) -> Result<()> {
    if !role.is_device_role() {
        return unreachable_role(role, object);
    }
    let spec = object.class_spec();
    if spec.has_capability(role.capability()) {
        Ok(())
    } else {
        Err(ConfigError::WrongObjectType {
            type_name: role.type_name().to_string(),
            expected: role.capability().to_string(),
            actual: spec.class_name.to_string(),
        })
    }
}

fn unreachable_role(role: Role, object: &dyn ConfigObject) -> Result<()> {
    Err(ConfigError::NotADeviceRole {
        class_name: object.class_name().to_string(),
        type_name: role.type_name().to_string(),
    })
}
