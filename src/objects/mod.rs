//! Configuration objects.
//!
//! Every object placed in a configuration implements [`ConfigObject`]. Its
//! class is described by a static [`ClassSpec`]: the class name used in
//! declaration documents, an optional option alias, whether its options join
//! the global namespace, the capabilities it provides, and its option tables.

pub mod builtin;
pub mod declared;
pub mod registry;

pub use declared::DeclaredObject;
pub use registry::{ClassRegistry, Factory};

use crate::option::{OptionDescriptor, OptionFields};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A role-level capability an object can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BuildProvider,
    TargetPreparer,
    MultiTargetPreparer,
    RemoteTest,
    DeviceRecovery,
    LeveledLogOutput,
    LogSaver,
    InvocationListener,
    CommandOptions,
    DeviceSelection,
    DeviceOptions,
    SystemStatusChecker,
    ConfigurationDescriptor,
    MetricCollector,
    SandboxOptions,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::BuildProvider => "IBuildProvider",
            Capability::TargetPreparer => "ITargetPreparer",
            Capability::MultiTargetPreparer => "IMultiTargetPreparer",
            Capability::RemoteTest => "IRemoteTest",
            Capability::DeviceRecovery => "IDeviceRecovery",
            Capability::LeveledLogOutput => "ILeveledLogOutput",
            Capability::LogSaver => "ILogSaver",
            Capability::InvocationListener => "ITestInvocationListener",
            Capability::CommandOptions => "ICommandOptions",
            Capability::DeviceSelection => "IDeviceSelection",
            Capability::DeviceOptions => "TestDeviceOptions",
            Capability::SystemStatusChecker => "ISystemStatusChecker",
            Capability::ConfigurationDescriptor => "ConfigurationDescriptor",
            Capability::MetricCollector => "IMetricCollector",
            Capability::SandboxOptions => "SandboxOptions",
        };
        f.write_str(name)
    }
}

/// Static description of a bindable class.
#[derive(Debug)]
pub struct ClassSpec {
    pub class_name: &'static str,
    pub alias: Option<&'static str>,
    pub global_namespace: bool,
    pub capabilities: &'static [Capability],
    /// Own options first, then inherited tables.
    pub options: &'static [&'static [OptionDescriptor]],
}

impl ClassSpec {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// An object that can be placed in a configuration and receive option values.
pub trait ConfigObject: fmt::Debug + Send + Sync {
    fn class_spec(&self) -> &'static ClassSpec;

    fn fields(&self) -> &OptionFields;

    fn fields_mut(&mut self) -> &mut OptionFields;

    fn box_clone(&self) -> Box<dyn ConfigObject>;

    fn as_any(&self) -> &dyn Any;

    fn class_name(&self) -> &'static str {
        self.class_spec().class_name
    }
}

impl Clone for Box<dyn ConfigObject> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Identity of an object within a configuration, stable across clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An object held by a configuration or device bundle.
#[derive(Debug, Clone)]
pub struct ObjectSlot {
    pub id: ObjectId,
    /// Appearance index recorded when the object came from a definition.
    pub appearance: Option<usize>,
    pub object: Box<dyn ConfigObject>,
}

impl ObjectSlot {
    pub fn new(object: Box<dyn ConfigObject>) -> Self {
        Self {
            id: ObjectId::next(),
            appearance: None,
            object,
        }
    }

    pub fn with_appearance(object: Box<dyn ConfigObject>, appearance: usize) -> Self {
        Self {
            appearance: Some(appearance),
            ..Self::new(object)
        }
    }
}
