//! Built-in roles and their placement rules.

use crate::objects::Capability;
use std::fmt;

/// Element name of a device bundle in declaration documents.
pub const DEVICE_TYPE_NAME: &str = "device";

/// A built-in semantic category of configuration object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    BuildProvider,
    TargetPreparer,
    MultiTargetPreparer,
    Test,
    DeviceRecovery,
    DeviceRequirements,
    DeviceOptions,
    Logger,
    LogSaver,
    ResultReporter,
    CommandOptions,
    SystemChecker,
    ConfigDescriptor,
    MetricsCollector,
    SandboxOptions,
}

impl Role {
    /// Every role, in the order objects are listed in dumps.
    pub const ALL: [Role; 15] = [
        Role::BuildProvider,
        Role::TargetPreparer,
        Role::MultiTargetPreparer,
        Role::Test,
        Role::DeviceRecovery,
        Role::DeviceRequirements,
        Role::DeviceOptions,
        Role::Logger,
        Role::LogSaver,
        Role::ResultReporter,
        Role::CommandOptions,
        Role::SystemChecker,
        Role::ConfigDescriptor,
        Role::MetricsCollector,
        Role::SandboxOptions,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            Role::BuildProvider => "build_provider",
            Role::TargetPreparer => "target_preparer",
            Role::MultiTargetPreparer => "multi_target_preparer",
            Role::Test => "test",
            Role::DeviceRecovery => "device_recovery",
            Role::DeviceRequirements => "device_requirements",
            Role::DeviceOptions => "device_options",
            Role::Logger => "logger",
            Role::LogSaver => "log_saver",
            Role::ResultReporter => "result_reporter",
            Role::CommandOptions => "cmd_options",
            Role::SystemChecker => "system_checker",
            Role::ConfigDescriptor => "config_desc",
            Role::MetricsCollector => "metrics_collector",
            Role::SandboxOptions => "sandbox_options",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.type_name() == name)
    }

    /// Capability an object must provide to fill this role.
    pub fn capability(self) -> Capability {
        match self {
            Role::BuildProvider => Capability::BuildProvider,
            Role::TargetPreparer => Capability::TargetPreparer,
            Role::MultiTargetPreparer => Capability::MultiTargetPreparer,
            Role::Test => Capability::RemoteTest,
            Role::DeviceRecovery => Capability::DeviceRecovery,
            Role::DeviceRequirements => Capability::DeviceSelection,
            Role::DeviceOptions => Capability::DeviceOptions,
            Role::Logger => Capability::LeveledLogOutput,
            Role::LogSaver => Capability::LogSaver,
            Role::ResultReporter => Capability::InvocationListener,
            Role::CommandOptions => Capability::CommandOptions,
            Role::SystemChecker => Capability::SystemStatusChecker,
            Role::ConfigDescriptor => Capability::ConfigurationDescriptor,
            Role::MetricsCollector => Capability::MetricCollector,
            Role::SandboxOptions => Capability::SandboxOptions,
        }
    }

    /// Whether more than one object may fill the role.
    pub fn supports_list(self) -> bool {
        matches!(
            self,
            Role::TargetPreparer
                | Role::MultiTargetPreparer
                | Role::Test
                | Role::ResultReporter
                | Role::SystemChecker
                | Role::MetricsCollector
        )
    }

    /// Whether the role belongs to a device bundle.
    pub fn is_device_role(self) -> bool {
        matches!(
            self,
            Role::BuildProvider
                | Role::TargetPreparer
                | Role::DeviceRecovery
                | Role::DeviceRequirements
                | Role::DeviceOptions
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Type names that custom `<object>` declarations may not use.
pub fn is_reserved_type_name(name: &str) -> bool {
    name == DEVICE_TYPE_NAME || Role::from_type_name(name).is_some()
}
