//! Built-in classes used as role defaults and for simple declarations.

use super::{Capability, ClassSpec, ConfigObject, DeclaredObject};
use crate::option::descriptor::{FieldKind, Importance, OptionDescriptor, UpdateRule, ValueType};

const LOG_LEVELS: &[&str] = &["VERBOSE", "DEBUG", "INFO", "WARN", "ERROR"];

const BUILD_PROVIDER_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("build-id", FieldKind::Scalar(ValueType::Str))
        .description("build id to supply.")
        .default_value("0"),
    OptionDescriptor::new("build-target", FieldKind::Scalar(ValueType::Str))
        .description("build target name to supply.")
        .default_value("stub"),
    OptionDescriptor::new("branch", FieldKind::Scalar(ValueType::Str))
        .description("build branch name to supply."),
    OptionDescriptor::new("build-attribute", FieldKind::Map(ValueType::Str, ValueType::Str))
        .description("build attributes to supply."),
];

pub static STUB_BUILD_PROVIDER: ClassSpec = ClassSpec {
    class_name: "rigcfg.build.StubBuildProvider",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::BuildProvider],
    options: &[BUILD_PROVIDER_OPTIONS],
};

const TARGET_PREPARER_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("disable", FieldKind::Scalar(ValueType::Bool))
        .description("disables the target preparer.")
        .default_value("false"),
    OptionDescriptor::new("test-boolean-option", FieldKind::Scalar(ValueType::Bool))
        .description("boolean option used to exercise per-device binding.")
        .default_value("true"),
];

pub static STUB_TARGET_PREPARER: ClassSpec = ClassSpec {
    class_name: "rigcfg.targetprep.StubTargetPreparer",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::TargetPreparer],
    options: &[TARGET_PREPARER_OPTIONS],
};

const MULTI_PREPARER_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new(
    "disable",
    FieldKind::Scalar(ValueType::Bool),
)
.description("disables the multi target preparer.")
.default_value("false")];

pub static STUB_MULTI_TARGET_PREPARER: ClassSpec = ClassSpec {
    class_name: "rigcfg.targetprep.multi.StubMultiTargetPreparer",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::MultiTargetPreparer],
    options: &[MULTI_PREPARER_OPTIONS],
};

const STUB_TEST_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("run-test", FieldKind::Scalar(ValueType::Bool))
        .description("whether the stub test should report a run.")
        .default_value("false"),
    OptionDescriptor::new("test-name", FieldKind::Scalar(ValueType::Str))
        .description("name reported for the stub run.")
        .default_value("stub"),
];

pub static STUB_TEST: ClassSpec = ClassSpec {
    class_name: "rigcfg.testtype.StubTest",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::RemoteTest],
    options: &[STUB_TEST_OPTIONS],
};

const RECOVERY_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("online-wait-time", FieldKind::Scalar(ValueType::Long))
        .description("time to wait for a device to come back online.")
        .time_val()
        .default_value("1m"),
    OptionDescriptor::new("disable-unresponsive-reboot", FieldKind::Scalar(ValueType::Bool))
        .description("never reboot a device that stops responding.")
        .default_value("false"),
];

pub static WAIT_DEVICE_RECOVERY: ClassSpec = ClassSpec {
    class_name: "rigcfg.device.WaitDeviceRecovery",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::DeviceRecovery],
    options: &[RECOVERY_OPTIONS],
};

const SELECTION_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("serial", FieldKind::Collection(ValueType::Str))
        .short('s')
        .description("run on the device with this serial.")
        .importance(Importance::Always),
    OptionDescriptor::new("exclude-serial", FieldKind::Collection(ValueType::Str))
        .description("never run on the device with this serial."),
    OptionDescriptor::new("product-type", FieldKind::Collection(ValueType::Str))
        .description("run on a device with this product type."),
    OptionDescriptor::new("min-battery", FieldKind::Scalar(ValueType::Int))
        .description("only run on devices with at least this battery level.")
        .rule(UpdateRule::Greatest),
    OptionDescriptor::new("null-device", FieldKind::Scalar(ValueType::Bool))
        .description("allocate a placeholder device instead of a physical one.")
        .default_value("false"),
];

pub static DEVICE_SELECTION_OPTIONS: ClassSpec = ClassSpec {
    class_name: "rigcfg.device.DeviceSelectionOptions",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::DeviceSelection],
    options: &[SELECTION_OPTIONS],
};

const DEVICE_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("enable-root", FieldKind::Scalar(ValueType::Bool))
        .description("enable root on the device.")
        .default_value("true"),
    OptionDescriptor::new("reboot-timeout", FieldKind::Scalar(ValueType::TimeVal))
        .description("time to wait for a device to finish rebooting.")
        .default_value("2m"),
    OptionDescriptor::new("max-tmp-logcat-file", FieldKind::Scalar(ValueType::Long))
        .description("maximum size of a temporary device log, in bytes.")
        .default_value("20971520"),
];

pub static TEST_DEVICE_OPTIONS: ClassSpec = ClassSpec {
    class_name: "rigcfg.device.TestDeviceOptions",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::DeviceOptions],
    options: &[DEVICE_OPTIONS],
};

const COMMAND_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("help", FieldKind::Scalar(ValueType::Bool))
        .description("display the help text for the most important options.")
        .importance(Importance::Always)
        .default_value("false"),
    OptionDescriptor::new("dry-run", FieldKind::Scalar(ValueType::Bool))
        .description("build the configuration without running it.")
        .default_value("false"),
    OptionDescriptor::new("loop", FieldKind::Scalar(ValueType::Bool))
        .description("keep running continuously.")
        .default_value("false"),
    OptionDescriptor::new("min-loop-time", FieldKind::Scalar(ValueType::Long))
        .description("minimum time between loop iterations.")
        .time_val()
        .default_value("10m"),
    OptionDescriptor::new("test-tag", FieldKind::Scalar(ValueType::Str))
        .description("tag identifying this invocation.")
        .default_value("stub"),
    OptionDescriptor::new("shard-count", FieldKind::Scalar(ValueType::Int))
        .description("number of shards to split the invocation into."),
    OptionDescriptor::new("shard-index", FieldKind::Scalar(ValueType::Int))
        .description("index of this shard, starting at 0."),
    OptionDescriptor::new("invocation-timeout", FieldKind::Scalar(ValueType::TimeVal))
        .description("maximum time an invocation may run, 0 for no limit.")
        .default_value("0"),
];

pub static COMMAND_OPTIONS_CLASS: ClassSpec = ClassSpec {
    class_name: "rigcfg.command.CommandOptions",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::CommandOptions],
    options: &[COMMAND_OPTIONS],
};

const DESCRIPTOR_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("test-suite-tag", FieldKind::Collection(ValueType::Str))
        .description("suite tags this configuration belongs to."),
    OptionDescriptor::new("metadata", FieldKind::Map(ValueType::Str, ValueType::Str))
        .description("free-form metadata about the configuration."),
    OptionDescriptor::new("not-shardable", FieldKind::Scalar(ValueType::Bool))
        .description("the configuration cannot be split into shards.")
        .default_value("false"),
];

pub static CONFIGURATION_DESCRIPTOR: ClassSpec = ClassSpec {
    class_name: "rigcfg.config.ConfigurationDescriptor",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::ConfigurationDescriptor],
    options: &[DESCRIPTOR_OPTIONS],
};

const LOGGER_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new(
    "log-level",
    FieldKind::Scalar(ValueType::Enum(LOG_LEVELS)),
)
.description("minimum level of messages to print.")
.importance(Importance::IfUnset)
.default_value("INFO")];

pub static STDOUT_LOGGER: ClassSpec = ClassSpec {
    class_name: "rigcfg.log.StdoutLogger",
    alias: Some("stdout"),
    global_namespace: true,
    capabilities: &[Capability::LeveledLogOutput],
    options: &[LOGGER_OPTIONS],
};

const LOG_SAVER_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("log-file-path", FieldKind::Scalar(ValueType::File))
        .description("root directory for saved logs."),
    OptionDescriptor::new("compress-files", FieldKind::Scalar(ValueType::Bool))
        .description("compress saved logs.")
        .default_value("true"),
];

pub static FILE_SYSTEM_LOG_SAVER: ClassSpec = ClassSpec {
    class_name: "rigcfg.result.FileSystemLogSaver",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::LogSaver],
    options: &[LOG_SAVER_OPTIONS],
};

const REPORTER_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new(
    "show-passed",
    FieldKind::Scalar(ValueType::Bool),
)
.description("also print passing results.")
.default_value("false")];

pub static TEXT_RESULT_REPORTER: ClassSpec = ClassSpec {
    class_name: "rigcfg.result.TextResultReporter",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::InvocationListener],
    options: &[REPORTER_OPTIONS],
};

const COLLECTOR_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new(
    "disable-receiver",
    FieldKind::Scalar(ValueType::Bool),
)
.description("stop collecting metrics.")
.default_value("false")];

pub static BASE_METRIC_COLLECTOR: ClassSpec = ClassSpec {
    class_name: "rigcfg.metric.BaseMetricCollector",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::MetricCollector, Capability::InvocationListener],
    options: &[COLLECTOR_OPTIONS],
};

pub static STUB_SYSTEM_STATUS_CHECKER: ClassSpec = ClassSpec {
    class_name: "rigcfg.suite.checker.StubSystemStatusChecker",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::SystemStatusChecker],
    options: &[],
};

const SANDBOX_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new(
    "use-proto-reporter",
    FieldKind::Scalar(ValueType::Bool),
)
.description("report sandbox results through a structured stream.")
.default_value("false")];

pub static SANDBOX_OPTIONS_CLASS: ClassSpec = ClassSpec {
    class_name: "rigcfg.sandbox.SandboxOptions",
    alias: None,
    global_namespace: true,
    capabilities: &[Capability::SandboxOptions],
    options: &[SANDBOX_OPTIONS],
};

/// Every built-in class.
pub static ALL: &[&ClassSpec] = &[
    &STUB_BUILD_PROVIDER,
    &STUB_TARGET_PREPARER,
    &STUB_MULTI_TARGET_PREPARER,
    &STUB_TEST,
    &WAIT_DEVICE_RECOVERY,
    &DEVICE_SELECTION_OPTIONS,
    &TEST_DEVICE_OPTIONS,
    &COMMAND_OPTIONS_CLASS,
    &CONFIGURATION_DESCRIPTOR,
    &STDOUT_LOGGER,
    &FILE_SYSTEM_LOG_SAVER,
    &TEXT_RESULT_REPORTER,
    &BASE_METRIC_COLLECTOR,
    &STUB_SYSTEM_STATUS_CHECKER,
    &SANDBOX_OPTIONS_CLASS,
];

pub fn new_object(spec: &'static ClassSpec) -> Box<dyn ConfigObject> {
    DeclaredObject::boxed(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{OptionSetter, OptionSource};
    use crate::objects::ObjectSlot;

    #[test]
    fn test_builtins_bind_together() {
        let mut slots: Vec<ObjectSlot> = ALL.iter().copied().map(|spec| ObjectSlot::new(new_object(spec))).collect();
        let sources = slots.iter_mut().map(|slot| OptionSource::from_slot(slot, None)).collect();
        let setter = OptionSetter::new(sources).unwrap();
        assert!(setter.contains("disable"));
        assert!(setter.contains("stdout:log-level"));
        assert!(setter.contains("s"));
    }

    #[test]
    fn test_time_valued_defaults() {
        let recovery = new_object(&WAIT_DEVICE_RECOVERY);
        assert_eq!(recovery.fields().get_i64("online-wait-time"), Some(60_000));
        let command = new_object(&COMMAND_OPTIONS_CLASS);
        assert_eq!(command.fields().get_i64("min-loop-time"), Some(600_000));
        assert_eq!(command.fields().get_i64("shard-count"), None);
    }

    #[test]
    fn test_collector_is_also_listener() {
        assert!(BASE_METRIC_COLLECTOR.has_capability(Capability::InvocationListener));
        assert!(BASE_METRIC_COLLECTOR.has_capability(Capability::MetricCollector));
    }
}
