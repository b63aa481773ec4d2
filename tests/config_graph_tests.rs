use std::fs;
use std::path::Path;
use tempfile::tempdir;

use rigcfg::configuration::JsonValue;
use rigcfg::definition::BundledResources;
use rigcfg::objects::builtin::{STUB_BUILD_PROVIDER, STUB_TARGET_PREPARER};
use rigcfg::objects::{Capability, ClassSpec};
use rigcfg::option::{FieldKind, Importance, OptionDescriptor, UpdateRule, ValueType};
use rigcfg::{ClassRegistry, ConfigError, Configuration, ConfigurationFactory, DocumentLocator};

const FOO_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("iterations", FieldKind::Scalar(ValueType::Int))
        .description("number of times to run.")
        .default_value("1"),
    OptionDescriptor::new("label", FieldKind::Collection(ValueType::Str)),
    OptionDescriptor::new("extra-arg", FieldKind::Map(ValueType::Str, ValueType::Str)),
];

static FOO_TEST: ClassSpec = ClassSpec {
    class_name: "com.x.FooTest",
    alias: Some("foo"),
    global_namespace: true,
    capabilities: &[Capability::RemoteTest],
    options: &[FOO_OPTIONS],
};

const GATED_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::new("device-count", FieldKind::Scalar(ValueType::Int))
    .importance(Importance::Always)
    .mandatory()];

static GATED_TEST: ClassSpec = ClassSpec {
    class_name: "com.x.GatedTest",
    alias: Some("gated"),
    global_namespace: true,
    capabilities: &[Capability::RemoteTest],
    options: &[GATED_OPTIONS],
};

const LOCKED_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::new("mode", FieldKind::Scalar(ValueType::Str))
        .rule(UpdateRule::Immutable)
        .default_value("fast"),
    OptionDescriptor::new("tag", FieldKind::Scalar(ValueType::Str)).rule(UpdateRule::First),
    OptionDescriptor::new("peak", FieldKind::Scalar(ValueType::Int))
        .rule(UpdateRule::Greatest)
        .default_value("0"),
    OptionDescriptor::new("floor", FieldKind::Scalar(ValueType::Int))
        .rule(UpdateRule::Least)
        .default_value("100"),
];

static LOCKED_TEST: ClassSpec = ClassSpec {
    class_name: "com.x.LockedTest",
    alias: Some("locked"),
    global_namespace: true,
    capabilities: &[Capability::RemoteTest],
    options: &[LOCKED_OPTIONS],
};

fn registry() -> ClassRegistry {
    let mut registry = ClassRegistry::with_builtins();
    registry.register_spec(&FOO_TEST);
    registry.register_spec(&GATED_TEST);
    registry.register_spec(&LOCKED_TEST);
    registry
}

fn bundled_factory(documents: &[(&str, String)]) -> ConfigurationFactory {
    let mut resources = BundledResources::new();
    for (name, content) in documents {
        resources.insert(*name, content.as_str());
    }
    ConfigurationFactory::new(registry(), DocumentLocator::new().with_resources(Box::new(resources)))
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn iterations(config: &Configuration) -> Option<i64> {
    config.tests()[0].fields().get_i64("iterations")
}

const FOO_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configuration description="Runs foo">
    <test class="com.x.FooTest" />
    <option name="com.x.FooTest:1:iterations" value="3" />
</configuration>
"#;

#[test]
fn test_foo_scenario_with_override() {
    let factory = bundled_factory(&[("foo-config", FOO_DOCUMENT.to_string())]);

    let config = factory.create_configuration_from_args(&args(&["foo-config"]), None).unwrap();
    assert_eq!(config.tests().len(), 1);
    assert_eq!(config.tests()[0].class_name(), "com.x.FooTest");
    assert_eq!(iterations(&config), Some(3));

    let config = factory
        .create_configuration_from_args(&args(&["foo-config", "--iterations", "5"]), None)
        .unwrap();
    assert_eq!(iterations(&config), Some(5));
}

#[test]
fn test_namespaced_names_are_equivalent() {
    let factory = bundled_factory(&[("foo-config", FOO_DOCUMENT.to_string())]);
    for name in ["--iterations", "--com.x.FooTest:iterations", "--com.x.FooTest:1:iterations", "--foo:iterations"] {
        let config = factory
            .create_configuration_from_args(&args(&["foo-config", name, "7"]), None)
            .unwrap();
        assert_eq!(iterations(&config), Some(7), "{}", name);
    }
}

fn write_cycle(dir: &Path, length: usize) -> String {
    for i in 0..length {
        let next = (i + 1) % length;
        fs::write(
            dir.join(format!("node{}.xml", i)),
            format!("<configuration><include name=\"node{}.xml\" /></configuration>", next),
        )
        .unwrap();
    }
    dir.join("node0.xml").display().to_string()
}

#[test]
fn test_include_cycles_of_any_length() {
    for length in [2, 3, 4] {
        let dir = tempdir().unwrap();
        let root = write_cycle(dir.path(), length);
        let factory = ConfigurationFactory::new(registry(), DocumentLocator::new());
        match factory.create_configuration_from_args(&[root], None) {
            Err(ConfigError::CircularInclude { cycle, .. }) => {
                assert_eq!(cycle.len(), length + 1, "cycle of {}", length);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("cycle of {} gave {:?}", length, other.map(|_| ())),
        }
    }
}

#[test]
fn test_includes_from_search_dirs() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("suite.xml"),
        "<configuration description=\"suite\"><include name=\"common.xml\" /></configuration>",
    )
    .unwrap();
    fs::write(
        dir.path().join("common.xml"),
        "<configuration><test class=\"com.x.FooTest\"><option name=\"iterations\" value=\"4\" /></test></configuration>",
    )
    .unwrap();

    let locator = DocumentLocator::new().with_search_dirs(vec![dir.path().to_path_buf()]);
    let factory = ConfigurationFactory::new(registry(), locator);
    let config = factory.create_configuration_from_args(&args(&["suite"]), None).unwrap();
    assert_eq!(config.description(), "suite");
    assert_eq!(iterations(&config), Some(4));
}

#[test]
fn test_hybrid_topology_attaches_to_the_real_device() {
    let document = format!(
        r#"<configuration>
            <device name="dut" />
            <device name="fake1" isFake="true" />
            <device name="fake2" isFake="true" />
            <target_preparer class="{}" />
            <test class="com.x.FooTest" />
        </configuration>"#,
        STUB_TARGET_PREPARER.class_name
    );
    let factory = bundled_factory(&[("hybrid", document)]);
    let config = factory.create_configuration_from_args(&args(&["hybrid"]), None).unwrap();

    assert!(config.is_multi_device());
    assert_eq!(config.device("dut").unwrap().target_preparers().len(), 1);
    assert!(config.device("fake1").unwrap().target_preparers().is_empty());
    assert!(config.device("fake2").unwrap().target_preparers().is_empty());
    assert!(matches!(config.target_preparers(), Err(ConfigError::MultiDeviceAccess { .. })));
}

#[test]
fn test_two_real_devices_reject_roles_outside_devices() {
    let document = format!(
        r#"<configuration>
            <device name="dut1" />
            <device name="dut2" />
            <target_preparer class="{}" />
        </configuration>"#,
        STUB_TARGET_PREPARER.class_name
    );
    let factory = bundled_factory(&[("two-duts", document)]);
    assert!(matches!(
        factory.create_configuration_from_args(&args(&["two-duts"]), None),
        Err(ConfigError::RolesOutsideDevice { .. })
    ));
}

#[test]
fn test_device_scoped_options() {
    let document = format!(
        r#"<configuration>
            <device name="dut1">
                <build_provider class="{provider}">
                    <option name="build-id" value="1" />
                </build_provider>
            </device>
            <device name="dut2">
                <build_provider class="{provider}" />
            </device>
        </configuration>"#,
        provider = STUB_BUILD_PROVIDER.class_name
    );
    let factory = bundled_factory(&[("pair", document)]);
    let config = factory
        .create_configuration_from_args(&args(&["pair", "--{dut2}build-id", "2"]), None)
        .unwrap();
    let build_id = |device: &str| {
        config
            .device(device)
            .unwrap()
            .build_provider()
            .fields()
            .get_str("build-id")
            .map(str::to_string)
    };
    assert_eq!(build_id("dut1").as_deref(), Some("1"));
    assert_eq!(build_id("dut2").as_deref(), Some("2"));
}

type ObjectSummary = (String, String, Option<String>, Vec<(String, Option<JsonValue>)>);

fn summarize(config: &Configuration) -> Vec<ObjectSummary> {
    let mut summary: Vec<ObjectSummary> = config
        .json_command_usage()
        .into_iter()
        .map(|object| {
            let options = object.options.into_iter().map(|o| (o.name, o.value)).collect();
            (object.name, object.class, object.device, options)
        })
        .collect();
    summary.sort_by(|a, b| (&a.0, &a.1, &a.2).cmp(&(&b.0, &b.1, &b.2)));
    summary
}

#[test]
fn test_xml_dump_round_trip() {
    let document = r#"<configuration description="round &amp; trip">
        <test class="com.x.FooTest">
            <option name="iterations" value="9" />
            <option name="label" value="first" />
            <option name="label" value="second" />
            <option name="extra-arg" key="a=b" value="c" />
        </test>
        <test class="com.x.FooTest" />
        <option name="serial" value="emulator-5554" />
        <option name="min-loop-time" value="1m30s" />
    </configuration>"#;
    let factory = bundled_factory(&[("original", document.to_string())]);
    let original = factory.create_configuration_from_args(&args(&["original"]), None).unwrap();

    let dir = tempdir().unwrap();
    let dumped = dir.path().join("dumped.xml");
    fs::write(&dumped, original.dump_xml(&[])).unwrap();
    let reloaded = factory
        .create_configuration_from_args(&[dumped.display().to_string()], None)
        .unwrap();

    assert_eq!(reloaded.description(), "round & trip");
    assert_eq!(reloaded.tests().len(), 2);
    assert_eq!(summarize(&reloaded), summarize(&original));
}

const LOCKED_DOCUMENT: &str = r#"<configuration description="locked">
    <test class="com.x.LockedTest">
        <option name="tag" value="xml" />
        <option name="peak" value="7" />
        <option name="floor" value="30" />
    </test>
    <test class="com.x.LockedTest" />
</configuration>
"#;

fn locked_option(config: &Configuration, index: usize, name: &str) -> (Option<JsonValue>, Vec<String>) {
    let usage = config.json_command_usage();
    let option = usage
        .into_iter()
        .filter(|o| o.class == "com.x.LockedTest")
        .nth(index)
        .and_then(|o| o.options.into_iter().find(|option| option.name == name))
        .unwrap();
    (option.value, option.source)
}

#[test]
fn test_round_trip_with_update_rules() {
    let factory = bundled_factory(&[("locked", LOCKED_DOCUMENT.to_string())]);
    let original = factory.create_configuration_from_args(&args(&["locked"]), None).unwrap();

    let xml = original.dump_xml(&[]);
    assert!(!xml.contains("name=\"mode\""), "{}", xml);
    assert!(xml.contains("name=\"peak\" value=\"7\""), "{}", xml);

    let dir = tempdir().unwrap();
    let dumped = dir.path().join("locked-dump.xml");
    fs::write(&dumped, xml).unwrap();
    let reloaded = factory
        .create_configuration_from_args(&[dumped.display().to_string()], None)
        .unwrap();

    assert_eq!(summarize(&reloaded), summarize(&original));
    assert_eq!(locked_option(&reloaded, 0, "mode").0, Some(JsonValue::Text("fast".to_string())));
    assert_eq!(locked_option(&reloaded, 0, "peak").0, Some(JsonValue::Integer(7)));
    assert_eq!(locked_option(&reloaded, 0, "floor").0, Some(JsonValue::Integer(30)));
    assert_eq!(locked_option(&reloaded, 1, "peak").0, Some(JsonValue::Integer(0)));
}

#[test]
fn test_kept_updates_leave_sources_alone() {
    let factory = bundled_factory(&[("locked", LOCKED_DOCUMENT.to_string())]);
    let config = factory
        .create_configuration_from_args(
            &args(&["locked", "--locked:1:tag", "cli", "--locked:1:peak", "2", "--locked:1:floor", "5"]),
            None,
        )
        .unwrap();

    let (tag, tag_sources) = locked_option(&config, 0, "tag");
    assert_eq!(tag, Some(JsonValue::Text("xml".to_string())));
    assert_eq!(tag_sources, vec!["locked".to_string()]);

    let (peak, peak_sources) = locked_option(&config, 0, "peak");
    assert_eq!(peak, Some(JsonValue::Integer(7)));
    assert_eq!(peak_sources, vec!["locked".to_string()]);

    let (floor, floor_sources) = locked_option(&config, 0, "floor");
    assert_eq!(floor, Some(JsonValue::Integer(5)));
    assert_eq!(floor_sources, vec!["command line".to_string()]);

    assert!(matches!(
        factory.create_configuration_from_args(&args(&["locked", "--mode", "slow"]), None),
        Err(ConfigError::ImmutableOption { .. })
    ));
}

#[test]
fn test_template_selection_from_arguments() {
    let factory = bundled_factory(&[
        (
            "templated",
            r#"<configuration>
                <template-include name="tests" default="quick" />
            </configuration>"#
                .to_string(),
        ),
        (
            "quick",
            "<configuration><test class=\"com.x.FooTest\" /></configuration>".to_string(),
        ),
        (
            "thorough",
            "<configuration><test class=\"com.x.FooTest\"><option name=\"iterations\" value=\"50\" /></test></configuration>"
                .to_string(),
        ),
    ]);

    let config = factory.create_configuration_from_args(&args(&["templated"]), None).unwrap();
    assert_eq!(iterations(&config), Some(1));

    let config = factory
        .create_configuration_from_args(&args(&["templated", "--iterations", "60", "--template:map", "tests", "thorough"]), None)
        .unwrap();
    assert_eq!(iterations(&config), Some(60));

    assert!(matches!(
        factory.create_configuration_from_args(&args(&["templated", "--template:map", "other=quick"]), None),
        Err(ConfigError::UnusedTemplates { .. })
    ));
    assert!(matches!(
        factory.create_configuration_from_args(
            &args(&["templated", "--template:map", "tests=quick", "--template:map", "tests=thorough"]),
            None
        ),
        Err(ConfigError::DuplicateTemplate { .. })
    ));
}

#[test]
fn test_mandatory_options() {
    let factory = bundled_factory(&[(
        "gated",
        "<configuration><test class=\"com.x.GatedTest\" /></configuration>".to_string(),
    )]);

    let config = factory.create_configuration_from_args(&args(&["gated"]), None).unwrap();
    match config.validate_options() {
        Err(ConfigError::MissingMandatoryOptions { names }) => assert_eq!(names, vec!["device-count".to_string()]),
        other => panic!("unexpected: {:?}", other),
    }

    for name in ["--device-count", "--gated:device-count", "--com.x.GatedTest:1:device-count"] {
        let config = factory
            .create_configuration_from_args(&args(&["gated", name, "2"]), None)
            .unwrap();
        assert!(config.validate_options().is_ok(), "{}", name);
    }
}

#[test]
fn test_missing_classes_are_reported_together() {
    let factory = bundled_factory(&[(
        "broken",
        r#"<configuration>
            <test class="com.x.Missing" />
            <test class="com.x.FooTest" />
            <result_reporter class="com.x.AlsoMissing" />
        </configuration>"#
            .to_string(),
    )]);
    match factory.create_configuration_from_args(&args(&["broken"]), None) {
        Err(ConfigError::ClassNotFound { rejected }) => {
            let classes: Vec<&str> = rejected.iter().map(|(class, _)| class.as_str()).collect();
            assert_eq!(classes, vec!["com.x.Missing", "com.x.AlsoMissing"]);
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_descriptor_options_are_not_settable_from_the_command_line() {
    let factory = bundled_factory(&[("foo-config", FOO_DOCUMENT.to_string())]);
    match factory.create_configuration_from_args(&args(&["foo-config", "--test-suite-tag", "smoke"]), None) {
        Err(ConfigError::OptionNotAllowed { name }) => assert_eq!(name, "test-suite-tag"),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_clone_keeps_values_and_provenance() {
    let factory = bundled_factory(&[("foo-config", FOO_DOCUMENT.to_string())]);
    let config = factory
        .create_configuration_from_args(&args(&["foo-config", "--iterations", "8"]), None)
        .unwrap();
    let copy = config.clone();
    assert_eq!(iterations(&copy), Some(8));

    let usage = copy.json_command_usage();
    let foo = usage.iter().find(|o| o.class == "com.x.FooTest").unwrap();
    let option = foo.options.iter().find(|o| o.name == "iterations").unwrap();
    assert_eq!(option.source, vec!["command line".to_string()]);
}
