//! Error taxonomy for loading, resolving and binding configurations.
//!
//! Every failure surfaced by the library is a [`ConfigError`]. Variants raised
//! while reading declaration documents carry a [`Location`] naming the
//! document and the chain of includes that led to it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Where in the declaration tree an error was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Document being parsed when the error occurred.
    pub document: String,
    /// Line within that document, when known.
    pub line: Option<usize>,
    /// Documents that included `document`, outermost first.
    pub chain: Vec<String>,
}

impl Location {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            line: None,
            chain: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if !self.chain.is_empty() {
            write!(f, " (included from {})", self.chain.join(" -> "))?;
        }
        Ok(())
    }
}

/// Errors raised by the configuration subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    // Document structure
    #[error("Failed to parse config xml '{location}'. Reason: {reason}")]
    Parse { location: Location, reason: String },

    #[error("Failed to parse config xml '{location}'. Reason: <{element}> is missing the required '{attribute}' attribute")]
    MissingAttribute {
        location: Location,
        element: String,
        attribute: String,
    },

    #[error("Failed to parse config xml '{location}'. Reason: <object> requires a 'type' attribute")]
    MissingTypeAttribute { location: Location },

    #[error("Failed to parse config xml '{location}'. Reason: type name '{type_name}' is reserved for a built-in role")]
    ReservedTypeName { location: Location, type_name: String },

    #[error("Failed to parse config xml '{location}'. Reason: <device> tag cannot be included inside another device")]
    NestedDevice { location: Location },

    #[error("Failed to parse config xml '{location}'. Reason: device name '{name}' is invalid: {reason}")]
    InvalidDeviceName {
        location: Location,
        name: String,
        reason: String,
    },

    #[error("Mismatch for device '{device}'. It was defined once as isFake={first}, once as isFake={second}")]
    DeviceFakeMismatch {
        location: Location,
        device: String,
        first: bool,
        second: bool,
    },

    #[error("Failed to parse config xml '{location}'. Reason: <{role}> is not allowed inside a <device> tag")]
    RoleNotAllowedInDevice { location: Location, role: String },

    #[error("Failed to parse config xml '{location}'. Reason: <template-include> cannot be used inside a <device> tag")]
    TemplateInDevice { location: Location },

    #[error("You seem to want a multi-devices configuration but you have {roles:?} tags outside the <device> tags")]
    RolesOutsideDevice { roles: Vec<String> },

    #[error("Circular configuration include: config '{document}' is already included ({})", .cycle.join(" -> "))]
    CircularInclude { document: String, cycle: Vec<String> },

    #[error("Failed to parse config xml '{location}'. Reason: no template was provided for '{template}'. Use '--template:map {template} <config>' or declare a 'default' on the <template-include>")]
    TemplateResolution { location: Location, template: String },

    #[error("More than one template specified for key '{key}'")]
    DuplicateTemplate { key: String },

    #[error("Unused template:map parameters: {templates:?}")]
    UnusedTemplates { templates: BTreeMap<String, String> },

    #[error("Could not find configuration '{name}'")]
    DocumentNotFound { name: String, location: Option<Location> },

    #[error("Failed to read configuration file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Resolution
    #[error("No real device detected in the configuration.")]
    NoDutDevice,

    #[error("Failed to load some objects in the configuration: {}", format_rejected(.rejected))]
    ClassNotFound { rejected: Vec<(String, String)> },

    #[error("Failed to instantiate class '{class_name}': {reason}")]
    Instantiation { class_name: String, reason: String },

    #[error("Class '{class_name}' cannot be declared as '{type_name}': {reason}")]
    IncoherentDeclaration {
        class_name: String,
        type_name: String,
        reason: String,
    },

    #[error("The config object {type_name} is not the correct type. Expected {expected}, received {actual}")]
    WrongObjectType {
        type_name: String,
        expected: String,
        actual: String,
    },

    #[error("Only one config object allowed for {type_name}, but multiple were specified.")]
    TooManyObjects { type_name: String },

    #[error("Attempted to retrieve single object for {type_name}, but {count} are present")]
    AmbiguousSingleAccess { type_name: String, count: usize },

    #[error("Wrong method call for type {type_name}. Used a single-object accessor for a config object that is stored as a list")]
    WrongAccessor { type_name: String },

    #[error("Cannot add {class_name} to the device configuration as '{type_name}'")]
    NotADeviceRole { class_name: String, type_name: String },

    #[error("Configuration is in multi-device mode; use the device accessor to reach '{type_name}'")]
    MultiDeviceAccess { type_name: String },

    #[error("No device named '{name}' in the configuration")]
    UnknownDevice { name: String },

    // Option binding
    #[error("Could not find option with name {name}")]
    UnknownOption { name: String },

    #[error("Option {name} cannot be specified via command line. Only in the configuration xml.")]
    OptionNotAllowed { name: String },

    #[error("@Option field with name '{name}' {reason}")]
    DuplicateOption {
        name: String,
        class_name: String,
        reason: String,
    },

    #[error("Invalid option '{name}' in class '{class_name}': {reason}")]
    InvalidOptionDeclaration {
        name: String,
        class_name: String,
        reason: String,
    },

    #[error("Option '{name}' in class '{class_name}' uses update rule {rule} but its type is not ordered")]
    NotComparable {
        name: String,
        class_name: String,
        rule: String,
    },

    #[error("Couldn't convert {what} '{value}' to a {type_name} for option '{option}'")]
    TypeCoercion {
        option: String,
        what: &'static str,
        value: String,
        type_name: String,
    },

    #[error("Value for option '{option}' has type {actual}, expected {expected}")]
    TypeMismatch {
        option: String,
        expected: String,
        actual: String,
    },

    #[error("Attempted to update immutable value ({value}) for option \"{option}\" in class \"{class_name}\"")]
    ImmutableOption {
        option: String,
        class_name: String,
        value: String,
    },

    #[error("option '{option}' {reason}")]
    InvalidKeyUsage { option: String, reason: String },

    #[error("option '{option}' is missing its value {detail}")]
    MissingArgument { option: String, detail: String },

    #[error("Found missing mandatory options: {}", .names.iter().map(|n| format!("--{}", n)).collect::<Vec<_>>().join(", "))]
    MissingMandatoryOptions { names: Vec<String> },

    #[error("Invalid arguments provided. Unprocessed arguments: {leftovers:?}")]
    InvalidArguments { leftovers: Vec<String> },

    #[error("Configuration to run was not specified")]
    NoConfigurationName,

    #[error("Invalid value for option '{option}': {reason}")]
    InvalidOptionValue { option: String, reason: String },

    // Keystore
    #[error("Keystore was not available when requesting key '{key}'")]
    KeyStoreUnavailable { key: String },

    #[error("Could not find key '{key}' in the keystore")]
    KeyNotFound { key: String },
}

fn format_rejected(rejected: &[(String, String)]) -> String {
    let entries: Vec<String> = rejected
        .iter()
        .map(|(class_name, type_name)| format!("{}={}", class_name, type_name))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ConfigError>;
