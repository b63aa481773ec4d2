//! The parsed, not yet instantiated description of a configuration.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the implicit device used outside multi-device mode.
pub const DEFAULT_DEVICE_NAME: &str = "DEFAULT_DEVICE";

/// One declared object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigObjectDef {
    pub type_name: String,
    pub class_name: String,
    /// 1-based count of this class among all objects declared so far.
    pub appearance: usize,
}

/// One declared option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDef {
    pub name: String,
    pub key: Option<String>,
    pub value: String,
    /// Document the value was read from.
    pub source: String,
}

impl OptionDef {
    pub fn new(name: impl Into<String>, value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            value: value.into(),
            source: source.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Modification time of a local document when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl SourceStamp {
    /// Record the current modification time, or `None` if it can't be read.
    pub fn capture(path: &Path) -> Option<Self> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
        })
    }

    /// True if the file was modified after it was read. A file that can no
    /// longer be read is not considered stale.
    pub fn is_stale(&self) -> bool {
        match Self::capture(&self.path) {
            Some(current) => current.modified > self.modified,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Definition {
    name: String,
    description: Option<String>,
    objects: Vec<(String, Vec<ConfigObjectDef>)>,
    class_frequency: HashMap<String, usize>,
    options: Vec<OptionDef>,
    multi_device: bool,
    expected_devices: Vec<(String, bool)>,
    sources: Vec<SourceStamp>,
}

impl Definition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Set the description unless one was already set.
    pub fn set_description_once(&mut self, description: &str) {
        if self.description.is_none() {
            self.description = Some(description.to_string());
        }
    }

    /// Record an object and return its appearance index.
    pub fn add_object(&mut self, type_name: &str, class_name: &str) -> usize {
        let counted = self.class_frequency.entry(class_name.to_string()).or_insert(0);
        *counted += 1;
        let def = ConfigObjectDef {
            type_name: type_name.to_string(),
            class_name: class_name.to_string(),
            appearance: *counted,
        };
        match self.objects.iter_mut().find(|(name, _)| name == type_name) {
            Some((_, defs)) => defs.push(def),
            None => self.objects.push((type_name.to_string(), vec![def])),
        }
        *counted
    }

    /// Declared objects grouped by type name, in first-declaration order.
    pub fn object_entries(&self) -> &[(String, Vec<ConfigObjectDef>)] {
        &self.objects
    }

    pub fn objects_of(&self, type_name: &str) -> &[ConfigObjectDef] {
        self.objects
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, defs)| defs.as_slice())
            .unwrap_or_default()
    }

    pub fn add_option(&mut self, option: OptionDef) {
        self.options.push(option);
    }

    pub fn options(&self) -> &[OptionDef] {
        &self.options
    }

    pub fn is_multi_device(&self) -> bool {
        self.multi_device
    }

    pub fn set_multi_device(&mut self, multi_device: bool) {
        self.multi_device = multi_device;
    }

    /// Register a device. Returns the earlier flag if the device was already
    /// registered with a different one.
    pub fn add_expected_device(&mut self, name: &str, is_fake: bool) -> Option<bool> {
        match self.expected_devices.iter().find(|(n, _)| n == name) {
            Some((_, existing)) if *existing != is_fake => Some(*existing),
            Some(_) => None,
            None => {
                self.expected_devices.push((name.to_string(), is_fake));
                None
            }
        }
    }

    /// Declared devices and their fake flag, in declaration order.
    pub fn expected_devices(&self) -> &[(String, bool)] {
        &self.expected_devices
    }

    /// The sole real device when exactly one real and at least one fake
    /// device are declared.
    pub fn hybrid_real_device(&self) -> Option<&str> {
        if !self.multi_device {
            return None;
        }
        let mut real = self.expected_devices.iter().filter(|(_, fake)| !fake);
        let fakes = self.expected_devices.iter().filter(|(_, fake)| *fake).count();
        match (real.next(), real.next()) {
            (Some((name, _)), None) if fakes >= 1 => Some(name),
            _ => None,
        }
    }

    pub fn track_source(&mut self, stamp: SourceStamp) {
        self.sources.push(stamp);
    }

    pub fn sources(&self) -> &[SourceStamp] {
        &self.sources
    }

    /// True if any local document that contributed to this definition
    /// changed since it was read.
    pub fn is_stale(&self) -> bool {
        self.sources.iter().any(SourceStamp::is_stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_appearance_counts_per_class() {
        let mut def = Definition::new("cfg");
        assert_eq!(def.add_object("test", "com.x.FooTest"), 1);
        assert_eq!(def.add_object("target_preparer", "com.x.Prep"), 1);
        assert_eq!(def.add_object("test", "com.x.FooTest"), 2);
        assert_eq!(def.add_object("custom", "com.x.FooTest"), 3);

        let types: Vec<&str> = def.object_entries().iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(types, vec!["test", "target_preparer", "custom"]);
        let appearances: Vec<usize> = def.objects_of("test").iter().map(|d| d.appearance).collect();
        assert_eq!(appearances, vec![1, 2]);
        assert!(def.objects_of("missing").is_empty());
    }

    #[test]
    fn test_description_first_wins() {
        let mut def = Definition::new("cfg");
        assert_eq!(def.description(), "");
        def.set_description_once("outer");
        def.set_description_once("inner");
        assert_eq!(def.description(), "outer");
    }

    #[test]
    fn test_device_flags_and_hybrid() {
        let mut def = Definition::new("cfg");
        def.set_multi_device(true);
        assert_eq!(def.add_expected_device("dut", false), None);
        assert_eq!(def.hybrid_real_device(), None);
        assert_eq!(def.add_expected_device("fake1", true), None);
        assert_eq!(def.add_expected_device("fake1", true), None);
        assert_eq!(def.add_expected_device("fake1", false), Some(true));
        assert_eq!(def.hybrid_real_device(), Some("dut"));
        def.add_expected_device("dut2", false);
        assert_eq!(def.hybrid_real_device(), None);
    }

    #[test]
    fn test_staleness() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<configuration/>").unwrap();
        let mut stamp = SourceStamp::capture(file.path()).unwrap();
        let mut def = Definition::new("cfg");
        def.track_source(stamp.clone());
        assert!(!def.is_stale());

        stamp.modified -= chrono::Duration::seconds(10);
        let mut older = Definition::new("cfg");
        older.track_source(stamp);
        assert!(older.is_stale());
    }
}
