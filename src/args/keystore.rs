//! Key store indirection for option values.
//!
//! A value written `USE_KEYSTORE@name` is replaced by the secret stored under
//! `name` before it is coerced.

use crate::error::{ConfigError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

static KEYSTORE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^USE_KEYSTORE@(.*)$").unwrap());

/// Source of secrets referenced from option values.
pub trait KeyStoreClient: Send + Sync {
    fn is_available(&self) -> bool;

    fn contains_key(&self, key: &str) -> bool;

    fn fetch_key(&self, key: &str) -> Option<String>;
}

/// A key store that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubKeyStore;

impl KeyStoreClient for StubKeyStore {
    fn is_available(&self) -> bool {
        false
    }

    fn contains_key(&self, _key: &str) -> bool {
        false
    }

    fn fetch_key(&self, _key: &str) -> Option<String> {
        None
    }
}

/// In-memory key store, optionally loaded from a flat YAML mapping.
#[derive(Debug, Default, Clone)]
pub struct MapKeyStore {
    entries: HashMap<String, String>,
}

impl MapKeyStore {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load `key: value` pairs from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: HashMap<String, String> =
            serde_yaml::from_reader(file).map_err(|e| ConfigError::InvalidOptionValue {
                option: "keystore".to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl KeyStoreClient for MapKeyStore {
    fn is_available(&self) -> bool {
        true
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn fetch_key(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Key named by a keystore reference, if `value` is one.
pub fn keystore_reference(value: &str) -> Option<&str> {
    KEYSTORE_PATTERN
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Substitute a keystore reference; other values pass through unchanged.
pub fn resolve_keystore_value(value: &str, client: Option<&dyn KeyStoreClient>) -> Result<String> {
    let Some(key) = keystore_reference(value) else {
        return Ok(value.to_string());
    };
    let client = match client {
        Some(client) if client.is_available() => client,
        _ => {
            return Err(ConfigError::KeyStoreUnavailable {
                key: key.to_string(),
            })
        }
    };
    if !client.contains_key(key) {
        return Err(ConfigError::KeyNotFound {
            key: key.to_string(),
        });
    }
    client.fetch_key(key).ok_or_else(|| ConfigError::KeyNotFound {
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plain_values_pass_through() {
        assert_eq!(resolve_keystore_value("plain", None).unwrap(), "plain");
        assert_eq!(keystore_reference("USE_KEYSTORE@"), Some(""));
        assert_eq!(keystore_reference("xUSE_KEYSTORE@a"), None);
    }

    #[test]
    fn test_missing_client() {
        assert!(matches!(
            resolve_keystore_value("USE_KEYSTORE@foo", None),
            Err(ConfigError::KeyStoreUnavailable { .. })
        ));
        assert!(matches!(
            resolve_keystore_value("USE_KEYSTORE@foo", Some(&StubKeyStore)),
            Err(ConfigError::KeyStoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_lookup() {
        let mut store = MapKeyStore::default();
        store.insert("foobar", "secret");
        assert_eq!(
            resolve_keystore_value("USE_KEYSTORE@foobar", Some(&store)).unwrap(),
            "secret"
        );
        assert!(matches!(
            resolve_keystore_value("USE_KEYSTORE@foo", Some(&store)),
            Err(ConfigError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "api-token: abc123").unwrap();
        writeln!(file, "password: hunter2").unwrap();
        let store = MapKeyStore::from_yaml_file(file.path()).unwrap();
        assert_eq!(store.fetch_key("api-token").as_deref(), Some("abc123"));
        assert!(store.contains_key("password"));
    }
}
