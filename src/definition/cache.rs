//! Shared cache of loaded definitions.

use super::model::Definition;
use crate::error::Result;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Cache key: a configuration name and the templates it was loaded with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigId {
    pub name: String,
    pub templates: BTreeMap<String, String>,
}

impl ConfigId {
    pub fn new(name: impl Into<String>, templates: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }
}

/// Definitions keyed by [`ConfigId`], safe to share between threads.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    entries: Mutex<HashMap<ConfigId, Arc<Definition>>>,
}

impl DefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached definition for `id`, calling `load` on a miss or
    /// when any of its local sources changed. Failed loads are not cached.
    ///
    /// The lock is held across the staleness check and the load.
    pub fn get_or_load<F>(&self, id: &ConfigId, load: F) -> Result<Arc<Definition>>
    where
        F: FnOnce() -> Result<Definition>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(id) {
            Some(definition) if !definition.is_stale() => {
                debug!("Definition cache hit for '{}'", id.name);
                return Ok(Arc::clone(definition));
            }
            Some(_) => info!("Configuration '{}' changed on disk, reloading", id.name),
            None => debug!("Definition cache miss for '{}'", id.name),
        }

        match load() {
            Ok(definition) => {
                let definition = Arc::new(definition);
                entries.insert(id.clone(), Arc::clone(&definition));
                Ok(definition)
            }
            Err(e) => {
                entries.remove(id);
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::model::SourceStamp;
    use crate::error::ConfigError;
    use chrono::Duration;
    use std::cell::Cell;

    #[test]
    fn test_hits_and_keys() {
        let cache = DefinitionCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(Definition::new("cfg"))
        };

        let plain = ConfigId::new("cfg", BTreeMap::new());
        cache.get_or_load(&plain, load).unwrap();
        cache.get_or_load(&plain, load).unwrap();
        assert_eq!(loads.get(), 1);

        let mut templates = BTreeMap::new();
        templates.insert("t".to_string(), "x".to_string());
        cache.get_or_load(&ConfigId::new("cfg", templates), load).unwrap();
        assert_eq!(loads.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = DefinitionCache::new();
        let id = ConfigId::new("cfg", BTreeMap::new());
        let err = cache
            .get_or_load(&id, || Err(ConfigError::NoConfigurationName))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoConfigurationName));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_definitions_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.xml");
        std::fs::write(&path, "<configuration/>").unwrap();

        let cache = DefinitionCache::new();
        let id = ConfigId::new("cfg", BTreeMap::new());
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            let mut definition = Definition::new("cfg");
            let mut stamp = SourceStamp::capture(&path).unwrap();
            // Pretend the file was read before its last write.
            stamp.modified = stamp.modified - Duration::seconds(10);
            definition.track_source(stamp);
            Ok(definition)
        };
        let first = cache.get_or_load(&id, load).unwrap();
        let second = cache.get_or_load(&id, load).unwrap();
        assert_eq!(loads.get(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
