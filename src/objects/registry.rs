//! Class registry mapping class names to factories.
//!
//! The registry is built once at startup and handed by reference to the
//! resolver and factory.

use super::builtin;
use super::{ClassSpec, ConfigObject, DeclaredObject};
use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::fmt;

/// Produces a fresh, default-constructed object.
pub type Factory = Box<dyn Fn() -> Result<Box<dyn ConfigObject>> + Send + Sync>;

/// Registry of instantiable classes.
pub struct ClassRegistry {
    factories: HashMap<String, Factory>,
}

impl ClassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ClassRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry holding every built-in class.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in builtin::ALL.iter().copied() {
            registry.register_spec(spec);
        }
        registry
    }

    pub fn register(&mut self, class_name: impl Into<String>, factory: Factory) {
        self.factories.insert(class_name.into(), factory);
    }

    /// Register a class whose instances are plain [`DeclaredObject`]s.
    pub fn register_spec(&mut self, spec: &'static ClassSpec) {
        self.register(spec.class_name, Box::new(move || Ok(DeclaredObject::boxed(spec))));
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Instantiate `class_name`, reporting it against `type_name` if unknown.
    pub fn create(&self, class_name: &str, type_name: &str) -> Result<Box<dyn ConfigObject>> {
        let factory = self
            .factories
            .get(class_name)
            .ok_or_else(|| ConfigError::ClassNotFound {
                rejected: vec![(class_name.to_string(), type_name.to_string())],
            })?;
        factory()
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ClassRegistry::with_builtins();
        assert!(registry.contains(builtin::STUB_TEST.class_name));
        let object = registry.create(builtin::STUB_TEST.class_name, "test").unwrap();
        assert_eq!(object.class_name(), builtin::STUB_TEST.class_name);
    }

    #[test]
    fn test_unknown_class_is_rejected_with_type() {
        let registry = ClassRegistry::new();
        match registry.create("com.nowhere.Missing", "device1:build_provider") {
            Err(ConfigError::ClassNotFound { rejected }) => {
                assert_eq!(
                    rejected,
                    vec![("com.nowhere.Missing".to_string(), "device1:build_provider".to_string())]
                );
            }
            other => panic!("unexpected result: {:?}", other.map(|o| o.class_name())),
        }
    }

    #[test]
    fn test_custom_factory_error_passes_through() {
        let mut registry = ClassRegistry::new();
        registry.register(
            "com.example.Broken",
            Box::new(|| {
                Err(ConfigError::Instantiation {
                    class_name: "com.example.Broken".to_string(),
                    reason: "no default constructor".to_string(),
                })
            }),
        );
        assert!(matches!(
            registry.create("com.example.Broken", "test"),
            Err(ConfigError::Instantiation { .. })
        ));
    }
}
