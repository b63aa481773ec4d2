//! End-to-end construction of configurations from command-line arguments.

use crate::args::{extract_templates, reorder_args, KeyStoreClient};
use crate::configuration::{Configuration, ObjectGraphResolver};
use crate::definition::{ConfigId, Definition, DefinitionCache, DefinitionLoader, DocumentLocator};
use crate::error::{ConfigError, Result};
use crate::objects::ClassRegistry;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Loads, caches and resolves configurations.
///
/// One factory is built at startup and shared by every invocation; its
/// definition cache is safe to use from several threads.
#[derive(Debug)]
pub struct ConfigurationFactory {
    registry: ClassRegistry,
    locator: DocumentLocator,
    cache: DefinitionCache,
}

impl ConfigurationFactory {
    pub fn new(registry: ClassRegistry, locator: DocumentLocator) -> Self {
        Self {
            registry,
            locator,
            cache: DefinitionCache::new(),
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn locator(&self) -> &DocumentLocator {
        &self.locator
    }

    /// Load a definition through the cache.
    pub fn load_definition(&self, name: &str, templates: &BTreeMap<String, String>) -> Result<Arc<Definition>> {
        let id = ConfigId::new(name, templates.clone());
        self.cache
            .get_or_load(&id, || DefinitionLoader::new(&self.locator).load(name, templates))
    }

    /// Build a configuration from `args`: the configuration name, then any
    /// `--template:map` pairs and option overrides in any order.
    ///
    /// Arguments left over after the options are an error.
    pub fn create_configuration_from_args(
        &self,
        args: &[String],
        keystore: Option<&dyn KeyStoreClient>,
    ) -> Result<Configuration> {
        let reordered = reorder_args(args);
        let Some((name, rest)) = reordered.split_first() else {
            return Err(ConfigError::NoConfigurationName);
        };
        let (templates, option_args) = extract_templates(rest)?;
        if !templates.is_empty() {
            debug!("Template substitutions for '{}': {:?}", name, templates);
        }

        let definition = self.load_definition(name, &templates)?;
        let mut config = ObjectGraphResolver::new(&self.registry).resolve(&definition)?;
        config.set_command_line(args);

        let leftovers = config.set_options_from_command_line(&option_args, keystore)?;
        if !leftovers.is_empty() {
            return Err(ConfigError::InvalidArguments { leftovers });
        }
        info!("Created configuration '{}'", name);
        Ok(config)
    }
}
