//! # rigcfg - declarative configuration for test rigs
//!
//! This library turns declaration documents into live graphs of configured
//! objects: build providers, target preparers, tests, reporters and the rest
//! of a test invocation, optionally spread across several devices.
//!
//! ## Overview
//!
//! A configuration is described by an XML document naming the classes that
//! fill each role and the option values to give them. Documents may include
//! other documents, substitute templates chosen on the command line, and group
//! device-specific objects under `<device>` tags. Loading produces a
//! [`Definition`]; resolving it against a [`ClassRegistry`] produces a
//! [`Configuration`] whose option fields can then be overridden from the
//! command line.
//!
//! ## Architecture
//!
//! - `error`: the error taxonomy shared by every module
//! - `option`: option descriptors, typed values and the field binder
//! - `objects`: the configuration object trait, built-in classes and the class registry
//! - `args`: command-line option parsing, key store lookups and template arguments
//! - `definition`: the document reader, locator, loader and definition cache
//! - `configuration`: roles, device bundles, the resolver and the configuration store
//! - `factory`: the end-to-end "arguments to configuration" entry point
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rigcfg::{ClassRegistry, ConfigurationFactory, DocumentLocator};
//!
//! let locator = DocumentLocator::new().with_search_dirs(vec!["configs".into()]);
//! let factory = ConfigurationFactory::new(ClassRegistry::with_builtins(), locator);
//!
//! let args: Vec<String> = ["smoke", "--serial", "emulator-5554"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//! let config = factory.create_configuration_from_args(&args, None)?;
//! config.validate_options()?;
//! println!("{}", config.dump_xml(&[]));
//! # Ok::<(), rigcfg::ConfigError>(())
//! ```
//!
//! ## Declaration Format
//!
//! ```xml
//! <configuration description="Runs the smoke suite">
//!     <include name="common-reporters" />
//!     <template-include name="preparers" default="no-preparers" />
//!     <test class="com.x.FooTest">
//!         <option name="iterations" value="3" />
//!     </test>
//!     <option name="serial" value="emulator-5554" />
//! </configuration>
//! ```

pub mod args;
pub mod configuration;
pub mod definition;
pub mod error;
pub mod factory;
pub mod objects;
pub mod option;

pub use configuration::{Configuration, ObjectGraphResolver, Role};
pub use definition::{Definition, DefinitionLoader, DocumentLocator};
pub use error::{ConfigError, Location, Result};
pub use factory::ConfigurationFactory;
pub use objects::{ClassRegistry, ClassSpec, ConfigObject};
