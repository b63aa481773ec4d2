//! Command-line arguments: option parsing, templates and keystore lookups.

pub mod keystore;
pub mod parser;
pub mod template;

pub use keystore::{KeyStoreClient, MapKeyStore, StubKeyStore};
pub use parser::ArgsParser;
pub use template::{extract_templates, reorder_args, TEMPLATE_MAP_OPTION};
