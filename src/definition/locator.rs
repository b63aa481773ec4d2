//! Finding declaration documents by name.

use crate::error::{ConfigError, Result};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of documents bundled with the host rather than read from disk.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<String>;

    fn names(&self) -> Vec<String>;
}

/// In-memory bundled documents.
#[derive(Debug, Default, Clone)]
pub struct BundledResources {
    documents: HashMap<String, String>,
}

impl BundledResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.documents.insert(name.into(), content.into());
    }

    /// Register every `.xml` file in `dir` under its file stem.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let io_error = |source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut resources = Self::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("Bundling '{}' from {}", stem, path.display());
            resources.insert(stem, content);
        }
        Ok(resources)
    }
}

impl ResourceLoader for BundledResources {
    fn load(&self, name: &str) -> Option<String> {
        self.documents.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.documents.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Where a located document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Local(PathBuf),
    Bundled(String),
}

/// A document's identity and text.
#[derive(Debug, Clone)]
pub struct LocatedDocument {
    /// Identity used for include cycle detection.
    pub id: String,
    pub source: DocumentSource,
    pub content: String,
}

impl LocatedDocument {
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::Local(path) => Some(path),
            DocumentSource::Bundled(_) => None,
        }
    }
}

/// Resolves document names to local files or bundled resources.
///
/// A name is tried as an absolute path, relative to the including document,
/// relative to the working directory, as a bundled document, and finally in
/// each search directory as-is and with an `.xml` extension.
pub struct DocumentLocator {
    search_dirs: Vec<PathBuf>,
    resources: Box<dyn ResourceLoader>,
}

impl DocumentLocator {
    pub fn new() -> Self {
        Self {
            search_dirs: Vec::new(),
            resources: Box::new(BundledResources::new()),
        }
    }

    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    pub fn with_resources(mut self, resources: Box<dyn ResourceLoader>) -> Self {
        self.resources = resources;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn bundled_names(&self) -> Vec<String> {
        self.resources.names()
    }

    fn local_candidates(&self, name: &str, includer: Option<&Path>) -> Vec<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut candidates = Vec::new();
        if let Some(dir) = includer.and_then(Path::parent) {
            candidates.push(dir.join(path));
        }
        candidates.push(path.to_path_buf());
        candidates
    }

    /// Locate and read `name`. `includer` is the local path of the document
    /// that referenced it, if any.
    pub fn locate(&self, name: &str, includer: Option<&Path>) -> Result<LocatedDocument> {
        for candidate in self.local_candidates(name, includer) {
            if candidate.is_file() {
                return read_local(candidate);
            }
        }
        if let Some(content) = self.resources.load(name) {
            debug!("Using bundled configuration '{}'", name);
            return Ok(LocatedDocument {
                id: name.to_string(),
                source: DocumentSource::Bundled(name.to_string()),
                content,
            });
        }
        for dir in &self.search_dirs {
            for candidate in [dir.join(name), dir.join(format!("{}.xml", name))] {
                if candidate.is_file() {
                    return read_local(candidate);
                }
            }
        }
        Err(ConfigError::DocumentNotFound {
            name: name.to_string(),
            location: None,
        })
    }
}

impl Default for DocumentLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLocator")
            .field("search_dirs", &self.search_dirs)
            .field("bundled", &self.resources.names())
            .finish()
    }
}

fn read_local(path: PathBuf) -> Result<LocatedDocument> {
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let id = fs::canonicalize(&path)
        .unwrap_or_else(|_| path.clone())
        .display()
        .to_string();
    Ok(LocatedDocument {
        id,
        source: DocumentSource::Local(path),
        content,
    })
}
