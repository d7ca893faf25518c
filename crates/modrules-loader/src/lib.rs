//! modrules loader -- reads module descriptor trees from disk.
//!
//! Descriptors live in `<Name>.module.json` files anywhere under a root
//! directory, optionally next to a `modrules.json` session file that names
//! external modules and the default PCH mode. Files are discovered in sorted
//! order and parsed in parallel on the rayon pool; collecting the parallel
//! results is the single barrier before a session is validated.
//!
//! # Modules
//!
//! - [`format`]: the on-disk session file and descriptor parsing.
//! - [`load`]: discovery and (parallel) loading.
//!
//! # Example
//!
//! ```no_run
//! use modrules_loader::{load_tree, LoaderConfig};
//!
//! let tree = load_tree("Source".as_ref(), &LoaderConfig::default()).unwrap();
//! let mut session = tree.into_session().unwrap();
//! let plan = session.resolve().unwrap();
//! println!("{} modules", plan.len());
//! ```

#![deny(unsafe_code)]

use std::path::PathBuf;

use modrules_core::ResolveError;
use serde::{Deserialize, Serialize};

pub mod format;
pub mod load;

pub use format::{SessionFile, SESSION_FILE_NAME};
pub use load::{discover, load_descriptor, load_dir, load_session_file, load_tree, LoadedTree};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while reading descriptor files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for its expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but the descriptor failed its construction checks.
    #[error("invalid descriptor in {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: ResolveError,
    },

    /// `X.module.json` declares a module not named `X`.
    #[error("{} declares module '{found}', but its file name implies '{expected}'", path.display())]
    NameMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl LoadError {
    /// The file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::Descriptor { path, .. }
            | LoadError::NameMismatch { path, .. } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How descriptor files are discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File-name suffix identifying descriptor files, without the leading
    /// dot. Default: `module.json`.
    pub extension: String,
    /// Descend into subdirectories. Default: `true`.
    pub recursive: bool,
    /// Require `X.module.json` to declare module `X`. Default: `true`.
    pub check_file_names: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: "module.json".to_owned(),
            recursive: true,
            check_file_names: true,
        }
    }
}

impl LoaderConfig {
    /// The module name implied by a descriptor file name, if the name has
    /// the configured suffix.
    pub fn module_name_of<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.extension.as_str())
            .and_then(|stem| stem.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
    }
}
