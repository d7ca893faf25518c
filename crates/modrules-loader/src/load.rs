//! Descriptor discovery and loading.
//!
//! Discovery walks the tree and returns descriptor paths in sorted order.
//! Parsing then fans out over rayon; because the parallel results are
//! collected back into path order, the first error reported for a broken
//! tree is always the same one.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use modrules_core::descriptor::ModuleDescriptor;
use modrules_core::resolve::ResolveConfig;
use modrules_core::session::ResolutionSession;
use modrules_core::validate::ExternalModules;
use modrules_core::ResolveError;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::format::{parse_descriptor, SessionFile, SESSION_FILE_NAME};
use crate::{LoadError, LoaderConfig};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Find descriptor files under `root`, sorted by path.
///
/// The session file at `root` is never a descriptor, even when its name
/// matches [`LoaderConfig::extension`].
pub fn discover(root: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>, LoadError> {
    let session_file = root.join(SESSION_FILE_NAME);
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let entry = entry.map_err(io_error(&dir))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(io_error(&path))?;

            if file_type.is_dir() {
                if config.recursive {
                    pending.push(path);
                }
            } else if path != session_file
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| config.module_name_of(n))
                    .is_some()
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Read and parse one descriptor file.
///
/// With [`LoaderConfig::check_file_names`], `X.module.json` must declare
/// module `X`.
pub fn load_descriptor(path: &Path, config: &LoaderConfig) -> Result<ModuleDescriptor, LoadError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let descriptor = parse_descriptor(&text, path)?;

    if config.check_file_names {
        let expected = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| config.module_name_of(n));
        if let Some(expected) = expected {
            if expected != descriptor.name() {
                return Err(LoadError::NameMismatch {
                    path: path.to_path_buf(),
                    expected: expected.to_owned(),
                    found: descriptor.name().to_owned(),
                });
            }
        }
    }

    debug!(
        module = descriptor.name(),
        path = %path.display(),
        public = descriptor.public_dependencies().len(),
        private = descriptor.private_dependencies().len(),
        dynamic = descriptor.dynamic_dependencies().len(),
        "descriptor loaded"
    );
    Ok(descriptor)
}

/// Discover and load every descriptor under `root`, in parallel.
///
/// The returned descriptors are in path order.
pub fn load_dir(root: &Path, config: &LoaderConfig) -> Result<Vec<ModuleDescriptor>, LoadError> {
    let start = Instant::now();
    let paths = discover(root, config)?;

    let results: Vec<Result<ModuleDescriptor, LoadError>> = paths
        .par_iter()
        .map(|path| load_descriptor(path, config))
        .collect();
    let descriptors = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    info!(
        root = %root.display(),
        descriptors = descriptors.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "descriptor tree loaded"
    );
    Ok(descriptors)
}

pub fn load_session_file(path: &Path) -> Result<SessionFile, LoadError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    SessionFile::parse(&text, path)
}

// ---------------------------------------------------------------------------
// LoadedTree
// ---------------------------------------------------------------------------

/// Everything read from one descriptor tree.
#[derive(Debug, Clone)]
pub struct LoadedTree {
    pub root: PathBuf,
    /// Descriptors in path order.
    pub descriptors: Vec<ModuleDescriptor>,
    /// The root `modrules.json`, or defaults when the tree has none.
    pub session: SessionFile,
}

impl LoadedTree {
    pub fn externals(&self) -> ExternalModules {
        self.session.externals()
    }

    pub fn config(&self) -> ResolveConfig {
        self.session.resolve_config()
    }

    /// A `Loading` session holding this tree's descriptors and externals.
    pub fn into_session(self) -> Result<ResolutionSession, ResolveError> {
        let mut session = ResolutionSession::new(self.config());
        session.add_externals(self.session.external_modules)?;
        session.add_descriptors(self.descriptors)?;
        Ok(session)
    }
}

/// Load the descriptors and the optional session file under `root`.
pub fn load_tree(root: &Path, config: &LoaderConfig) -> Result<LoadedTree, LoadError> {
    let session_path = root.join(SESSION_FILE_NAME);
    let session = if session_path.is_file() {
        load_session_file(&session_path)?
    } else {
        debug!(root = %root.display(), "no session file, using defaults");
        SessionFile::default()
    };

    let descriptors = load_dir(root, config)?;
    Ok(LoadedTree {
        root: root.to_path_buf(),
        descriptors,
        session,
    })
}
