//! On-disk formats.
//!
//! A descriptor file holds one module:
//!
//! ```json
//! {
//!   "name": "BOZO",
//!   "pch_mode": "UseExplicitOrSharedPCHs",
//!   "public_dependencies": ["Core", "CoreUObject", "Engine", "InputCore"],
//!   "private_dependencies": [],
//!   "dynamic_dependencies": [],
//!   "extra_include_paths": ["Public"]
//! }
//! ```
//!
//! Every field but `name` is optional, and the file's directory replaces any
//! `module_dir` it declares. Unknown fields are rejected so a typo
//! such as `public_dependency` fails loudly instead of being ignored.
//!
//! The session file (`modrules.json`, at the tree root) names the external
//! modules and the session default PCH mode:
//!
//! ```json
//! { "external_modules": ["Core", "Engine"], "default_pch": "UseSharedPCHs" }
//! ```

use std::path::Path;

use modrules_core::descriptor::{DescriptorBuilder, ModuleDescriptor, PchUsage};
use modrules_core::resolve::ResolveConfig;
use modrules_core::validate::ExternalModules;
use serde::{Deserialize, Serialize};

use crate::LoadError;

/// File name of the optional session file at the root of a descriptor tree.
pub const SESSION_FILE_NAME: &str = "modrules.json";

// ---------------------------------------------------------------------------
// Descriptor file
// ---------------------------------------------------------------------------

/// Parse descriptor file contents.
///
/// `path` is used for error reporting and, through its parent directory, as
/// the descriptor's module directory.
///
/// The text is read into a [`DescriptorBuilder`] first, so a schema problem
/// is a [`LoadError::Parse`] and a construction failure is a
/// [`LoadError::Descriptor`].
pub fn parse_descriptor(text: &str, path: &Path) -> Result<ModuleDescriptor, LoadError> {
    let mut builder: DescriptorBuilder =
        serde_json::from_str(text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        builder = builder.module_dir(dir);
    }

    builder.build().map_err(|source| LoadError::Descriptor {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Session file
// ---------------------------------------------------------------------------

/// Contents of `modrules.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionFile {
    /// Modules supplied outside the tree.
    pub external_modules: Vec<String>,
    /// Session default PCH mode; the resolver default when absent.
    pub default_pch: Option<PchUsage>,
}

impl SessionFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn externals(&self) -> ExternalModules {
        self.external_modules.iter().cloned().collect()
    }

    pub fn resolve_config(&self) -> ResolveConfig {
        match self.default_pch {
            Some(default_pch) => ResolveConfig { default_pch },
            None => ResolveConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let text = r#"{
            "name": "BOZO",
            "pch_mode": "UseExplicitOrSharedPCHs",
            "public_dependencies": ["Core", "CoreUObject", "Engine", "InputCore", "Kismet", "UE_Assimp"],
            "private_dependencies": [],
            "dynamic_dependencies": [],
            "extra_include_paths": ["Public"]
        }"#;
        let d = parse_descriptor(text, Path::new("Source/BOZO/BOZO.module.json")).unwrap();

        assert_eq!(d.name(), "BOZO");
        assert_eq!(d.pch_mode(), PchUsage::UseExplicitOrSharedPch);
        assert_eq!(d.public_dependencies().len(), 6);
        assert_eq!(d.module_dir(), Some(Path::new("Source/BOZO")));
    }

    #[test]
    fn bare_file_name_has_no_module_dir() {
        let d = parse_descriptor(r#"{"name": "Core"}"#, Path::new("Core.module.json")).unwrap();
        assert!(d.module_dir().is_none());
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_descriptor("{\"name\": ", Path::new("x.module.json")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let err = parse_descriptor(
            r#"{"name": "Game", "public_dependency": ["Core"]}"#,
            Path::new("Game.module.json"),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn construction_failure_is_descriptor_error() {
        let err = parse_descriptor(
            r#"{"name": "Game", "public_dependencies": ["Engine"], "private_dependencies": ["Engine"]}"#,
            Path::new("Game.module.json"),
        )
        .unwrap_err();
        match err {
            LoadError::Descriptor { source, .. } => {
                assert!(matches!(source, modrules_core::ResolveError::MalformedDescriptor { .. }));
            }
            other => panic!("expected Descriptor error, got {other:?}"),
        }
    }

    #[test]
    fn session_file_defaults() {
        let session = SessionFile::parse("{}", Path::new(SESSION_FILE_NAME)).unwrap();
        assert!(session.externals().is_empty());
        assert_eq!(session.resolve_config(), ResolveConfig::default());
    }

    #[test]
    fn session_file_with_settings() {
        let session = SessionFile::parse(
            r#"{"external_modules": ["Core", "Engine"], "default_pch": "NoSharedPCHs"}"#,
            Path::new(SESSION_FILE_NAME),
        )
        .unwrap();
        assert!(session.externals().contains("Engine"));
        assert_eq!(session.resolve_config().default_pch, PchUsage::NoSharedPch);
    }
}
