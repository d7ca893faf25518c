//! Module descriptors: the declared dependencies and compile settings of one
//! module.
//!
//! A [`ModuleDescriptor`] is immutable once built. All construction goes
//! through [`DescriptorBuilder::build`] (or `Deserialize`, which routes through
//! the same checks), so a descriptor value in hand is always well-formed:
//!
//! - the name is non-empty,
//! - no dependency list mentions the module itself,
//! - public and private dependencies are disjoint.
//!
//! Referential integrity across descriptors (does `Engine` actually exist?)
//! is not checked here; see [`crate::validate`].
//!
//! # Example
//!
//! ```
//! use modrules_core::descriptor::{ModuleDescriptor, PchUsage};
//!
//! let game = ModuleDescriptor::builder("Game")
//!     .pch_mode(PchUsage::UseExplicitOrSharedPch)
//!     .public_dependencies(["Core", "Engine"])
//!     .private_dependencies(["Slate"])
//!     .extra_include_paths(["Public"])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(game.name(), "Game");
//! assert_eq!(game.public_dependencies(), ["Core", "Engine"]);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ResolveError;

// ---------------------------------------------------------------------------
// PchUsage
// ---------------------------------------------------------------------------

/// Precompiled-header strategy for a module.
///
/// The `*PCHs` spellings used by existing descriptor files are accepted as
/// aliases when deserializing and parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PchUsage {
    /// Inherit the session default ([`ResolveConfig::default_pch`](crate::resolve::ResolveConfig::default_pch)).
    #[default]
    Default,
    /// Do not use precompiled headers at all.
    #[serde(alias = "NoPCHs")]
    NoPch,
    /// Use a module-private PCH, never a shared one.
    #[serde(alias = "NoSharedPCHs")]
    NoSharedPch,
    /// Use a shared PCH.
    #[serde(alias = "UseSharedPCHs")]
    UseSharedPch,
    /// Use the module's explicit PCH if it declares one, the shared PCH
    /// otherwise.
    #[serde(alias = "UseExplicitOrSharedPCHs")]
    UseExplicitOrSharedPch,
}

impl PchUsage {
    /// All variants, in declaration order.
    pub const ALL: [PchUsage; 5] = [
        PchUsage::Default,
        PchUsage::NoPch,
        PchUsage::NoSharedPch,
        PchUsage::UseSharedPch,
        PchUsage::UseExplicitOrSharedPch,
    ];

    /// Canonical name, as written by `Serialize`.
    pub fn as_str(self) -> &'static str {
        match self {
            PchUsage::Default => "Default",
            PchUsage::NoPch => "NoPch",
            PchUsage::NoSharedPch => "NoSharedPch",
            PchUsage::UseSharedPch => "UseSharedPch",
            PchUsage::UseExplicitOrSharedPch => "UseExplicitOrSharedPch",
        }
    }

    fn legacy_alias(self) -> Option<&'static str> {
        match self {
            PchUsage::Default => None,
            PchUsage::NoPch => Some("NoPCHs"),
            PchUsage::NoSharedPch => Some("NoSharedPCHs"),
            PchUsage::UseSharedPch => Some("UseSharedPCHs"),
            PchUsage::UseExplicitOrSharedPch => Some("UseExplicitOrSharedPCHs"),
        }
    }
}

impl fmt::Display for PchUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`PchUsage::from_str`] for an unrecognized mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown PCH usage mode '{0}' (expected one of Default, NoPch, NoSharedPch, UseSharedPch, UseExplicitOrSharedPch)")]
pub struct UnknownPchUsage(pub String);

impl FromStr for PchUsage {
    type Err = UnknownPchUsage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PchUsage::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s || mode.legacy_alias() == Some(s))
            .ok_or_else(|| UnknownPchUsage(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// ModuleDescriptor
// ---------------------------------------------------------------------------

/// One module's declared dependencies and compile settings.
///
/// Fields are private; use the accessors. To change a descriptor, call
/// [`to_builder`](Self::to_builder) and build a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DescriptorBuilder")]
pub struct ModuleDescriptor {
    name: String,
    pch_mode: PchUsage,
    public_dependencies: Vec<String>,
    private_dependencies: Vec<String>,
    dynamic_dependencies: BTreeSet<String>,
    extra_include_paths: Vec<PathBuf>,
    private_include_paths: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_dir: Option<PathBuf>,
}

impl ModuleDescriptor {
    /// Start building a descriptor for the module `name`.
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// A builder pre-filled with this descriptor's contents.
    pub fn to_builder(&self) -> DescriptorBuilder {
        DescriptorBuilder {
            name: self.name.clone(),
            pch_mode: self.pch_mode,
            public_dependencies: self.public_dependencies.clone(),
            private_dependencies: self.private_dependencies.clone(),
            dynamic_dependencies: self.dynamic_dependencies.iter().cloned().collect(),
            extra_include_paths: self.extra_include_paths.clone(),
            private_include_paths: self.private_include_paths.clone(),
            module_dir: self.module_dir.clone(),
        }
    }

    /// Returns this descriptor with its base directory replaced.
    ///
    /// The base directory only affects how relative include paths are
    /// resolved, so no re-validation is needed.
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(dir.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared PCH mode (possibly [`PchUsage::Default`]).
    pub fn pch_mode(&self) -> PchUsage {
        self.pch_mode
    }

    pub fn public_dependencies(&self) -> &[String] {
        &self.public_dependencies
    }

    pub fn private_dependencies(&self) -> &[String] {
        &self.private_dependencies
    }

    pub fn dynamic_dependencies(&self) -> &BTreeSet<String> {
        &self.dynamic_dependencies
    }

    /// Include paths exported to dependents, as declared (unresolved).
    pub fn extra_include_paths(&self) -> &[PathBuf] {
        &self.extra_include_paths
    }

    /// Include paths only this module compiles with, as declared (unresolved).
    pub fn private_include_paths(&self) -> &[PathBuf] {
        &self.private_include_paths
    }

    pub fn module_dir(&self) -> Option<&Path> {
        self.module_dir.as_deref()
    }

    /// Every module name this descriptor mentions: public, then private, then
    /// dynamic dependencies.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.public_dependencies
            .iter()
            .chain(&self.private_dependencies)
            .chain(&self.dynamic_dependencies)
            .map(String::as_str)
    }

    /// Resolve an include path against [`module_dir`](Self::module_dir).
    ///
    /// Absolute paths, and all paths of a descriptor without a base
    /// directory, are returned unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.module_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

// ---------------------------------------------------------------------------
// DescriptorBuilder
// ---------------------------------------------------------------------------

/// Accumulates the parts of a [`ModuleDescriptor`].
///
/// Every list method appends, so repeated calls accumulate in call order.
/// Nothing is checked until [`build`](Self::build).
///
/// The builder is also the unchecked wire form: deserializing one accepts
/// exactly the fields of a descriptor (only `name` is required) and defers
/// every check to `build`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorBuilder {
    name: String,
    #[serde(default)]
    pch_mode: PchUsage,
    #[serde(default)]
    public_dependencies: Vec<String>,
    #[serde(default)]
    private_dependencies: Vec<String>,
    #[serde(default)]
    dynamic_dependencies: Vec<String>,
    #[serde(default)]
    extra_include_paths: Vec<PathBuf>,
    #[serde(default)]
    private_include_paths: Vec<PathBuf>,
    #[serde(default)]
    module_dir: Option<PathBuf>,
}

impl DescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn pch_mode(mut self, mode: PchUsage) -> Self {
        self.pch_mode = mode;
        self
    }

    pub fn public_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn private_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private_dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn dynamic_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dynamic_dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn extra_include_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.extra_include_paths
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn private_include_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.private_include_paths
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(dir.into());
        self
    }

    /// Validate and produce the descriptor.
    ///
    /// Repeated names within one list collapse to their first occurrence.
    ///
    /// # Errors
    ///
    /// [`ResolveError::MalformedDescriptor`] if the name is empty, a
    /// dependency name is empty, the module lists itself, or a name is both
    /// a public and a private dependency.
    pub fn build(self) -> Result<ModuleDescriptor, ResolveError> {
        let name = self.name;
        if name.is_empty() {
            return Err(malformed(&name, "module name is empty"));
        }

        let public_dependencies = collapse_names(&name, "public", self.public_dependencies)?;
        let private_dependencies = collapse_names(&name, "private", self.private_dependencies)?;
        let dynamic_dependencies: BTreeSet<String> =
            collapse_names(&name, "dynamic", self.dynamic_dependencies)?
                .into_iter()
                .collect();

        if let Some(both) = public_dependencies
            .iter()
            .find(|dep| private_dependencies.contains(dep))
        {
            return Err(malformed(
                &name,
                format!("'{both}' is listed as both a public and a private dependency"),
            ));
        }

        for dep in &dynamic_dependencies {
            if public_dependencies.contains(dep) || private_dependencies.contains(dep) {
                warn!(
                    module = %name,
                    dependency = %dep,
                    "dynamic dependency is also declared as a static dependency"
                );
            }
        }

        Ok(ModuleDescriptor {
            name,
            pch_mode: self.pch_mode,
            public_dependencies,
            private_dependencies,
            dynamic_dependencies,
            extra_include_paths: self.extra_include_paths,
            private_include_paths: self.private_include_paths,
            module_dir: self.module_dir,
        })
    }
}

fn malformed(module: &str, reason: impl Into<String>) -> ResolveError {
    ResolveError::MalformedDescriptor {
        module: module.to_owned(),
        reason: reason.into(),
    }
}

/// Reject empty and self-referencing names, and drop repeats.
fn collapse_names(
    module: &str,
    list: &'static str,
    names: Vec<String>,
) -> Result<Vec<String>, ResolveError> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for dep in names {
        if dep.is_empty() {
            return Err(malformed(
                module,
                format!("empty module name in {list} dependencies"),
            ));
        }
        if dep == module {
            return Err(malformed(
                module,
                format!("module lists itself as a {list} dependency"),
            ));
        }
        if seen.insert(dep.clone()) {
            out.push(dep);
        } else {
            debug!(module, dependency = %dep, list, "collapsed repeated dependency name");
        }
    }
    Ok(out)
}

impl TryFrom<DescriptorBuilder> for ModuleDescriptor {
    type Error = ResolveError;

    fn try_from(builder: DescriptorBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_of(err: ResolveError) -> String {
        match err {
            ResolveError::MalformedDescriptor { reason, .. } => reason,
            other => panic!("expected MalformedDescriptor, got {other:?}"),
        }
    }

    // -- 1. Construction ----------------------------------------------------

    #[test]
    fn builder_accumulates_in_call_order() {
        let d = ModuleDescriptor::builder("BOZO")
            .public_dependencies(["Core", "CoreUObject"])
            .public_dependencies(["Engine"])
            .private_dependencies(["Slate"])
            .dynamic_dependencies(["OnlineSubsystemSteam"])
            .build()
            .unwrap();

        assert_eq!(d.public_dependencies(), ["Core", "CoreUObject", "Engine"]);
        assert_eq!(d.private_dependencies(), ["Slate"]);
        assert!(d.dynamic_dependencies().contains("OnlineSubsystemSteam"));
        assert_eq!(d.pch_mode(), PchUsage::Default);
    }

    #[test]
    fn empty_name_is_malformed() {
        let err = ModuleDescriptor::builder("").build().unwrap_err();
        assert_eq!(
            err,
            ResolveError::MalformedDescriptor {
                module: String::new(),
                reason: "module name is empty".to_owned(),
            }
        );
    }

    #[test]
    fn self_reference_is_malformed_in_every_list() {
        let public = ModuleDescriptor::builder("Game")
            .public_dependencies(["Game"])
            .build()
            .unwrap_err();
        assert!(reason_of(public).contains("itself as a public"));

        let private = ModuleDescriptor::builder("Game")
            .private_dependencies(["Game"])
            .build()
            .unwrap_err();
        assert!(reason_of(private).contains("itself as a private"));

        let dynamic = ModuleDescriptor::builder("Game")
            .dynamic_dependencies(["Game"])
            .build()
            .unwrap_err();
        assert!(reason_of(dynamic).contains("itself as a dynamic"));
    }

    #[test]
    fn public_private_overlap_is_malformed() {
        let err = ModuleDescriptor::builder("Game")
            .public_dependencies(["Core", "Engine"])
            .private_dependencies(["Engine"])
            .build()
            .unwrap_err();
        assert!(reason_of(err).contains("'Engine' is listed as both"));
    }

    #[test]
    fn empty_dependency_name_is_malformed() {
        let err = ModuleDescriptor::builder("Game")
            .private_dependencies([""])
            .build()
            .unwrap_err();
        assert!(reason_of(err).contains("empty module name"));
    }

    #[test]
    fn repeated_names_collapse_to_first_occurrence() {
        let d = ModuleDescriptor::builder("Game")
            .public_dependencies(["Engine", "Core", "Engine"])
            .build()
            .unwrap();
        assert_eq!(d.public_dependencies(), ["Engine", "Core"]);
    }

    #[test]
    fn dynamic_may_repeat_a_static_dependency() {
        let d = ModuleDescriptor::builder("Game")
            .public_dependencies(["Engine"])
            .dynamic_dependencies(["Engine"])
            .build()
            .unwrap();
        assert_eq!(d.references().collect::<Vec<_>>(), ["Engine", "Engine"]);
    }

    // -- 2. Paths -----------------------------------------------------------

    #[test]
    fn relative_paths_join_module_dir() {
        let d = ModuleDescriptor::builder("Engine")
            .module_dir("/src/Engine")
            .build()
            .unwrap();
        assert_eq!(
            d.resolve_path(Path::new("Public")),
            PathBuf::from("/src/Engine/Public")
        );
        assert_eq!(
            d.resolve_path(Path::new("/opt/include")),
            PathBuf::from("/opt/include")
        );
    }

    #[test]
    fn paths_unchanged_without_module_dir() {
        let d = ModuleDescriptor::builder("Engine").build().unwrap();
        assert_eq!(d.resolve_path(Path::new("Public")), PathBuf::from("Public"));
    }

    #[test]
    fn to_builder_produces_a_new_value() {
        let original = ModuleDescriptor::builder("Engine")
            .public_dependencies(["Core"])
            .build()
            .unwrap();
        let extended = original
            .to_builder()
            .private_dependencies(["Slate"])
            .build()
            .unwrap();

        assert!(original.private_dependencies().is_empty());
        assert_eq!(extended.public_dependencies(), ["Core"]);
        assert_eq!(extended.private_dependencies(), ["Slate"]);
    }

    // -- 3. PchUsage --------------------------------------------------------

    #[test]
    fn pch_usage_parses_canonical_and_legacy_names() {
        assert_eq!(
            "UseExplicitOrSharedPCHs".parse::<PchUsage>().unwrap(),
            PchUsage::UseExplicitOrSharedPch
        );
        assert_eq!("NoPch".parse::<PchUsage>().unwrap(), PchUsage::NoPch);
        assert_eq!("Default".parse::<PchUsage>().unwrap(), PchUsage::Default);
        assert!("Sometimes".parse::<PchUsage>().is_err());
    }

    #[test]
    fn pch_usage_display_matches_serde() {
        for mode in PchUsage::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
    }

    // -- 4. Serde -----------------------------------------------------------

    #[test]
    fn deserialize_applies_defaults() {
        let d: ModuleDescriptor = serde_json::from_str(r#"{"name": "Core"}"#).unwrap();
        assert_eq!(d.name(), "Core");
        assert!(d.public_dependencies().is_empty());
        assert!(d.module_dir().is_none());
    }

    #[test]
    fn deserialize_accepts_legacy_pch_spelling() {
        let d: ModuleDescriptor = serde_json::from_str(
            r#"{"name": "BOZO", "pch_mode": "UseExplicitOrSharedPCHs", "public_dependencies": ["Core"]}"#,
        )
        .unwrap();
        assert_eq!(d.pch_mode(), PchUsage::UseExplicitOrSharedPch);
    }

    #[test]
    fn deserialize_runs_construction_checks() {
        let err = serde_json::from_str::<ModuleDescriptor>(
            r#"{"name": "Game", "public_dependencies": ["Game"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn builder_deserializes_without_checking() {
        let builder: DescriptorBuilder =
            serde_json::from_str(r#"{"name": "Game", "public_dependencies": ["Game"]}"#).unwrap();
        assert!(builder.clone().module_dir("Game").build().is_err());

        let builder: DescriptorBuilder = serde_json::from_str(r#"{"name": "Core"}"#).unwrap();
        let d = builder.module_dir("/src/Core").build().unwrap();
        assert_eq!(d.module_dir(), Some(Path::new("/src/Core")));
    }

    #[test]
    fn deserialize_rejects_unknown_fields() {
        let err = serde_json::from_str::<ModuleDescriptor>(
            r#"{"name": "Game", "public_dependency_module_names": []}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn serialized_form_reads_back_identically() {
        let d = ModuleDescriptor::builder("Game")
            .pch_mode(PchUsage::NoSharedPch)
            .public_dependencies(["Engine"])
            .private_dependencies(["Slate"])
            .dynamic_dependencies(["Steam"])
            .extra_include_paths(["Public"])
            .private_include_paths(["Private"])
            .module_dir("/src/Game")
            .build()
            .unwrap();
        let json = serde_json::to_string(&d).unwrap();
        let back: ModuleDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
