//! The resolved build plan handed to the compile/link orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::PchUsage;

/// Resolved settings for one module, in build order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Module name.
    pub name: String,
    /// Own exported paths, own private paths, then the exported paths of
    /// every visible dependency in build order. Relative paths are already
    /// joined onto the owning module's directory when it has one.
    pub include_paths: Vec<PathBuf>,
    /// Effective PCH mode; never [`PchUsage::Default`].
    pub pch_mode: PchUsage,
    /// Modules this module re-exports to its dependents (transitive over
    /// public edges), in build order. May include external modules.
    pub public_closure: Vec<String>,
    /// Direct private dependencies, in declaration order.
    pub private_dependencies: Vec<String>,
    /// Runtime-loaded modules, ascending. Not ordering-significant.
    pub dynamic_dependencies: Vec<String>,
}

/// Ordered output of a successful resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// One entry per loaded module; every entry comes after the entries of
    /// all modules it depends on.
    pub entries: Vec<PlanEntry>,
    /// External modules referenced by static dependencies, ascending.
    pub externals: Vec<String>,
}

impl BuildPlan {
    /// Module names in build order.
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn entry(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Position of `name` in the build order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// BLAKE3 digest of the plan contents as a 64-character hex string.
    ///
    /// Two plans with identical order and settings have identical
    /// fingerprints. Paths are hashed as their raw OS bytes, so paths that
    /// only differ in non-UTF-8 bytes still fingerprint differently.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for entry in &self.entries {
            hash_field(&mut hasher, entry.name.as_bytes());
            hash_field(&mut hasher, entry.pch_mode.as_str().as_bytes());
            hash_list(
                &mut hasher,
                entry
                    .include_paths
                    .iter()
                    .map(|p| p.as_os_str().as_encoded_bytes()),
            );
            hash_list(&mut hasher, entry.public_closure.iter().map(|s| s.as_bytes()));
            hash_list(
                &mut hasher,
                entry.private_dependencies.iter().map(|s| s.as_bytes()),
            );
            hash_list(
                &mut hasher,
                entry.dynamic_dependencies.iter().map(|s| s.as_bytes()),
            );
        }
        hash_list(&mut hasher, self.externals.iter().map(|s| s.as_bytes()));
        hasher.finalize().to_hex().to_string()
    }
}

// Length-prefixed so that ["ab"] and ["a", "b"] hash differently.
fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_list<'a>(hasher: &mut blake3::Hasher, items: impl ExactSizeIterator<Item = &'a [u8]>) {
    hasher.update(&(items.len() as u64).to_le_bytes());
    for item in items {
        hash_field(hasher, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> PlanEntry {
        PlanEntry {
            name: name.to_owned(),
            include_paths: vec![PathBuf::from(format!("{name}/Public"))],
            pch_mode: PchUsage::UseSharedPch,
            public_closure: Vec::new(),
            private_dependencies: Vec::new(),
            dynamic_dependencies: Vec::new(),
        }
    }

    #[test]
    fn lookup_helpers() {
        let plan = BuildPlan {
            entries: vec![entry("Core"), entry("Engine")],
            externals: vec![],
        };
        assert_eq!(plan.order(), ["Core", "Engine"]);
        assert_eq!(plan.position("Engine"), Some(1));
        assert!(plan.entry("Game").is_none());
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn fingerprint_is_hex_and_order_sensitive() {
        let a = BuildPlan {
            entries: vec![entry("Core"), entry("Engine")],
            externals: vec![],
        };
        let b = BuildPlan {
            entries: vec![entry("Engine"), entry("Core")],
            externals: vec![],
        };

        assert_eq!(a.fingerprint().len(), 64);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_separates_list_boundaries() {
        let mut a = entry("Game");
        a.public_closure = vec!["ab".to_owned()];
        let mut b = entry("Game");
        b.public_closure = vec!["a".to_owned(), "b".to_owned()];

        let plan_a = BuildPlan {
            entries: vec![a],
            externals: vec![],
        };
        let plan_b = BuildPlan {
            entries: vec![b],
            externals: vec![],
        };
        assert_ne!(plan_a.fingerprint(), plan_b.fingerprint());
    }

    #[cfg(unix)]
    #[test]
    fn fingerprint_keeps_non_utf8_path_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let with_path = |bytes: &[u8]| {
            let mut e = entry("Game");
            e.include_paths = vec![PathBuf::from(OsStr::from_bytes(bytes))];
            BuildPlan {
                entries: vec![e],
                externals: vec![],
            }
        };
        let a = with_path(b"Game/Inc\xfe");
        let b = with_path(b"Game/Inc\xff");

        assert_eq!(
            a.entries[0].include_paths[0].to_string_lossy(),
            b.entries[0].include_paths[0].to_string_lossy()
        );
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn plan_serializes_to_json() {
        let plan = BuildPlan {
            entries: vec![entry("Core")],
            externals: vec!["Engine".to_owned()],
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["entries"][0]["name"], "Core");
        assert_eq!(json["entries"][0]["pch_mode"], "UseSharedPch");
        assert_eq!(json["externals"][0], "Engine");
    }
}
