//! Set-level validation of the descriptors that form one resolution session.
//!
//! Individual descriptors are already well-formed (see
//! [`crate::descriptor`]); this pass checks what only the whole set can
//! answer:
//!
//! - no two descriptors share a name ([`ResolveError::DuplicateModuleName`]),
//! - every dependency name, including dynamic ones, is either a loaded
//!   descriptor or a declared [`ExternalModules`] entry
//!   ([`ResolveError::UnknownModuleReference`]).
//!
//! Checks run in a fixed order (descriptors by ascending name, each
//! descriptor's references in declaration order) so that the first error
//! reported for a given input never depends on load order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::descriptor::ModuleDescriptor;
use crate::ResolveError;

// ---------------------------------------------------------------------------
// ExternalModules
// ---------------------------------------------------------------------------

/// Names of modules supplied outside the session (e.g. engine modules such
/// as `Core`). They may be depended upon but have no descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalModules(BTreeSet<String>);

impl ExternalModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the name was not already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    /// Names in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExternalModules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for ExternalModules {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

// ---------------------------------------------------------------------------
// ValidatedSet
// ---------------------------------------------------------------------------

/// A descriptor set that passed [`validate`], keyed by module name.
///
/// Only [`validate`] constructs this type, so holding one means uniqueness
/// and referential integrity hold.
#[derive(Debug, Clone)]
pub struct ValidatedSet {
    descriptors: BTreeMap<String, ModuleDescriptor>,
    externals: ExternalModules,
}

impl ValidatedSet {
    /// Descriptors in ascending name order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.descriptors.values()
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.get(name)
    }

    /// External modules, minus any name shadowed by a loaded descriptor.
    pub fn externals(&self) -> &ExternalModules {
        &self.externals
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Check uniqueness and referential integrity of a descriptor set.
///
/// A name that is both loaded and declared external resolves to the loaded
/// descriptor.
///
/// # Errors
///
/// - [`ResolveError::DuplicateModuleName`] for the alphabetically first name
///   shared by two descriptors.
/// - [`ResolveError::UnknownModuleReference`] for the first dangling
///   reference, in the order described in the module docs.
pub fn validate(
    descriptors: Vec<ModuleDescriptor>,
    externals: &ExternalModules,
) -> Result<ValidatedSet, ResolveError> {
    let mut sorted = descriptors;
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut by_name = BTreeMap::new();
    for descriptor in sorted {
        if by_name.contains_key(descriptor.name()) {
            return Err(ResolveError::DuplicateModuleName {
                module: descriptor.name().to_owned(),
            });
        }
        by_name.insert(descriptor.name().to_owned(), descriptor);
    }

    let mut effective_externals = externals.clone();
    for name in externals.iter() {
        if by_name.contains_key(name) {
            warn!(module = %name, "external module is shadowed by a loaded descriptor");
            effective_externals.remove(name);
        }
    }

    for descriptor in by_name.values() {
        for dep in descriptor.references() {
            if !by_name.contains_key(dep) && !effective_externals.contains(dep) {
                return Err(ResolveError::UnknownModuleReference {
                    module: dep.to_owned(),
                    referenced_by: descriptor.name().to_owned(),
                });
            }
        }
    }

    debug!(
        modules = by_name.len(),
        externals = effective_externals.len(),
        "descriptor set validated"
    );

    Ok(ValidatedSet {
        descriptors: by_name,
        externals: effective_externals,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
