//! modrules core -- module dependency descriptors and their resolution into a
//! build plan.
//!
//! A build orchestrator describes each compilation unit with a
//! [`ModuleDescriptor`](descriptor::ModuleDescriptor): the modules it depends
//! on publicly, privately or dynamically, its precompiled-header mode and the
//! include paths it contributes. This crate turns a closed set of such
//! descriptors into an ordered [`BuildPlan`](plan::BuildPlan).
//!
//! # Pipeline
//!
//! 1. [`descriptor`] -- immutable descriptors, checked at construction.
//! 2. [`validate`] -- uniqueness and referential integrity over the set.
//! 3. [`graph`] -- "depends on" edges with public/private visibility.
//! 4. [`resolve`] -- deterministic topological order, cycle detection,
//!    transitive public closures and include paths.
//!
//! [`session::ResolutionSession`] drives the four stages as a state machine;
//! [`session::resolve_descriptors`] is the one-shot equivalent.
//!
//! # Quick Start
//!
//! ```
//! use modrules_core::prelude::*;
//!
//! let core = ModuleDescriptor::builder("Core")
//!     .extra_include_paths(["Core/Public"])
//!     .build()
//!     .unwrap();
//! let engine = ModuleDescriptor::builder("Engine")
//!     .public_dependencies(["Core"])
//!     .extra_include_paths(["Engine/Public"])
//!     .build()
//!     .unwrap();
//! let game = ModuleDescriptor::builder("Game")
//!     .private_dependencies(["Engine"])
//!     .build()
//!     .unwrap();
//!
//! let plan = resolve_descriptors(
//!     vec![game, engine, core],
//!     &ExternalModules::new(),
//!     &ResolveConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(plan.order(), ["Core", "Engine", "Game"]);
//! let game = plan.entry("Game").unwrap();
//! assert_eq!(game.public_closure, Vec::<String>::new());
//! assert_eq!(game.include_paths.len(), 2);
//! ```

#![deny(unsafe_code)]

pub mod descriptor;
pub mod graph;
pub mod plan;
pub mod resolve;
pub mod session;
pub mod validate;

use session::SessionState;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building, validating or resolving descriptors.
///
/// Every variant is a configuration defect in the input descriptors; none is
/// transient. Each carries the module name(s) needed to locate the fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A descriptor failed its construction checks.
    #[error("malformed descriptor for module '{module}': {reason}")]
    MalformedDescriptor { module: String, reason: String },

    /// Two descriptors in one session share a name.
    #[error("duplicate module name '{module}'")]
    DuplicateModuleName { module: String },

    /// A dependency names a module that is neither loaded nor external.
    #[error("module '{referenced_by}' depends on unknown module '{module}' (not loaded and not declared external)")]
    UnknownModuleReference {
        module: String,
        referenced_by: String,
    },

    /// A graph edge targets a name missing from the node set.
    #[error("dependency edge '{referenced_by}' -> '{module}' targets a module that is not in the graph")]
    UnresolvedNode {
        module: String,
        referenced_by: String,
    },

    /// The static dependency graph contains a cycle. The first and last
    /// entries of `cycle` are the same module.
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// The session no longer accepts the requested operation.
    #[error("resolution session is {state} and cannot accept this operation")]
    SessionClosed { state: SessionState },
}

impl ResolveError {
    /// The module names implicated by this error, in report order.
    pub fn modules(&self) -> Vec<&str> {
        match self {
            ResolveError::MalformedDescriptor { module, .. }
            | ResolveError::DuplicateModuleName { module } => vec![module.as_str()],
            ResolveError::UnknownModuleReference {
                module,
                referenced_by,
            }
            | ResolveError::UnresolvedNode {
                module,
                referenced_by,
            } => vec![referenced_by.as_str(), module.as_str()],
            ResolveError::CyclicDependency { cycle } => {
                cycle.iter().map(String::as_str).collect()
            }
            ResolveError::SessionClosed { .. } => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::descriptor::{DescriptorBuilder, ModuleDescriptor, PchUsage};
    pub use crate::graph::{DependencyGraph, Edge, Node, NodeKind, Visibility};
    pub use crate::plan::{BuildPlan, PlanEntry};
    pub use crate::resolve::{resolve_graph, ResolveConfig};
    pub use crate::session::{resolve_descriptors, ResolutionSession, SessionState};
    pub use crate::validate::{validate, ExternalModules, ValidatedSet};
    pub use crate::ResolveError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
