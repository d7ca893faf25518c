//! One resolution session: a closed descriptor set driven from loading to a
//! build plan.
//!
//! ```text
//! Loading --resolve()--> Validating --> GraphBuilt --> Resolved
//!                            |               |
//!                            +-------+-------+--> Failed
//! ```
//!
//! Descriptors and external names are accepted only while `Loading`. The
//! first error moves the session to `Failed` and is kept in
//! [`ResolutionSession::error`]; no plan is exposed in that state. `Resolved`
//! and `Failed` are terminal.
//!
//! # Example
//!
//! ```
//! use modrules_core::prelude::*;
//!
//! let mut session = ResolutionSession::new(ResolveConfig::default());
//! session.add_external("Core").unwrap();
//! session
//!     .add_descriptor(
//!         ModuleDescriptor::builder("Game")
//!             .public_dependencies(["Core"])
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let plan = session.resolve().unwrap();
//! assert_eq!(plan.order(), ["Game"]);
//! assert_eq!(session.state(), SessionState::Resolved);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::descriptor::ModuleDescriptor;
use crate::graph::DependencyGraph;
use crate::plan::BuildPlan;
use crate::resolve::{resolve_graph, ResolveConfig};
use crate::validate::{validate, ExternalModules};
use crate::ResolveError;

/// Lifecycle state of a [`ResolutionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Loading,
    Validating,
    GraphBuilt,
    Resolved,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Resolved | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Loading => "Loading",
            SessionState::Validating => "Validating",
            SessionState::GraphBuilt => "GraphBuilt",
            SessionState::Resolved => "Resolved",
            SessionState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Owns the descriptors, externals and outcome of one resolution.
#[derive(Debug)]
pub struct ResolutionSession {
    state: SessionState,
    config: ResolveConfig,
    descriptors: Vec<ModuleDescriptor>,
    externals: ExternalModules,
    plan: Option<BuildPlan>,
    error: Option<ResolveError>,
}

impl ResolutionSession {
    pub fn new(config: ResolveConfig) -> Self {
        Self {
            state: SessionState::Loading,
            config,
            descriptors: Vec::new(),
            externals: ExternalModules::new(),
            plan: None,
            error: None,
        }
    }

    /// Add one descriptor. Only legal while [`SessionState::Loading`].
    pub fn add_descriptor(&mut self, descriptor: ModuleDescriptor) -> Result<(), ResolveError> {
        self.ensure_loading()?;
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn add_descriptors(
        &mut self,
        descriptors: impl IntoIterator<Item = ModuleDescriptor>,
    ) -> Result<(), ResolveError> {
        self.ensure_loading()?;
        self.descriptors.extend(descriptors);
        Ok(())
    }

    /// Declare a module supplied outside this session.
    pub fn add_external(&mut self, name: impl Into<String>) -> Result<(), ResolveError> {
        self.ensure_loading()?;
        self.externals.insert(name);
        Ok(())
    }

    pub fn add_externals<S: Into<String>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<(), ResolveError> {
        self.ensure_loading()?;
        self.externals.extend(names);
        Ok(())
    }

    /// Close the descriptor set and resolve it.
    ///
    /// # Errors
    ///
    /// Any [`ResolveError`] from validation, graph building or resolution
    /// (the session is then `Failed`), or [`ResolveError::SessionClosed`] if
    /// `resolve` was already called.
    pub fn resolve(&mut self) -> Result<&BuildPlan, ResolveError> {
        self.ensure_loading()?;
        match self.run() {
            Ok(plan) => {
                self.transition(SessionState::Resolved);
                Ok(&*self.plan.insert(plan))
            }
            Err(e) => {
                warn!(error = %e, modules = ?e.modules(), "resolution failed");
                self.transition(SessionState::Failed);
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<BuildPlan, ResolveError> {
        self.transition(SessionState::Validating);
        let descriptors = std::mem::take(&mut self.descriptors);
        let validated = validate(descriptors, &self.externals)?;
        let graph = DependencyGraph::from_validated(&validated)?;
        self.transition(SessionState::GraphBuilt);
        resolve_graph(&graph, &self.config)
    }

    fn transition(&mut self, next: SessionState) {
        info!(from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    fn ensure_loading(&self) -> Result<(), ResolveError> {
        if self.state == SessionState::Loading {
            Ok(())
        } else {
            Err(ResolveError::SessionClosed { state: self.state })
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// Number of descriptors added so far (zero once resolution started).
    pub fn pending_descriptors(&self) -> usize {
        self.descriptors.len()
    }

    pub fn externals(&self) -> &ExternalModules {
        &self.externals
    }

    /// The plan, present only in [`SessionState::Resolved`].
    pub fn plan(&self) -> Option<&BuildPlan> {
        self.plan.as_ref()
    }

    /// The recorded error, present only in [`SessionState::Failed`].
    pub fn error(&self) -> Option<&ResolveError> {
        self.error.as_ref()
    }

    /// Consume the session, returning its plan or its error.
    ///
    /// A session that was never resolved reports
    /// [`ResolveError::SessionClosed`] with its current state.
    pub fn into_plan(self) -> Result<BuildPlan, ResolveError> {
        match (self.plan, self.error) {
            (Some(plan), _) => Ok(plan),
            (None, Some(e)) => Err(e),
            (None, None) => Err(ResolveError::SessionClosed { state: self.state }),
        }
    }
}

/// Resolve a descriptor set in one call.
pub fn resolve_descriptors(
    descriptors: Vec<ModuleDescriptor>,
    externals: &ExternalModules,
    config: &ResolveConfig,
) -> Result<BuildPlan, ResolveError> {
    let mut session = ResolutionSession::new(config.clone());
    session.add_descriptors(descriptors)?;
    session.add_externals(externals.iter())?;
    session.resolve()?;
    session.into_plan()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
