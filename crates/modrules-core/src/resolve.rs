//! Resolution of a [`DependencyGraph`] into a [`BuildPlan`].
//!
//! # Order
//!
//! Depth-first topological sort. Roots are visited in ascending name order
//! and each node's dependencies are visited in ascending name order; a node
//! is emitted after all of its dependencies (post-order). The output is
//! therefore a pure function of the graph contents: the same descriptor set
//! always yields the same order, whatever order it was loaded in.
//!
//! Nodes are marked `Visiting` while on the DFS stack. Reaching a
//! `Visiting` node again is a back-edge, reported as
//! [`ResolveError::CyclicDependency`] with the stack slice from that node
//! back to itself.
//!
//! # Visibility
//!
//! For a module `M`:
//!
//! - `exported(M)` is the union over `M -public-> D` of `{D} ∪ exported(D)`.
//!   This is [`PlanEntry::public_closure`].
//! - `visible(M)` is the union over every direct dependency `D` of `M`,
//!   public or private, of `{D} ∪ exported(D)`.
//!
//! `M` compiles with its own exported and private include paths followed by
//! the exported paths of `visible(M)`. A module reached only through some
//! other module's private edge is never visible.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::descriptor::PchUsage;
use crate::graph::{DependencyGraph, Visibility};
use crate::plan::{BuildPlan, PlanEntry};
use crate::ResolveError;

// ---------------------------------------------------------------------------
// ResolveConfig
// ---------------------------------------------------------------------------

/// Session-wide resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// PCH mode for modules that declare [`PchUsage::Default`]. A value of
    /// `Default` here is treated as [`PchUsage::UseExplicitOrSharedPch`].
    pub default_pch: PchUsage,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            default_pch: PchUsage::UseExplicitOrSharedPch,
        }
    }
}

impl ResolveConfig {
    /// The PCH mode a module declaring `declared` compiles with.
    pub fn effective_pch(&self, declared: PchUsage) -> PchUsage {
        match (declared, self.default_pch) {
            (PchUsage::Default, PchUsage::Default) => PchUsage::UseExplicitOrSharedPch,
            (PchUsage::Default, session) => session,
            (module, _) => module,
        }
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Topological order over every node, externals included.
fn topological_order(graph: &DependencyGraph) -> Result<Vec<&str>, ResolveError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(graph.node_count());
    let mut stack: Vec<&str> = Vec::new();
    let mut order: Vec<&str> = Vec::with_capacity(graph.node_count());

    fn visit<'g>(
        graph: &'g DependencyGraph,
        name: &'g str,
        marks: &mut HashMap<&'g str, Mark>,
        stack: &mut Vec<&'g str>,
        order: &mut Vec<&'g str>,
    ) -> Result<(), ResolveError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    stack[start..].iter().map(|n| (*n).to_owned()).collect();
                cycle.push(name.to_owned());
                return Err(ResolveError::CyclicDependency { cycle });
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        stack.push(name);

        let mut deps: Vec<&str> = graph
            .dependencies_of(name)
            .iter()
            .map(|edge| edge.to.as_str())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        for dep in deps {
            visit(graph, dep, marks, stack, order)?;
        }

        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name);
        Ok(())
    }

    for name in graph.node_names() {
        visit(graph, name, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

// ---------------------------------------------------------------------------
// resolve_graph
// ---------------------------------------------------------------------------

/// Compute the build plan for `graph`.
///
/// # Errors
///
/// [`ResolveError::CyclicDependency`] if the static dependency graph has a
/// cycle. No plan is produced in that case.
pub fn resolve_graph(
    graph: &DependencyGraph,
    config: &ResolveConfig,
) -> Result<BuildPlan, ResolveError> {
    let order = topological_order(graph)?;
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i))
        .collect();

    // Closures as sets of build-order positions, so iteration yields build
    // order. Every dependency precedes its dependents in `order`, so both
    // sets are complete by the time a dependent needs them.
    let mut exported: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); order.len()];
    let mut visible: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); order.len()];

    for (i, name) in order.iter().enumerate() {
        let mut exp = BTreeSet::new();
        let mut vis = BTreeSet::new();
        for edge in graph.dependencies_of(name) {
            let d = position[edge.to.as_str()];
            vis.insert(d);
            vis.extend(exported[d].iter().copied());
            if edge.visibility == Visibility::Public {
                exp.insert(d);
                exp.extend(exported[d].iter().copied());
            }
        }
        exported[i] = exp;
        visible[i] = vis;
    }

    let mut entries = Vec::new();
    let mut externals = Vec::new();

    for (i, name) in order.iter().enumerate() {
        let Some(descriptor) = graph.node(name).and_then(|n| n.descriptor()) else {
            externals.push((*name).to_owned());
            continue;
        };

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut include_paths = Vec::new();
        let mut push = |path: PathBuf| {
            if seen.insert(path.clone()) {
                include_paths.push(path);
            }
        };

        for path in descriptor
            .extra_include_paths()
            .iter()
            .chain(descriptor.private_include_paths())
        {
            push(descriptor.resolve_path(path));
        }
        for &d in &visible[i] {
            if let Some(dep) = graph.node(order[d]).and_then(|n| n.descriptor()) {
                for path in dep.extra_include_paths() {
                    push(dep.resolve_path(path));
                }
            }
        }

        let entry = PlanEntry {
            name: (*name).to_owned(),
            include_paths,
            pch_mode: config.effective_pch(descriptor.pch_mode()),
            public_closure: exported[i].iter().map(|&d| order[d].to_owned()).collect(),
            private_dependencies: descriptor.private_dependencies().to_vec(),
            dynamic_dependencies: descriptor.dynamic_dependencies().iter().cloned().collect(),
        };

        debug!(
            module = %entry.name,
            position = entries.len(),
            include_paths = entry.include_paths.len(),
            public_closure = ?entry.public_closure,
            pch_mode = %entry.pch_mode,
            "module resolved"
        );
        entries.push(entry);
    }

    externals.sort();
    info!(
        modules = entries.len(),
        externals = externals.len(),
        "build plan resolved"
    );

    Ok(BuildPlan { entries, externals })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
