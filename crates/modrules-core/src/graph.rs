//! Directed "depends on" graph over the modules of one session.
//!
//! An edge `A -> B` means A depends on B, so B must be built first. Edges are
//! drawn from public and private dependencies only; dynamic dependencies are
//! resolved at runtime and never produce edges. Each edge keeps its
//! [`Visibility`], which decides what is re-exported to dependents but has no
//! effect on ordering.
//!
//! External modules referenced by a static dependency become leaf nodes of
//! kind [`NodeKind::External`].
//!
//! The builder does not look for cycles; that is the resolver's job.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::descriptor::ModuleDescriptor;
use crate::validate::{ExternalModules, ValidatedSet};
use crate::ResolveError;

/// Whether a dependency is re-exported to the declaring module's dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

/// One dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The depending module.
    pub from: String,
    /// The module depended upon.
    pub to: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A module with a descriptor in this session.
    Module,
    /// A module supplied outside the session; known by name only.
    External,
}

/// A graph node: a loaded module or an external leaf.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    descriptor: Option<ModuleDescriptor>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        if self.descriptor.is_some() {
            NodeKind::Module
        } else {
            NodeKind::External
        }
    }

    /// The descriptor, or `None` for external nodes.
    pub fn descriptor(&self) -> Option<&ModuleDescriptor> {
        self.descriptor.as_ref()
    }
}

/// The dependency graph of one resolution session.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Node>,
    /// Outgoing edges per node: public dependencies first, then private, each
    /// in declaration order.
    edges: BTreeMap<String, Vec<Edge>>,
    /// Incoming edges per node, as the set of depending module names.
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph from a validated set.
    pub fn from_validated(set: &ValidatedSet) -> Result<Self, ResolveError> {
        Self::build(set.descriptors(), set.externals())
    }

    /// Build the graph from descriptors and the external modules they may
    /// reference.
    ///
    /// Descriptors are assumed unique by name; a later duplicate replaces an
    /// earlier one. Run [`validate`](crate::validate::validate) first to
    /// reject duplicates and dangling references with precise errors.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnresolvedNode`] if an edge targets a name that is
    /// neither a descriptor nor an external module.
    pub fn build<'a>(
        descriptors: impl IntoIterator<Item = &'a ModuleDescriptor>,
        externals: &ExternalModules,
    ) -> Result<Self, ResolveError> {
        let mut graph = DependencyGraph::default();

        for descriptor in descriptors {
            graph.nodes.insert(
                descriptor.name().to_owned(),
                Node {
                    name: descriptor.name().to_owned(),
                    descriptor: Some(descriptor.clone()),
                },
            );
        }

        let mut pending = Vec::new();
        for node in graph.nodes.values() {
            let Some(descriptor) = &node.descriptor else {
                continue;
            };
            let public = descriptor
                .public_dependencies()
                .iter()
                .map(|dep| (dep, Visibility::Public));
            let private = descriptor
                .private_dependencies()
                .iter()
                .map(|dep| (dep, Visibility::Private));
            for (dep, visibility) in public.chain(private) {
                pending.push(Edge {
                    from: node.name.clone(),
                    to: dep.clone(),
                    visibility,
                });
            }
        }

        for edge in pending {
            if !graph.nodes.contains_key(&edge.to) {
                if !externals.contains(&edge.to) {
                    return Err(ResolveError::UnresolvedNode {
                        module: edge.to,
                        referenced_by: edge.from,
                    });
                }
                graph.nodes.insert(
                    edge.to.clone(),
                    Node {
                        name: edge.to.clone(),
                        descriptor: None,
                    },
                );
            }
            graph
                .dependents
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
            graph.edges.entry(edge.from.clone()).or_default().push(edge);
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );

        Ok(graph)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// All nodes in ascending name order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node names in ascending order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Outgoing edges of `name` (empty for unknown names and external nodes).
    pub fn dependencies_of(&self, name: &str) -> &[Edge] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of the modules with an edge into `name`, ascending.
    pub fn dependents_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.dependents
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every edge, grouped by source in ascending name order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    fn bozo() -> ModuleDescriptor {
        ModuleDescriptor::builder("BOZO")
            .public_dependencies(["Core", "Engine"])
            .private_dependencies(["Slate"])
            .dynamic_dependencies(["OnlineSubsystemSteam"])
            .build()
            .unwrap()
    }

    fn engine_externals() -> ExternalModules {
        ["Core", "Engine", "Slate", "OnlineSubsystemSteam"]
            .into_iter()
            .collect()
    }

    #[test]
    fn edges_carry_visibility_in_declaration_order() {
        let set = validate(vec![bozo()], &engine_externals()).unwrap();
        let graph = DependencyGraph::from_validated(&set).unwrap();

        let edges: Vec<(&str, Visibility)> = graph
            .dependencies_of("BOZO")
            .iter()
            .map(|e| (e.to.as_str(), e.visibility))
            .collect();
        assert_eq!(
            edges,
            [
                ("Core", Visibility::Public),
                ("Engine", Visibility::Public),
                ("Slate", Visibility::Private),
            ]
        );
    }

    #[test]
    fn dynamic_dependencies_produce_no_edges_or_nodes() {
        let set = validate(vec![bozo()], &engine_externals()).unwrap();
        let graph = DependencyGraph::from_validated(&set).unwrap();

        assert_eq!(graph.edge_count(), 3);
        assert!(graph.node("OnlineSubsystemSteam").is_none());
        assert!(graph.edges().all(|e| e.to != "OnlineSubsystemSteam"));
    }

    #[test]
    fn referenced_externals_become_leaf_nodes() {
        let set = validate(vec![bozo()], &engine_externals()).unwrap();
        let graph = DependencyGraph::from_validated(&set).unwrap();

        assert_eq!(graph.node_count(), 4);
        let core = graph.node("Core").unwrap();
        assert_eq!(core.kind(), NodeKind::External);
        assert!(core.descriptor().is_none());
        assert!(graph.dependencies_of("Core").is_empty());
        assert_eq!(graph.node("BOZO").unwrap().kind(), NodeKind::Module);
    }

    #[test]
    fn reverse_edges_are_tracked() {
        let engine = ModuleDescriptor::builder("Engine").build().unwrap();
        let game = ModuleDescriptor::builder("Game")
            .private_dependencies(["Engine"])
            .build()
            .unwrap();
        let editor = ModuleDescriptor::builder("Editor")
            .public_dependencies(["Engine"])
            .build()
            .unwrap();

        let graph =
            DependencyGraph::build([&engine, &game, &editor], &ExternalModules::new()).unwrap();
        let dependents: Vec<&str> = graph.dependents_of("Engine").collect();
        assert_eq!(dependents, ["Editor", "Game"]);
        assert_eq!(graph.dependents_of("Game").count(), 0);
    }

    #[test]
    fn missing_edge_target_is_unresolved() {
        let game = ModuleDescriptor::builder("Game")
            .public_dependencies(["Engine"])
            .build()
            .unwrap();

        let err = DependencyGraph::build([&game], &ExternalModules::new()).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnresolvedNode {
                module: "Engine".to_owned(),
                referenced_by: "Game".to_owned(),
            }
        );
    }
}
