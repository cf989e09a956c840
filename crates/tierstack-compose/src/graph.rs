//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from the `depends_on` edges of declared
//! resources and resolves the order they have to be created in.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::ResourceId;
use tierstack_provider::record::ResourceRecord;

/// A dependency graph of resources.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<ResourceId, ()>,
    nodes: HashMap<ResourceId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Builds the graph of a record snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if a record depends on a resource
    /// missing from the snapshot.
    pub fn from_records(records: &[ResourceRecord]) -> Result<Self> {
        let mut graph = Self::new();
        for record in records {
            let _ = graph.add_resource(record.id.clone());
        }
        for record in records {
            let dependent = graph.add_resource(record.id.clone());
            for dependency in &record.depends_on {
                let Some(&dependency) = graph.nodes.get(dependency) else {
                    return Err(StackError::NotFound {
                        kind: "dependency",
                        id: dependency.to_string(),
                    });
                };
                graph.add_dependency(dependent, dependency);
            }
        }
        Ok(graph)
    }

    /// Adds a resource node, returning the existing node for a known id.
    pub fn add_resource(&mut self, id: ResourceId) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id.clone());
        let _ = self.nodes.insert(id, index);
        index
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.add_edge(dependency, dependent, ());
    }

    /// Returns the number of resources in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns whether the graph has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a creation order: dependencies before their dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<ResourceId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let at = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map_or_else(String::new, ToString::to_string);
                Err(StackError::Config {
                    message: format!("cyclic dependency detected in resource graph at {at}"),
                })
            }
        }
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts a record snapshot into creation order.
///
/// # Errors
///
/// Returns the errors of [`DependencyGraph::from_records`] and
/// [`DependencyGraph::resolve_order`].
pub fn creation_order(records: Vec<ResourceRecord>) -> Result<Vec<ResourceRecord>> {
    let order = DependencyGraph::from_records(&records)?.resolve_order()?;
    let mut by_id: HashMap<ResourceId, ResourceRecord> =
        records.into_iter().map(|r| (r.id.clone(), r)).collect();
    Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
}
