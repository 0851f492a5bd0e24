//! Dependency graph and deterministic installation order.
//!
//! Edges point from dependent to dependency: if A depends on B, the edge is
//! `A -> B` and B is ordered before A.
//!
//! # Example
//!
//! ```
//! use plinth_core::resolver::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("lang-python", 1);
//! graph.add_node("foundation", 0);
//! graph.add_edge("lang-python", "foundation");
//!
//! assert_eq!(graph.topological_order().unwrap(), ["foundation", "lang-python"]);
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use plinth_manifest::Manifest;

use crate::error::{Error, MissingPlugin, Result};

/// Directed dependency graph with a tie-break rank per node.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node id -> rank (lower installs first among ready nodes).
    nodes: BTreeMap<String, u8>,
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Re-adding a node updates its rank.
    pub fn add_node(&mut self, id: impl Into<String>, rank: u8) {
        let id = id.into();
        self.edges.entry(id.clone()).or_default();
        self.nodes.insert(id, rank);
    }

    /// Declare that `from` depends on `to`. Edges to unknown nodes are
    /// ignored by ordering.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Direct dependencies of a node that are part of the graph.
    pub fn dependencies_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(id)
            .into_iter()
            .flatten()
            .filter(|dep| self.nodes.contains_key(*dep))
            .map(String::as_str)
    }

    /// Build the graph of `requested` plus every transitive dependency.
    ///
    /// # Errors
    ///
    /// [`Error::DependencyUnresolved`] naming every id missing from the
    /// catalog together with the plugin that referenced it.
    pub fn closure<S: AsRef<str>>(manifest: &Manifest, requested: &[S]) -> Result<Self> {
        let mut graph = Self::new();
        let mut missing = Vec::new();
        let mut queue: VecDeque<(String, Option<String>)> = requested
            .iter()
            .map(|id| (id.as_ref().to_string(), None))
            .collect();
        let mut seen = BTreeSet::new();

        while let Some((id, referenced_by)) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(plugin) = manifest.get(&id) else {
                missing.push(MissingPlugin { id, referenced_by });
                continue;
            };
            graph.add_node(id.clone(), plugin.category.rank());
            for dependency in &plugin.dependencies {
                graph.add_edge(&id, dependency);
                queue.push_back((dependency.clone(), Some(id.clone())));
            }
        }

        if missing.is_empty() {
            Ok(graph)
        } else {
            Err(Error::DependencyUnresolved { missing })
        }
    }

    /// Kahn's algorithm. Among ready nodes the lowest `(rank, id)` goes
    /// first, so the order is fully deterministic.
    ///
    /// # Errors
    ///
    /// [`Error::Cycle`] with the shortest cycle among the nodes that could
    /// not be ordered.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        // In-degree here counts unsatisfied dependencies of each node.
        let mut pending: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), self.dependencies_of(id).count()))
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for id in self.nodes.keys() {
            for dep in self.dependencies_of(id) {
                dependents.entry(dep).or_default().push(id.as_str());
            }
        }

        let mut ready: BTreeSet<(u8, &str)> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| (self.nodes[*id], *id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some((_, current)) = ready.pop_first() {
            order.push(current.to_string());
            for dependent in dependents.get(current).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.nodes[*dependent], *dependent));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let ordered: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let residual: BTreeSet<&str> = self
                .nodes
                .keys()
                .map(String::as_str)
                .filter(|id| !ordered.contains(id))
                .collect();
            let cycle = self.shortest_cycle(&residual);
            return Err(Error::Cycle { cycle });
        }

        Ok(order)
    }

    /// Shortest cycle through the residual nodes, closed (`[a, b, a]`).
    ///
    /// Breadth-first search from each node back to itself; ties go to the
    /// lexicographically smallest start.
    fn shortest_cycle(&self, residual: &BTreeSet<&str>) -> Vec<String> {
        let mut best: Option<Vec<&str>> = None;

        for &start in residual {
            let mut parent: BTreeMap<&str, &str> = BTreeMap::new();
            let mut queue = VecDeque::from([start]);
            let mut found = None;

            'search: while let Some(node) = queue.pop_front() {
                for dep in self.dependencies_of(node) {
                    if !residual.contains(dep) {
                        continue;
                    }
                    if dep == start {
                        found = Some(node);
                        break 'search;
                    }
                    if !parent.contains_key(dep) {
                        parent.insert(dep, node);
                        queue.push_back(dep);
                    }
                }
            }

            if let Some(last) = found {
                let mut path = vec![last];
                let mut cursor = last;
                while cursor != start {
                    cursor = parent[cursor];
                    path.push(cursor);
                }
                path.reverse();
                path.push(start);
                if best.as_ref().is_none_or(|b| path.len() < b.len()) {
                    best = Some(path);
                }
            }
        }

        best.unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Dependency depth of every node: 0 without dependencies, otherwise one
    /// more than the deepest dependency. Nodes at the same level never depend
    /// on each other.
    pub fn levels(&self, order: &[String]) -> BTreeMap<String, usize> {
        let mut levels = BTreeMap::new();
        for id in order {
            let level = self
                .dependencies_of(id)
                .filter_map(|dep| levels.get(dep).map(|l: &usize| l + 1))
                .max()
                .unwrap_or(0);
            levels.insert(id.clone(), level);
        }
        levels
    }
}

/// Order `requested` and all transitive dependencies for installation.
pub fn resolve<S: AsRef<str>>(manifest: &Manifest, requested: &[S]) -> Result<Vec<String>> {
    let graph = DependencyGraph::closure(manifest, requested)?;
    let order = graph.topological_order()?;
    tracing::debug!(?order, "resolved installation order");
    Ok(order)
}
