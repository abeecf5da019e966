// SPDX-License-Identifier: MIT

//! Graph model and its builder

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::edge::{ConditionalEdge, ConstEdge, EdgeResolver};
use super::node::{Decision, Node};
use crate::waypoint::error::{BuildError, GraphBuildError};

/// Named nodes, their routing rules and the start node.
///
/// Every edge source, redirection target and the start node are known node
/// names; the builder guarantees this. A node without an edge is terminal.
pub struct Graph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Arc<dyn EdgeResolver<S>>>,
    start: String,
}

impl<S> Graph<S> {
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, name: &str) -> Option<&Arc<dyn Node<S>>> {
        self.nodes.get(name)
    }

    pub fn edge(&self, name: &str) -> Option<&Arc<dyn EdgeResolver<S>>> {
        self.edges.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        !self.edges.contains_key(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<S> fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<&String> = self.nodes.keys().collect();
        nodes.sort();
        let mut edges: Vec<&String> = self.edges.keys().collect();
        edges.sort();
        f.debug_struct("Graph")
            .field("start", &self.start)
            .field("nodes", &nodes)
            .field("edges", &edges)
            .finish()
    }
}

/// Assembles a [`Graph`].
///
/// Edges or start nodes that reference unknown names are skipped with a
/// warning and remembered; `build` then fails listing all of them. Cycles and
/// unreachable nodes are accepted.
pub struct GraphBuilder<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Arc<dyn EdgeResolver<S>>>,
    start: Option<String>,
    errors: Vec<BuildError>,
}

impl<S> GraphBuilder<S>
where
    S: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            start: None,
            errors: Vec::new(),
        }
    }

    /// Register a node. A later node with the same name replaces it.
    pub fn add_node<N>(mut self, name: impl Into<String>, node: N) -> Self
    where
        N: Node<S> + 'static,
    {
        self.nodes.insert(name.into(), Arc::new(node));
        self
    }

    /// Register several already-shared nodes
    pub fn add_nodes<I, K>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Node<S>>)>,
        K: Into<String>,
    {
        self.nodes
            .extend(nodes.into_iter().map(|(name, node)| (name.into(), node)));
        self
    }

    /// Route `from` to `to` unconditionally
    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        if !self.nodes.contains_key(from) {
            log::warn!("start node not found: {}, skipping", from);
            self.errors
                .push(BuildError::UnknownEdgeSource(from.to_string()));
            return self;
        }

        if !self.nodes.contains_key(to) {
            log::warn!("end node not found: {} -> {}, skipping", from, to);
            self.errors.push(BuildError::UnknownEdgeTarget {
                from: from.to_string(),
                to: to.to_string(),
            });
            return self;
        }

        self.edges
            .insert(from.to_string(), Arc::new(ConstEdge::new(to)));
        self
    }

    /// Route `from` by the label `decision` returns.
    ///
    /// Redirections to unknown nodes are dropped; the others are kept.
    pub fn add_conditional_edge<D, I, K, V>(mut self, from: &str, decision: D, redirections: I) -> Self
    where
        D: Decision<S> + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !self.nodes.contains_key(from) {
            log::warn!("start node not found: {}, skipping", from);
            self.errors
                .push(BuildError::UnknownEdgeSource(from.to_string()));
            return self;
        }

        let mut targets = HashMap::new();
        for (label, to) in redirections {
            let (label, to) = (label.into(), to.into());
            if !self.nodes.contains_key(&to) {
                log::warn!(
                    "end node not found: {} -[{}]-> {}, skipping",
                    from,
                    label,
                    to
                );
                self.errors.push(BuildError::UnknownRedirection {
                    from: from.to_string(),
                    label,
                    to,
                });
                continue;
            }
            targets.insert(label, to);
        }

        let edge = ConditionalEdge::new(Arc::new(decision), targets);
        self.edges.insert(from.to_string(), Arc::new(edge));
        self
    }

    /// Set the node every fresh run starts at
    pub fn set_start(mut self, start: &str) -> Self {
        if start.is_empty() {
            log::warn!("start node cannot be empty, skipping");
            self.errors.push(BuildError::EmptyStartNode);
            return self;
        }

        if !self.nodes.contains_key(start) {
            log::warn!("start node not found: {}, skipping", start);
            self.errors
                .push(BuildError::UnknownStartNode(start.to_string()));
            return self;
        }

        self.start = Some(start.to_string());
        self
    }

    /// Problems recorded so far
    pub fn errors(&self) -> &[BuildError] {
        &self.errors
    }

    /// Finish the graph, failing if anything was skipped or no start was set
    pub fn build(self) -> Result<Graph<S>, GraphBuildError> {
        let mut errors = self.errors;
        if self.start.is_none() {
            errors.push(BuildError::NoStartNode);
        }
        if !errors.is_empty() {
            return Err(GraphBuildError { errors });
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            start: self.start.unwrap_or_default(),
        })
    }
}

impl<S> Default for GraphBuilder<S>
where
    S: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
