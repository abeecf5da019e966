// SPDX-License-Identifier: MIT

//! Typed errors for graph construction, execution and persistence

use thiserror::Error;

use super::interrupt::Interrupt;
use super::store::ExecutionId;

/// Opaque failure raised by a node implementation
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by `Flow` and `Pipe` runs
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node returned a non-interrupt failure. The source is kept verbatim.
    #[error("node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: BoxError,
    },

    /// The checkpoint cursor names a node the graph does not know about
    #[error("node '{0}' is not registered in the graph")]
    NodeNotFound(String),

    /// Resume was requested for an execution the store has never seen
    #[error("no execution state found for {0}")]
    ExecutionNotFound(ExecutionId),

    /// Resume was requested but the stored checkpoint has nothing pending
    #[error("execution {0} has no pending interrupt to resume")]
    NoPendingInterrupt(ExecutionId),

    /// Submitted answers do not satisfy the pending interrupt
    #[error(transparent)]
    Requirement(#[from] RequirementError),

    /// A checkpoint write or read failed
    #[error("checkpoint persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// What a node returns instead of a new state
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node needs external input before it can finish
    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    /// Anything else. Fatal for the current run.
    #[error(transparent)]
    Failed(#[from] BoxError),
}

impl NodeError {
    /// Wrap any error as a fatal node failure
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(err.into())
    }

    /// Returns the interrupt if this is a suspension
    pub fn as_interrupt(&self) -> Option<&Interrupt> {
        match self {
            NodeError::Interrupted(interrupt) => Some(interrupt),
            NodeError::Failed(_) => None,
        }
    }
}

/// Answer validation failures, raised before a run is resumed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
    #[error("requirement key '{0}' not found")]
    Missing(String),

    #[error("invalid value for {key}: {value}, need one of [{}]", .allowed.join(", "))]
    Invalid {
        key: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// Store backend failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A single problem found while assembling a graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no invocation node found")]
    NoStartNode,

    #[error("start node cannot be empty")]
    EmptyStartNode,

    #[error("start node not found: {0}")]
    UnknownStartNode(String),

    #[error("edge source node not found: {0}")]
    UnknownEdgeSource(String),

    #[error("edge target node not found: {from} -> {to}")]
    UnknownEdgeTarget { from: String, to: String },

    #[error("redirection '{label}' of {from} targets unknown node {to}")]
    UnknownRedirection {
        from: String,
        label: String,
        to: String,
    },
}

/// Every problem recorded by a `GraphBuilder`, reported together
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graph build failed: {}", join_errors(.errors))]
pub struct GraphBuildError {
    pub errors: Vec<BuildError>,
}

fn join_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_invalid_message_lists_allowed_values() {
        let err = RequirementError::Invalid {
            key: "seat".to_string(),
            value: "roof".to_string(),
            allowed: vec!["aisle".to_string(), "window".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "invalid value for seat: roof, need one of [aisle, window]"
        );
    }

    #[test]
    fn test_requirement_missing_names_key() {
        let err = RequirementError::Missing("name".to_string());
        assert_eq!(err.to_string(), "requirement key 'name' not found");
    }

    #[test]
    fn test_graph_build_error_joins_all_errors() {
        let err = GraphBuildError {
            errors: vec![
                BuildError::UnknownEdgeSource("ghost".to_string()),
                BuildError::NoStartNode,
            ],
        };
        assert_eq!(
            err.to_string(),
            "graph build failed: edge source node not found: ghost; no invocation node found"
        );
    }

    #[test]
    fn test_node_error_from_box_is_failure() {
        let boxed: BoxError = "boom".into();
        let err = NodeError::from(boxed);
        assert!(err.as_interrupt().is_none());
        assert_eq!(err.to_string(), "boom");
    }
}
