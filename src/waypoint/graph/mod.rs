// SPDX-License-Identifier: MIT

//! Graph model and execution
//!
//! This module provides the node and edge contracts, the graph builder
//! and the `Flow` executor that walks a graph from a checkpoint.

pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;

pub use builder::{Graph, GraphBuilder};
pub use edge::{ConditionalEdge, ConstEdge, EdgeResolver};
pub use executor::{Flow, FlowCallback, Outcome, RunStatus};
pub use node::{Decision, DecisionFn, FunctionNode, Node, NodeResult, Noop};
