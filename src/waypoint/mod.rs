// SPDX-License-Identifier: MIT

//! Resumable graph workflows
//!
//! A workflow is a graph of named nodes over a single state value. Runs are
//! checkpointed after every step; a node that needs human input raises an
//! interrupt, which suspends the run until answers are supplied through
//! [`pipe::Pipe::resume`].

pub mod booking;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod pipe;
pub mod store;

pub use context::{NodeContext, ResumeTable, RunContext};
pub use error::{BoxError, BuildError, FlowError, GraphBuildError, NodeError, RequirementError, StoreError};
pub use graph::{Flow, Graph, GraphBuilder, Node, NodeResult, Outcome, RunStatus};
pub use interrupt::{Answers, Interrupt, InterruptId, Requirement, RequirementType, Requirements, ResolvedInterrupt};
pub use pipe::{Pipe, ResumeConfig};
pub use store::{CheckpointState, ExecutionId, ExecutionState, FileStore, InMemoryStore, Store};
