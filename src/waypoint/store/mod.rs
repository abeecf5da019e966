// SPDX-License-Identifier: MIT

//! Checkpoint persistence
//!
//! This module provides:
//! - `CheckpointState` - the durable execution cursor
//! - `ExecutionState` - checkpoint plus application state, persisted as one unit
//! - `Store` - the pluggable persistence boundary
//! - `InMemoryStore` and `FileStore` implementations

mod file;
mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::StoreError;
use super::interrupt::{Interrupt, ResolvedInterrupt};

/// Caller-supplied run id scoped by workflow name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId {
    pub id: String,
    pub flow_name: String,
}

impl ExecutionId {
    pub fn new(id: impl Into<String>, flow_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            flow_name: flow_name.into(),
        }
    }

    /// Flat key used by stores
    pub fn key(&self) -> String {
        format!("{}:{}", self.id, self.flow_name)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.flow_name)
    }
}

/// Where a run stands: next node, history, pending and resolved interrupts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Node to run next. Empty before the first step.
    #[serde(default)]
    pub checkpoint_id: String,
    /// Every node executed so far, in order. Replays and loops repeat names.
    #[serde(default)]
    pub visited: Vec<String>,
    /// Interrupt waiting for answers
    #[serde(default)]
    pub interrupt: Option<Interrupt>,
    /// Interrupts whose node completed after receiving answers
    #[serde(default)]
    pub interrupt_history: Vec<ResolvedInterrupt>,
}

impl CheckpointState {
    pub fn is_suspended(&self) -> bool {
        self.interrupt.is_some()
    }
}

/// Checkpoint and application state, stored together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState<S> {
    pub checkpoint_state: CheckpointState,
    pub application_state: S,
}

/// Persistence boundary for execution state.
///
/// `get` distinguishes a missing record (`Ok(None)`) from a stored one.
/// Implementations own any locking they need.
#[async_trait]
pub trait Store<S>: Send + Sync {
    async fn get(&self, id: &ExecutionId) -> Result<Option<ExecutionState<S>>, StoreError>;

    async fn set(&self, id: &ExecutionId, state: &ExecutionState<S>) -> Result<(), StoreError>;
}
