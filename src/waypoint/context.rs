// SPDX-License-Identifier: MIT

//! Execution contexts handed to nodes and decisions

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::interrupt::ResolvedInterrupt;

/// Caller-owned context for one `invoke`/`resume` call.
///
/// The engine never cancels anything itself; it only hands the token down so
/// long-running nodes can stop early.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a token the caller can cancel from elsewhere
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Answers submitted for interrupts, keyed by the node that raised them
#[derive(Debug, Clone, Default)]
pub struct ResumeTable {
    entries: HashMap<String, ResolvedInterrupt>,
}

impl ResumeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolved interrupt under the node that raised it
    pub fn insert(&mut self, resolved: ResolvedInterrupt) {
        self.entries
            .insert(resolved.interrupt.interrupt_id.node_id.clone(), resolved);
    }

    pub fn get(&self, node_id: &str) -> Option<&ResolvedInterrupt> {
        self.entries.get(node_id)
    }

    pub fn remove(&mut self, node_id: &str) -> Option<ResolvedInterrupt> {
        self.entries.remove(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Step-scoped view of a run
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    node_id: Option<String>,
    resolved: Option<ResolvedInterrupt>,
    run: RunContext,
}

impl NodeContext {
    /// Context for a node executed by the engine
    pub fn new(node_id: impl Into<String>, run: RunContext) -> Self {
        Self {
            node_id: Some(node_id.into()),
            resolved: None,
            run,
        }
    }

    /// Context with no node attached. Interrupt requests made through it fail.
    pub fn detached(run: RunContext) -> Self {
        Self {
            node_id: None,
            resolved: None,
            run,
        }
    }

    /// Attach the answers previously submitted for this node
    pub fn with_resolved(mut self, resolved: Option<ResolvedInterrupt>) -> Self {
        self.resolved = resolved;
        self
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn resolved(&self) -> Option<&ResolvedInterrupt> {
        self.resolved.as_ref()
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }
}
