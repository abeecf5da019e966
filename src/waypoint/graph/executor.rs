// SPDX-License-Identifier: MIT

//! Graph executor: walks nodes from the checkpoint cursor until the run
//! completes, suspends on an interrupt or fails

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::builder::Graph;
use crate::waypoint::context::{NodeContext, ResumeTable, RunContext};
use crate::waypoint::error::{FlowError, NodeError, StoreError};
use crate::waypoint::interrupt::{Interrupt, ResolvedInterrupt};
use crate::waypoint::store::CheckpointState;

/// Lifecycle of one `execute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Suspended => "suspended",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<S> {
    /// Reached a terminal node or an unmapped routing label
    Completed(S),
    /// Suspended waiting for answers. `state` is the state before the
    /// interrupting step ran.
    Interrupted { state: S, interrupt: Interrupt },
}

impl<S> Outcome<S> {
    pub fn state(&self) -> &S {
        match self {
            Outcome::Completed(state) => state,
            Outcome::Interrupted { state, .. } => state,
        }
    }

    pub fn into_state(self) -> S {
        match self {
            Outcome::Completed(state) => state,
            Outcome::Interrupted { state, .. } => state,
        }
    }

    pub fn interrupt(&self) -> Option<&Interrupt> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Interrupted { interrupt, .. } => Some(interrupt),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

/// Lifecycle hook receiving the checkpoint and state at a step boundary.
///
/// An error aborts the run with `FlowError::Store`.
#[async_trait]
pub trait FlowCallback<S>: Send + Sync {
    async fn call(&self, checkpoint: &CheckpointState, state: &S) -> Result<(), StoreError>;
}

#[async_trait]
impl<S, F> FlowCallback<S> for F
where
    S: Sync + 'static,
    F: Fn(&CheckpointState, &S) -> Result<(), StoreError> + Send + Sync,
{
    async fn call(&self, checkpoint: &CheckpointState, state: &S) -> Result<(), StoreError> {
        self(checkpoint, state)
    }
}

type Hook<S> = Option<Arc<dyn FlowCallback<S>>>;

/// One run of a graph, from a checkpoint cursor.
///
/// Hooks:
/// - `on_node_exec` after each step, including the one that suspended
/// - `on_node_resolution` after the cursor moves to the next node
/// - `on_graph_end` exactly once per `execute`, however it ends
pub struct Flow<S> {
    name: String,
    graph: Arc<Graph<S>>,
    checkpoint: CheckpointState,
    status: RunStatus,
    on_node_exec: Hook<S>,
    on_node_resolution: Hook<S>,
    on_graph_end: Hook<S>,
}

impl<S> Flow<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, graph: Arc<Graph<S>>) -> Self {
        Self {
            name: name.into(),
            graph,
            checkpoint: CheckpointState::default(),
            status: RunStatus::Running,
            on_node_exec: None,
            on_node_resolution: None,
            on_graph_end: None,
        }
    }

    /// Continue from a stored checkpoint instead of the start node
    pub fn with_checkpoint(mut self, checkpoint: CheckpointState) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn on_node_exec(mut self, callback: Arc<dyn FlowCallback<S>>) -> Self {
        self.on_node_exec = Some(callback);
        self
    }

    pub fn on_node_resolution(mut self, callback: Arc<dyn FlowCallback<S>>) -> Self {
        self.on_node_resolution = Some(callback);
        self
    }

    pub fn on_graph_end(mut self, callback: Arc<dyn FlowCallback<S>>) -> Self {
        self.on_graph_end = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checkpoint(&self) -> &CheckpointState {
        &self.checkpoint
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Run until completion, suspension or failure.
    ///
    /// `resume` carries answers for nodes that interrupted earlier; each entry
    /// is consumed once its node finishes, so looping back to that node later
    /// raises a fresh interrupt.
    pub async fn execute(
        &mut self,
        ctx: &RunContext,
        mut resume: ResumeTable,
        state: S,
    ) -> Result<Outcome<S>, FlowError> {
        if self.checkpoint.checkpoint_id.is_empty() {
            self.checkpoint.checkpoint_id = self.graph.start().to_string();
        }
        self.status = RunStatus::Running;
        log::info!(
            "Running flow {} from node {}",
            self.name,
            self.checkpoint.checkpoint_id
        );

        let mut state = state;
        let result = self.run_loop(ctx, &mut resume, &mut state).await;
        self.status = match &result {
            Ok(Some(_)) => RunStatus::Suspended,
            Ok(None) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };

        let finalized = notify(&self.on_graph_end, &self.checkpoint, &state).await;
        match (result, finalized) {
            (Err(err), Err(end_err)) => {
                log::error!("Flow {} end hook failed after error: {}", self.name, end_err);
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(_), Err(end_err)) => {
                self.status = RunStatus::Failed;
                Err(FlowError::Store(end_err))
            }
            (Ok(Some(interrupt)), Ok(())) => Ok(Outcome::Interrupted { state, interrupt }),
            (Ok(None), Ok(())) => {
                log::info!("Flow {} completed", self.name);
                Ok(Outcome::Completed(state))
            }
        }
    }

    async fn run_loop(
        &mut self,
        ctx: &RunContext,
        resume: &mut ResumeTable,
        state: &mut S,
    ) -> Result<Option<Interrupt>, FlowError> {
        let graph = Arc::clone(&self.graph);

        loop {
            let current = self.checkpoint.checkpoint_id.clone();
            let node = graph
                .node(&current)
                .ok_or_else(|| FlowError::NodeNotFound(current.clone()))?;

            self.checkpoint.visited.push(current.clone());
            log::info!("Executing node: {}", current);

            let node_ctx = NodeContext::new(current.clone(), ctx.clone())
                .with_resolved(resume.get(&current).cloned());

            match node.execute(&node_ctx, state.clone()).await {
                Err(NodeError::Interrupted(interrupt)) => {
                    log::info!(
                        "Node {} interrupted ({}): {}",
                        current,
                        interrupt.reason,
                        interrupt.message
                    );
                    self.checkpoint.interrupt = Some(interrupt.clone());
                    self.status = RunStatus::Suspended;
                    notify(&self.on_node_exec, &self.checkpoint, state).await?;
                    return Ok(Some(interrupt));
                }
                Err(NodeError::Failed(source)) => {
                    log::error!("Node {} failed: {}", current, source);
                    return Err(FlowError::Node {
                        node: current,
                        source,
                    });
                }
                Ok(next_state) => {
                    *state = next_state;
                    self.settle_interrupt(&current, resume);
                    notify(&self.on_node_exec, &self.checkpoint, state).await?;
                }
            }

            let Some(edge) = graph.edge(&current) else {
                log::debug!("Node {} is terminal", current);
                return Ok(None);
            };

            match edge.resolve(ctx, state).await {
                Some(next) => {
                    log::debug!("Routing {} -> {}", current, next);
                    self.checkpoint.checkpoint_id = next;
                    notify(&self.on_node_resolution, &self.checkpoint, state).await?;
                }
                None => return Ok(None),
            }
        }
    }

    /// Move a pending interrupt raised by `node` into history once the node
    /// has finished, together with the answers it received.
    fn settle_interrupt(&mut self, node: &str, resume: &mut ResumeTable) {
        let resolved = resume.remove(node);
        let pending_here = self
            .checkpoint
            .interrupt
            .as_ref()
            .is_some_and(|pending| pending.interrupt_id.node_id == node);
        if !pending_here {
            return;
        }

        if let Some(interrupt) = self.checkpoint.interrupt.take() {
            let values = resolved.map(|r| r.values).unwrap_or_default();
            self.checkpoint
                .interrupt_history
                .push(ResolvedInterrupt { interrupt, values });
        }
    }
}

async fn notify<S>(hook: &Hook<S>, checkpoint: &CheckpointState, state: &S) -> Result<(), StoreError> {
    match hook {
        Some(callback) => callback.call(checkpoint, state).await,
        None => Ok(()),
    }
}
