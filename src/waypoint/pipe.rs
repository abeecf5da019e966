// SPDX-License-Identifier: MIT

//! Checkpoint/resume orchestration on top of `Flow` and a `Store`

use async_trait::async_trait;
use std::sync::Arc;

use super::context::{ResumeTable, RunContext};
use super::error::{FlowError, StoreError};
use super::graph::{Flow, FlowCallback, Graph, Outcome};
use super::interrupt::{Answers, ResolvedInterrupt};
use super::store::{CheckpointState, ExecutionId, ExecutionState, Store};

/// Answers submitted when continuing a suspended run
#[derive(Debug, Clone, Default)]
pub struct ResumeConfig {
    pub interrupt_values: Answers,
}

impl ResumeConfig {
    pub fn new(interrupt_values: Answers) -> Self {
        Self { interrupt_values }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.interrupt_values.insert(key.into(), value.into());
        self
    }
}

/// Writes the checkpoint and application state after every hook
struct Persist<S> {
    store: Arc<dyn Store<S>>,
    id: ExecutionId,
}

#[async_trait]
impl<S> FlowCallback<S> for Persist<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn call(&self, checkpoint: &CheckpointState, state: &S) -> Result<(), StoreError> {
        let snapshot = ExecutionState {
            checkpoint_state: checkpoint.clone(),
            application_state: state.clone(),
        };
        self.store.set(&self.id, &snapshot).await
    }
}

/// A named graph bound to a store.
///
/// Every step boundary is persisted under `(run id, pipe name)`, so a run
/// suspended by an interrupt can be continued later, possibly from another
/// process sharing the store.
pub struct Pipe<S> {
    name: String,
    graph: Arc<Graph<S>>,
    store: Arc<dyn Store<S>>,
}

impl<S> Pipe<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, graph: Graph<S>, store: Arc<dyn Store<S>>) -> Self {
        Self {
            name: name.into(),
            graph: Arc::new(graph),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }

    pub fn execution_id(&self, id: &str) -> ExecutionId {
        ExecutionId::new(id, self.name.as_str())
    }

    fn flow(&self, id: &ExecutionId, checkpoint: CheckpointState) -> Flow<S> {
        let persist: Arc<dyn FlowCallback<S>> = Arc::new(Persist {
            store: Arc::clone(&self.store),
            id: id.clone(),
        });

        Flow::new(self.name.as_str(), Arc::clone(&self.graph))
            .with_checkpoint(checkpoint)
            .on_node_exec(Arc::clone(&persist))
            .on_node_resolution(Arc::clone(&persist))
            .on_graph_end(persist)
    }

    /// Start a fresh run from the start node.
    ///
    /// Any state already stored under `id` is overwritten as the run proceeds.
    pub async fn invoke(&self, ctx: &RunContext, id: &str, init: S) -> Result<Outcome<S>, FlowError> {
        let exec_id = self.execution_id(id);
        log::info!("Invoking {}", exec_id);

        let mut flow = self.flow(&exec_id, CheckpointState::default());
        flow.execute(ctx, ResumeTable::new(), init).await
    }

    /// Continue a suspended run with answers for its pending interrupt.
    ///
    /// Answers are checked against the pending requirements before anything
    /// is written; a rejected resume leaves the stored state untouched.
    pub async fn resume(
        &self,
        ctx: &RunContext,
        id: &str,
        config: ResumeConfig,
    ) -> Result<Outcome<S>, FlowError> {
        let exec_id = self.execution_id(id);
        let stored = self
            .store
            .get(&exec_id)
            .await?
            .ok_or_else(|| FlowError::ExecutionNotFound(exec_id.clone()))?;

        let pending = stored
            .checkpoint_state
            .interrupt
            .clone()
            .ok_or_else(|| FlowError::NoPendingInterrupt(exec_id.clone()))?;

        let values = pending
            .requirements
            .check_answers(&config.interrupt_values)?;

        log::info!(
            "Resuming {} at node {}",
            exec_id,
            stored.checkpoint_state.checkpoint_id
        );

        let mut resume = ResumeTable::new();
        resume.insert(ResolvedInterrupt {
            interrupt: pending,
            values,
        });

        let mut flow = self.flow(&exec_id, stored.checkpoint_state);
        flow.execute(ctx, resume, stored.application_state).await
    }

    /// Stored execution state for `id`, if any
    pub async fn state(&self, id: &str) -> Result<Option<ExecutionState<S>>, FlowError> {
        Ok(self.store.get(&self.execution_id(id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::context::NodeContext;
    use crate::waypoint::graph::{FunctionNode, GraphBuilder, Noop};
    use crate::waypoint::interrupt::{self, Requirement, Requirements};
    use crate::waypoint::store::InMemoryStore;

    fn seat_graph() -> Graph<Vec<String>> {
        let pick_seat = FunctionNode::new(|ctx: NodeContext, mut seats: Vec<String>| async move {
            let requirements =
                Requirements::new().with("seat", Requirement::one_of(["aisle", "window"]));
            let values = interrupt::request(&ctx, "Pick a seat", "seat_missing", requirements)?;
            seats.push(values.get("seat").cloned().unwrap_or_default());
            Ok(seats)
        });

        GraphBuilder::new()
            .add_node("pick_seat", pick_seat)
            .add_node("done", Noop)
            .add_edge("pick_seat", "done")
            .set_start("pick_seat")
            .build()
            .unwrap()
    }

    fn pipe() -> (Pipe<Vec<String>>, InMemoryStore<Vec<String>>) {
        let store = InMemoryStore::new();
        let pipe = Pipe::new("seats", seat_graph(), Arc::new(store.clone()));
        (pipe, store)
    }

    #[tokio::test]
    async fn test_invoke_persists_suspension() {
        let (pipe, store) = pipe();
        let outcome = pipe
            .invoke(&RunContext::new(), "run-1", Vec::new())
            .await
            .unwrap();
        assert!(outcome.interrupt().is_some());

        let stored = store
            .get(&ExecutionId::new("run-1", "seats"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.checkpoint_state.checkpoint_id, "pick_seat");
        assert!(stored.checkpoint_state.is_suspended());
        assert!(stored.application_state.is_empty());
    }

    #[tokio::test]
    async fn test_resume_completes_run() {
        let (pipe, _store) = pipe();
        let ctx = RunContext::new();
        pipe.invoke(&ctx, "run-1", Vec::new()).await.unwrap();

        let outcome = pipe
            .resume(&ctx, "run-1", ResumeConfig::default().with("seat", "window"))
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.state(), &vec!["window".to_string()]);

        let stored = pipe.state("run-1").await.unwrap().unwrap();
        assert_eq!(stored.checkpoint_state.visited, vec!["pick_seat", "pick_seat", "done"]);
        assert!(!stored.checkpoint_state.is_suspended());
        assert_eq!(stored.checkpoint_state.interrupt_history.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_unknown_execution() {
        let (pipe, _store) = pipe();
        let err = pipe
            .resume(&RunContext::new(), "missing", ResumeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ExecutionNotFound(id) if id.id == "missing"));
    }

    #[tokio::test]
    async fn test_resume_completed_run_has_nothing_pending() {
        let (pipe, _store) = pipe();
        let ctx = RunContext::new();
        pipe.invoke(&ctx, "run-1", Vec::new()).await.unwrap();
        pipe.resume(&ctx, "run-1", ResumeConfig::default().with("seat", "aisle"))
            .await
            .unwrap();

        let err = pipe
            .resume(&ctx, "run-1", ResumeConfig::default().with("seat", "aisle"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NoPendingInterrupt(_)));
    }

    #[tokio::test]
    async fn test_state_for_unknown_run_is_none() {
        let (pipe, _store) = pipe();
        assert!(pipe.state("nope").await.unwrap().is_none());
    }
}
