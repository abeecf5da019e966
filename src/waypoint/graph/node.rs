// SPDX-License-Identifier: MIT

//! Node and decision contracts

use async_trait::async_trait;
use std::future::Future;

use crate::waypoint::context::{NodeContext, RunContext};
use crate::waypoint::error::NodeError;

/// New state, or the reason there is none
pub type NodeResult<S> = Result<S, NodeError>;

/// A unit of work in the graph.
///
/// Nodes hold no per-run data. Everything that changes flows through the
/// state value and the context. A node may be executed more than once for the
/// same logical step (resumption replays it from the top), so it must reach the
/// same decisions given the same state and answers.
#[async_trait]
pub trait Node<S>: Send + Sync {
    async fn execute(&self, ctx: &NodeContext, state: S) -> NodeResult<S>;
}

/// Node backed by an async closure.
///
/// ```ignore
/// let node = FunctionNode::new(|_ctx: NodeContext, mut state: Counter| async move {
///     state.count += 1;
///     Ok(state)
/// });
/// ```
pub struct FunctionNode<F> {
    func: F,
}

impl<F> FunctionNode<F> {
    pub fn new<S, Fut>(func: F) -> Self
    where
        F: Fn(NodeContext, S) -> Fut,
        Fut: Future<Output = NodeResult<S>>,
    {
        Self { func }
    }
}

#[async_trait]
impl<S, F, Fut> Node<S> for FunctionNode<F>
where
    S: Send + 'static,
    F: Fn(NodeContext, S) -> Fut + Send + Sync,
    Fut: Future<Output = NodeResult<S>> + Send + 'static,
{
    async fn execute(&self, ctx: &NodeContext, state: S) -> NodeResult<S> {
        (self.func)(ctx.clone(), state).await
    }
}

/// Node that passes the state through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl<S> Node<S> for Noop
where
    S: Send + 'static,
{
    async fn execute(&self, _ctx: &NodeContext, state: S) -> NodeResult<S> {
        Ok(state)
    }
}

/// Inspects the state and returns a routing label for a conditional edge
#[async_trait]
pub trait Decision<S>: Send + Sync {
    async fn decide(&self, ctx: &RunContext, state: &S) -> String;
}

/// Decision backed by a plain closure
pub struct DecisionFn<F> {
    func: F,
}

impl<F> DecisionFn<F> {
    pub fn new<S>(func: F) -> Self
    where
        F: Fn(&S) -> String,
    {
        Self { func }
    }
}

#[async_trait]
impl<S, F> Decision<S> for DecisionFn<F>
where
    S: Sync + 'static,
    F: Fn(&S) -> String + Send + Sync,
{
    async fn decide(&self, _ctx: &RunContext, state: &S) -> String {
        (self.func)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_function_node_transforms_state() {
        let node = FunctionNode::new(|_ctx: NodeContext, state: u32| async move { Ok(state + 1) });
        let ctx = NodeContext::new("inc", RunContext::new());

        assert_eq!(node.execute(&ctx, 41).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_function_node_sees_its_name() {
        let node = FunctionNode::new(|ctx: NodeContext, _state: String| async move {
            Ok(ctx.node_id().unwrap_or_default().to_string())
        });
        let ctx = NodeContext::new("whoami", RunContext::new());

        assert_eq!(node.execute(&ctx, String::new()).await.unwrap(), "whoami");
    }

    #[tokio::test]
    async fn test_noop_returns_state() {
        let ctx = NodeContext::new("end", RunContext::new());
        let out = Noop.execute(&ctx, vec![1, 2, 3]).await.unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_decision_fn_labels() {
        let decision = DecisionFn::new(|n: &i32| {
            if *n > 0 {
                "positive".to_string()
            } else {
                "other".to_string()
            }
        });
        let ctx = RunContext::new();

        assert_eq!(decision.decide(&ctx, &5).await, "positive");
        assert_eq!(decision.decide(&ctx, &-1).await, "other");
    }
}
