// SPDX-License-Identifier: MIT

//! Edge resolution: pick the next node for the current state

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::node::Decision;
use crate::waypoint::context::RunContext;

/// Routing rule attached to a node.
///
/// `None` means there is nowhere to go and the run completes.
#[async_trait]
pub trait EdgeResolver<S>: Send + Sync {
    async fn resolve(&self, ctx: &RunContext, state: &S) -> Option<String>;
}

/// Always routes to the same node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstEdge {
    target: String,
}

impl ConstEdge {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl<S> EdgeResolver<S> for ConstEdge
where
    S: Sync + 'static,
{
    async fn resolve(&self, _ctx: &RunContext, _state: &S) -> Option<String> {
        Some(self.target.clone())
    }
}

/// Routes by the label a decision returns.
///
/// A label missing from the redirections ends the run as if the node were
/// terminal. This is deliberate and not reported as an error.
pub struct ConditionalEdge<S> {
    decision: Arc<dyn Decision<S>>,
    redirections: HashMap<String, String>,
}

impl<S> ConditionalEdge<S> {
    pub fn new(decision: Arc<dyn Decision<S>>, redirections: HashMap<String, String>) -> Self {
        Self {
            decision,
            redirections,
        }
    }

    pub fn redirections(&self) -> &HashMap<String, String> {
        &self.redirections
    }
}

#[async_trait]
impl<S> EdgeResolver<S> for ConditionalEdge<S>
where
    S: Send + Sync + 'static,
{
    async fn resolve(&self, ctx: &RunContext, state: &S) -> Option<String> {
        let label = self.decision.decide(ctx, state).await;
        let next = self.redirections.get(&label).cloned();
        if next.is_none() {
            log::debug!("No redirection for label '{}', ending run", label);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::graph::node::DecisionFn;

    fn parity_edge() -> ConditionalEdge<u32> {
        let decision = DecisionFn::new(|n: &u32| {
            if n % 2 == 0 {
                "even".to_string()
            } else {
                "odd".to_string()
            }
        });
        let redirections = HashMap::from([("even".to_string(), "halve".to_string())]);
        ConditionalEdge::new(Arc::new(decision), redirections)
    }

    #[tokio::test]
    async fn test_const_edge_ignores_state() {
        let edge = ConstEdge::new("next");
        let ctx = RunContext::new();

        assert_eq!(
            EdgeResolver::<u32>::resolve(&edge, &ctx, &1).await,
            Some("next".to_string())
        );
        assert_eq!(
            EdgeResolver::<u32>::resolve(&edge, &ctx, &2).await,
            Some("next".to_string())
        );
    }

    #[tokio::test]
    async fn test_conditional_edge_follows_label() {
        let edge = parity_edge();
        assert_eq!(
            edge.resolve(&RunContext::new(), &4).await,
            Some("halve".to_string())
        );
    }

    #[tokio::test]
    async fn test_conditional_edge_unmapped_label_is_none() {
        let edge = parity_edge();
        assert_eq!(edge.resolve(&RunContext::new(), &3).await, None);
    }
}
