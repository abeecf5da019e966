// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ExecutionId, ExecutionState, Store};
use crate::waypoint::error::StoreError;

/// Keeps execution states in a shared map. Clones share the same map.
pub struct InMemoryStore<S> {
    states: Arc<RwLock<HashMap<String, ExecutionState<S>>>>,
}

impl<S> Clone for InMemoryStore<S> {
    fn clone(&self) -> Self {
        Self {
            states: Arc::clone(&self.states),
        }
    }
}

impl<S> InMemoryStore<S> {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

impl<S> Default for InMemoryStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> Store<S> for InMemoryStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &ExecutionId) -> Result<Option<ExecutionState<S>>, StoreError> {
        let states = self.states.read().await;
        Ok(states.get(&id.key()).cloned())
    }

    async fn set(&self, id: &ExecutionId, state: &ExecutionState<S>) -> Result<(), StoreError> {
        let mut states = self.states.write().await;
        states.insert(id.key(), state.clone());
        Ok(())
    }
}
