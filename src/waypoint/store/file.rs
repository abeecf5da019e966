// SPDX-License-Identifier: MIT

//! JSON-file store: one document per execution under a directory

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{ExecutionId, ExecutionState, Store};
use crate::waypoint::error::StoreError;

/// Persists each execution state as `<dir>/<escaped key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the store, making `dir` if it does not exist
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ExecutionId) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(&id.key())))
    }
}

/// Map a store key onto a portable file name. Anything outside
/// `[A-Za-z0-9-_.]` becomes `~XX` so distinct keys stay distinct.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(byte as char),
            other => out.push_str(&format!("~{:02X}", other)),
        }
    }
    out
}

#[async_trait]
impl<S> Store<S> for FileStore
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, id: &ExecutionId) -> Result<Option<ExecutionState<S>>, StoreError> {
        let content = match fs::read(self.path_for(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    async fn set(&self, id: &ExecutionId, state: &ExecutionState<S>) -> Result<(), StoreError> {
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(state)?;

        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                log::warn!("Could not remove {}: {}", tmp.display(), cleanup);
            }
            return Err(e.into());
        }
        log::debug!("Persisted checkpoint for {} to {}", id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::interrupt::{Interrupt, InterruptId, Requirement, Requirements};
    use crate::waypoint::store::CheckpointState;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Booking {
        name: String,
        seats: u32,
    }

    fn suspended_state() -> ExecutionState<Booking> {
        ExecutionState {
            checkpoint_state: CheckpointState {
                checkpoint_id: "greet".to_string(),
                visited: vec!["greet".to_string()],
                interrupt: Some(Interrupt {
                    reason: "name_not_found".to_string(),
                    message: "Name?".to_string(),
                    validation_error: None,
                    requirements: Requirements::new().with("name", Requirement::custom()),
                    interrupt_id: InterruptId {
                        node_id: "greet".to_string(),
                        id: "1.2".to_string(),
                    },
                }),
                interrupt_history: vec![],
            },
            application_state: Booking {
                name: String::new(),
                seats: 2,
            },
        }
    }

    #[test]
    fn test_escape_key_keeps_keys_distinct() {
        assert_eq!(escape_key("run-1:flow"), "run-1~3Aflow");
        assert_ne!(escape_key("a:b"), escape_key("a_b"));
        assert_eq!(escape_key("../x"), "..~2Fx");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let got: Option<ExecutionState<Booking>> =
            store.get(&ExecutionId::new("nope", "flow")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).await.unwrap();
        let id = ExecutionId::new("thread-123", "book_flights");

        store.set(&id, &suspended_state()).await.unwrap();
        let got: ExecutionState<Booking> = store.get(&id).await.unwrap().unwrap();

        assert_eq!(got, suspended_state());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let id = ExecutionId::new("r", "f");

        let mut state = suspended_state();
        store.set(&id, &state).await.unwrap();

        state.application_state.seats = 5;
        state.checkpoint_state.interrupt = None;
        store.set(&id, &state).await.unwrap();

        let got: ExecutionState<Booking> = store.get(&id).await.unwrap().unwrap();
        assert_eq!(got.application_state.seats, 5);
        assert!(!got.checkpoint_state.is_suspended());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let id = ExecutionId::new("r", "f");

        fs::write(store.path_for(&id), b"not json").await.unwrap();
        let got: Result<Option<ExecutionState<Booking>>, _> = store.get(&id).await;
        assert!(matches!(got, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let id = ExecutionId::new("r", "f");

        // A directory in the record's place makes the rename fail
        let path = store.path_for(&id);
        fs::create_dir(&path).await.unwrap();

        let result = store.set(&id, &suspended_state()).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.is_dir());
    }
}
