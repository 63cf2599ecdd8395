//! Store seams
//!
//! The shared result store is the synchronization point between this client
//! and the remote backend: the backend writes result records, the poller
//! reads them. This module defines the get/put contract the protocol
//! consumes, the existence contract used by the file-sentinel variant, and
//! an in-memory implementation for tests and embedded hosts.

use async_trait::async_trait;
use conveyor_core::TaskContext;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;

/// Get/put access to the shared key-value result store.
///
/// Entries are keyed by (workflow_id, step_id, run_date, key). An absent key
/// is distinct from a key present with a null value; `get` must preserve
/// that distinction.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, ctx: &TaskContext, key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, ctx: &TaskContext, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Existence probe against an object store, used by the file-sentinel
/// poll variant.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StoreError>;
}

/// Reads a key, folding any store error into "absent".
///
/// This is the protocol's partial-failure policy for non-terminal reads: a
/// flaky store must not be mistaken for "job failed" or crash the poller.
/// The error is logged and the caller sees `None`.
pub async fn try_get(store: &dyn ResultStore, ctx: &TaskContext, key: &str) -> Option<Value> {
    match store.get(ctx, key).await {
        Ok(value) => value,
        Err(e) => {
            warn!("result store read for key '{}' failed, treating as absent: {}", key, e);
            None
        }
    }
}

/// In-memory [`ResultStore`] backed by a `HashMap`.
///
/// Intended for tests and single-process hosts; production deployments plug
/// in the orchestrator's real store.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    entries: RwLock<HashMap<(String, String, String, String), Value>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_key(ctx: &TaskContext, key: &str) -> (String, String, String, String) {
        (
            ctx.workflow_id.clone(),
            ctx.step_id.clone(),
            ctx.run_date.to_rfc3339(),
            key.to_string(),
        )
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(&self, ctx: &TaskContext, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&Self::entry_key(ctx, key)).cloned())
    }

    async fn put(&self, ctx: &TaskContext, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(Self::entry_key(ctx, key), value);
        Ok(())
    }
}
