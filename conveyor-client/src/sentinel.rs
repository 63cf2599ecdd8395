//! File-sentinel dispatcher
//!
//! Variant of the poll protocol for backends that signal completion by
//! dropping marker objects into an object store instead of writing the
//! result store: `<job_id>/succeeded` or `<job_id>/failed` under a fixed
//! bucket. No adoption here - every invocation resubmits - and no
//! structured exception detail is available on failure.

use conveyor_core::TaskContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::backoff;
use crate::config::Config;
use crate::error::{DispatchError, Result};
use crate::http::BackendClient;
use crate::store::ObjectStore;

/// Dispatcher for jobs observed through succeeded/failed marker objects
pub struct FileSentinelDispatcher {
    config: Config,
    client: BackendClient,
    object_store: Arc<dyn ObjectStore>,
    /// Bucket the backend drops marker objects into
    bucket: String,
    /// Job identity; marker objects live under `<job_id>/`
    job_id: String,
    /// Literal command parameters (this variant resolves no references)
    params: BTreeMap<String, Value>,
}

impl FileSentinelDispatcher {
    pub fn new(
        config: Config,
        client: BackendClient,
        object_store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        job_id: impl Into<String>,
        params: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            config,
            client,
            object_store,
            bucket: bucket.into(),
            job_id: job_id.into(),
            params,
        }
    }

    /// Schedules the job, then polls for a marker object until one appears
    /// or the budget runs out.
    pub async fn execute(&self, ctx: &TaskContext) -> Result<()> {
        self.schedule(ctx).await?;
        self.poll_status_files().await
    }

    async fn schedule(&self, ctx: &TaskContext) -> Result<()> {
        let mut params = self.params.clone();
        params.insert("job_id".to_string(), Value::String(self.job_id.clone()));

        info!("scheduling sentinel job '{}'", self.job_id);
        self.client.schedule_job(&self.config, ctx, &params).await
    }

    /// The existence probe is this variant's terminal read, so object-store
    /// errors propagate instead of folding into "absent".
    async fn poll_status_files(&self) -> Result<()> {
        let success_path = format!("{}/succeeded", self.job_id);
        let failure_path = format!("{}/failed", self.job_id);

        let start = Instant::now();
        let timeout = self.config.poll_timeout;
        let mut attempt = 0u32;

        while start.elapsed() < timeout {
            tokio::time::sleep(backoff::delay(
                attempt,
                self.config.sentinel_backoff_multiplier,
                self.config.poll_backoff_cap,
            ))
            .await;
            attempt += 1;

            debug!("checking marker objects for '{}'", self.job_id);
            if self.object_store.exists(&self.bucket, &success_path).await? {
                info!("found success file {}/{}", self.bucket, success_path);
                return Ok(());
            }
            if self.object_store.exists(&self.bucket, &failure_path).await? {
                return Err(DispatchError::RemoteTaskFailed {
                    message: format!("found failure file {}/{}", self.bucket, failure_path),
                });
            }
        }

        Err(DispatchError::PollTimeout {
            elapsed_secs: start.elapsed().as_secs(),
        })
    }
}
