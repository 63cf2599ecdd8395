//! Synchronous dispatcher
//!
//! Sends one blocking request and decodes the immediate response. Leaf
//! component: no polling, no retry. A non-empty response body is written to
//! the result store under the default key so downstream steps can consume
//! it.

use conveyor_core::keys::RETURN_VALUE_KEY;
use conveyor_core::{Params, TaskContext};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::http::{BackendClient, SyncBody};
use crate::params;
use crate::store::ResultStore;

/// Dispatcher for commands the backend runs within one HTTP request
pub struct SyncDispatcher {
    config: Config,
    client: BackendClient,
    store: Arc<dyn ResultStore>,
    /// Full command name (e.g. "engine.core.commands.ExportCommand")
    command_name: String,
    params: Params,
}

impl SyncDispatcher {
    pub fn new(
        config: Config,
        client: BackendClient,
        store: Arc<dyn ResultStore>,
        command_name: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            config,
            client,
            store,
            command_name: command_name.into(),
            params,
        }
    }

    /// Executes the command and returns the decoded response body.
    ///
    /// Fails on any 4xx/5xx status without touching the result store;
    /// retrying is the orchestrator's responsibility.
    pub async fn execute(&self, ctx: &TaskContext) -> Result<SyncBody> {
        let resolved = params::resolve(&self.params, self.store.as_ref(), ctx).await;

        debug!("calling sync command '{}'", self.command_name);
        let body = self
            .client
            .call_sync(&self.config, ctx, &self.command_name, &resolved)
            .await?;

        if !body.is_empty() {
            self.store
                .put(ctx, RETURN_VALUE_KEY, body.to_store_value())
                .await?;
            info!("stored sync response for '{}'", self.command_name);
        }

        Ok(body)
    }
}
