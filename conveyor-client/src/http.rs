//! HTTP backend client
//!
//! A thin reqwest wrapper over the three backend endpoints the protocol
//! touches: synchronous command calls, asynchronous job submission, and the
//! sentinel-file job scheduler. Connection setup beyond the base URL
//! (timeouts, proxies, TLS) belongs to the `reqwest::Client` the host
//! passes in.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use conveyor_core::{JobRequest, TaskContext};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DispatchError, Result};

/// Auth token identifying the calling orchestrator.
const TOKEN_HEADER: &str = "X-Conveyor-Token";
/// Secret key the backend uses to write the shared result store.
const SECRET_KEY_HEADER: &str = "X-Conveyor-Secret-Key";
const WORKFLOW_ID_HEADER: &str = "X-Conveyor-Workflow-Id";
const STEP_ID_HEADER: &str = "X-Conveyor-Step-Id";
const RUN_DATE_HEADER: &str = "X-Conveyor-Run-Date";
const DB_HOST_HEADER: &str = "X-Conveyor-Db-Host";
const DB_INSTANCE_HEADER: &str = "X-Conveyor-Db-Instance";

const YAML_CONTENT_TYPES: [&str; 5] = [
    "text/yaml",
    "text/x-yaml",
    "text/vnd.yaml",
    "application/yaml",
    "application/x-yaml",
];

/// A synchronous response body, decoded according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncBody {
    Json(Value),
    Yaml(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl SyncBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(value) | Self::Yaml(value) => value.is_null(),
            Self::Text(text) => text.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Representation written to the result store for downstream steps.
    /// Opaque bytes are stored base64-encoded.
    pub fn to_store_value(&self) -> Value {
        match self {
            Self::Json(value) | Self::Yaml(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
        }
    }
}

/// HTTP client for the remote execution backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL of the backend (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attaches auth and task-context headers to a request. The db hints
    /// are forwarded only when configured.
    fn with_headers(
        &self,
        builder: RequestBuilder,
        config: &Config,
        ctx: &TaskContext,
    ) -> RequestBuilder {
        let mut builder = builder
            .header(TOKEN_HEADER, &config.auth_token)
            .header(SECRET_KEY_HEADER, &config.secret_key)
            .header(WORKFLOW_ID_HEADER, &ctx.workflow_id)
            .header(STEP_ID_HEADER, &ctx.step_id)
            .header(RUN_DATE_HEADER, ctx.run_date.to_rfc3339());

        if let Some(host) = &config.db_host {
            builder = builder.header(DB_HOST_HEADER, host);
        }
        if let Some(instance) = &config.db_instance {
            builder = builder.header(DB_INSTANCE_HEADER, instance);
        }

        builder
    }

    // =============================================================================
    // Endpoints
    // =============================================================================

    /// Call a command synchronously and decode the response body.
    ///
    /// Any 4xx/5xx fails immediately; retry is the orchestrator's concern,
    /// not this layer's.
    pub async fn call_sync(
        &self,
        config: &Config,
        ctx: &TaskContext,
        command_name: &str,
        params: &BTreeMap<String, Value>,
    ) -> Result<SyncBody> {
        let url = format!("{}/sync/{}", self.base_url, command_name);
        let response = self
            .with_headers(self.client.post(&url), config, ctx)
            .json(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::RemoteRequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        decode_body(response).await
    }

    /// Submit a job for out-of-band execution.
    ///
    /// Fire-and-forget at the protocol level: a 2xx only acknowledges
    /// receipt. Any transport or HTTP failure here is fatal — a failed
    /// submit is distinguishable from an unknown outcome, so nothing is
    /// retried.
    pub async fn submit_job(
        &self,
        config: &Config,
        ctx: &TaskContext,
        command_name: &str,
        request: &JobRequest,
    ) -> Result<()> {
        let url = format!("{}/async/{}", self.base_url, command_name);
        let response = self
            .with_headers(self.client.post(&url), config, ctx)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DispatchError::SubmissionFailed {
                status: status.as_u16(),
                body,
            });
        }

        info!("backend acknowledged submission: {}", body);
        Ok(())
    }

    /// Schedule a job whose completion is signalled through sentinel files
    /// in an object store.
    pub async fn schedule_job(
        &self,
        config: &Config,
        ctx: &TaskContext,
        params: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let url = format!("{}/schedule_job", self.base_url);
        let response = self
            .with_headers(self.client.post(&url), config, ctx)
            .json(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::SubmissionFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Decodes a 2xx response body according to its declared content type.
///
/// Content types may carry an encoding suffix (`application/json;
/// charset=utf-8`); everything from the first `;` is ignored when matching.
async fn decode_body(response: Response) -> Result<SyncBody> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
        .unwrap_or_default();

    let bytes = response.bytes().await?;
    debug!("decoding {} byte response as '{}'", bytes.len(), content_type);

    // An empty 2xx body is a clean success regardless of declared content
    // type; decoding it as JSON/YAML would reject it.
    if bytes.is_empty() {
        return Ok(SyncBody::Bytes(Vec::new()));
    }

    if content_type == "application/json" {
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| DispatchError::Decode(format!("invalid JSON body: {}", e)))?;
        return Ok(SyncBody::Json(value));
    }

    if content_type == "text/plain" {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| DispatchError::Decode(format!("invalid UTF-8 body: {}", e)))?;
        return Ok(SyncBody::Text(text));
    }

    if YAML_CONTENT_TYPES.contains(&content_type.as_str()) {
        let value = serde_yaml::from_slice(&bytes)
            .map_err(|e| DispatchError::Decode(format!("invalid YAML body: {}", e)))?;
        return Ok(SyncBody::Yaml(value));
    }

    Ok(SyncBody::Bytes(bytes.to_vec()))
}
