//! Asynchronous dispatcher / poller
//!
//! The core coordination state machine:
//! `NOT_SUBMITTED -> SUBMITTED -> {SUCCEEDED, FAILED, TIMED_OUT}`.
//!
//! A job is submitted to the backend's queue once, then its terminal value
//! is awaited in the shared result store under a wall-clock budget. The
//! dispatcher tolerates being re-invoked after a partial failure: a
//! backend-written pending marker for the current attempt means the
//! submission was already received, so the attempt is adopted instead of
//! resubmitted, and a pre-existing terminal value short-circuits straight
//! to the result phase.

use chrono::Utc;
use conveyor_core::keys::{
    EXCEPTION_CALLSTACK_KEY, EXCEPTION_MESSAGE_KEY, EXCEPTION_SENTINEL, EXCEPTION_TYPE_KEY,
    RETURN_VALUE_KEY, UNKNOWN_PLACEHOLDER, pending_key,
};
use conveyor_core::{JobRequest, Params, TaskContext, uniquify_job_name};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::backoff;
use crate::config::Config;
use crate::error::{DispatchError, Result};
use crate::http::BackendClient;
use crate::params;
use crate::store::{ResultStore, try_get};

/// Remote exception details, fetched best-effort alongside the failure
/// sentinel. Each field is independently optional.
#[derive(Debug, Default)]
struct ExceptionDetails {
    message: Option<String>,
    exc_type: Option<String>,
    callstack: Option<String>,
}

/// Per-invocation poll state. Owned by one `execute()` call and discarded
/// afterwards; both flags flip false to true at most once.
#[derive(Debug, Default)]
struct PollState {
    /// The current attempt was already submitted in a prior invocation.
    pending: bool,
    /// A terminal value was read.
    finished: bool,
    return_value: Option<Value>,
    exception: Option<ExceptionDetails>,
}

/// Dispatcher for commands executed out-of-band on the backend's job queue
pub struct AsyncDispatcher {
    config: Config,
    client: BackendClient,
    store: Arc<dyn ResultStore>,
    /// Full command name; the last `.`-segment is the job's base name
    command_name: String,
    /// Target queue on the backend
    queue_name: String,
    params: Params,
}

impl AsyncDispatcher {
    pub fn new(
        config: Config,
        client: BackendClient,
        store: Arc<dyn ResultStore>,
        command_name: impl Into<String>,
        queue_name: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            config,
            client,
            store,
            command_name: command_name.into(),
            queue_name: queue_name.into(),
            params,
        }
    }

    /// Runs the full submit/poll/result protocol for one task attempt.
    ///
    /// Succeeds with no return value: the payload stays in the result store
    /// for downstream steps.
    pub async fn execute(&self, ctx: &TaskContext) -> Result<()> {
        let mut state = PollState::default();

        self.adopt(ctx, &mut state).await;
        self.schedule(ctx, &state).await?;
        let value = self.poll(ctx, &mut state).await?;
        self.finish(state, value)
    }

    /// Adoption check: reads what a prior invocation of this attempt may
    /// already have caused the backend to write. Store errors here fold to
    /// "absent" so a flaky read cannot fail a resumable attempt.
    async fn adopt(&self, ctx: &TaskContext, state: &mut PollState) {
        let store = self.store.as_ref();

        if try_get(store, ctx, &pending_key(ctx.try_number))
            .await
            .is_some()
        {
            state.pending = true;
        }

        if let Some(value) = try_get(store, ctx, RETURN_VALUE_KEY).await {
            state.finished = true;
            if is_failure_sentinel(&value) {
                state.exception = Some(self.fetch_exception_details(ctx).await);
            }
            state.return_value = Some(value);
        }
    }

    /// Submit phase. Skipped when the attempt was adopted or already
    /// finished; otherwise one fire-and-forget request that must succeed at
    /// the transport layer.
    async fn schedule(&self, ctx: &TaskContext, state: &PollState) -> Result<()> {
        if state.pending || state.finished {
            info!("job is already scheduled - skipping to polling phase");
            return Ok(());
        }

        info!("job was not already scheduled - executing schedule phase");

        let base_name = self
            .command_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.command_name);
        let job_id = uniquify_job_name(
            base_name,
            &ctx.workflow_id,
            &ctx.step_id,
            ctx.run_date,
            Utc::now(),
        );
        info!("job id: {}", job_id);

        let resolved = params::resolve(&self.params, self.store.as_ref(), ctx).await;
        let request = JobRequest {
            params: resolved,
            queue_name: self.queue_name.clone(),
            job_id,
            try_number: ctx.try_number,
        };

        self.client
            .submit_job(&self.config, ctx, &self.command_name, &request)
            .await
    }

    /// Poll phase: waits for a terminal value under the wall-clock budget.
    ///
    /// "Key absent" keeps waiting; "key present with any value including
    /// null" is terminal. Read errors are folded into "absent", so a flaky
    /// store surfaces as a timeout at worst.
    async fn poll(&self, ctx: &TaskContext, state: &mut PollState) -> Result<Value> {
        if state.finished {
            info!("job is already finished - skipping to result phase");
            // finished implies return_value was set during adoption
            return Ok(state.return_value.take().unwrap_or(Value::Null));
        }

        info!("job is not finished - executing poll phase");
        let start = Instant::now();
        let timeout = self.config.poll_timeout;
        let mut attempt = 0u32;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(DispatchError::PollTimeout {
                    elapsed_secs: elapsed.as_secs(),
                });
            }
            debug!(
                "{:.2} seconds remain until timeout",
                (timeout - elapsed).as_secs_f64()
            );

            match try_get(self.store.as_ref(), ctx, RETURN_VALUE_KEY).await {
                None => {
                    debug!("terminal value not found, sleeping");
                    tokio::time::sleep(backoff::delay(attempt, 1, self.config.poll_backoff_cap))
                        .await;
                    attempt += 1;
                }
                Some(value) => {
                    info!("terminal value received");
                    if is_failure_sentinel(&value) {
                        state.exception = Some(self.fetch_exception_details(ctx).await);
                    }
                    return Ok(value);
                }
            }
        }
    }

    /// Result phase: surfaces the failure sentinel as a structured error,
    /// with placeholder text for any detail the backend never wrote.
    fn finish(&self, state: PollState, value: Value) -> Result<()> {
        if is_failure_sentinel(&value) {
            let details = state.exception.unwrap_or_default();
            let message = details
                .message
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
            error!(
                "found remote exception {}: {}",
                details.exc_type.as_deref().unwrap_or(UNKNOWN_PLACEHOLDER),
                message
            );
            if let Some(callstack) = &details.callstack {
                error!("{}", callstack);
            }
            return Err(DispatchError::RemoteTaskFailed { message });
        }

        info!("remote task finished successfully");
        Ok(())
    }

    /// Best-effort fetch of the three exception detail keys. A missing or
    /// unreadable key yields `None`, never a hard failure.
    async fn fetch_exception_details(&self, ctx: &TaskContext) -> ExceptionDetails {
        let store = self.store.as_ref();
        ExceptionDetails {
            message: try_get(store, ctx, EXCEPTION_MESSAGE_KEY)
                .await
                .map(value_to_text),
            exc_type: try_get(store, ctx, EXCEPTION_TYPE_KEY)
                .await
                .map(value_to_text),
            callstack: try_get(store, ctx, EXCEPTION_CALLSTACK_KEY)
                .await
                .map(value_to_text),
        }
    }
}

fn is_failure_sentinel(value: &Value) -> bool {
    value.as_str() == Some(EXCEPTION_SENTINEL)
}

/// Renders a detail value for logging and error messages. String values are
/// used verbatim; anything else falls back to its JSON rendering.
fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryResultStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> TaskContext {
        TaskContext::new(
            "wf",
            "export",
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            1,
        )
    }

    fn dispatcher(server_url: &str, store: Arc<dyn ResultStore>) -> AsyncDispatcher {
        AsyncDispatcher::new(
            Config::new(server_url, "token", "secret"),
            BackendClient::new(server_url),
            store,
            "engine.core.commands.ExportCommand",
            "exports",
            Params::default(),
        )
    }

    /// Store that reveals a terminal value only after a number of reads of
    /// the default key, counting every read along the way.
    struct RevealingStore {
        inner: MemoryResultStore,
        reads: AtomicU32,
        reveal_after: u32,
        reveal_value: Option<Value>,
    }

    impl RevealingStore {
        fn new(reveal_after: u32, reveal_value: Option<Value>) -> Self {
            Self {
                inner: MemoryResultStore::new(),
                reads: AtomicU32::new(0),
                reveal_after,
                reveal_value,
            }
        }
    }

    #[async_trait]
    impl ResultStore for RevealingStore {
        async fn get(
            &self,
            ctx: &TaskContext,
            key: &str,
        ) -> std::result::Result<Option<Value>, StoreError> {
            if key != RETURN_VALUE_KEY {
                return self.inner.get(ctx, key).await;
            }
            let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if reads >= self.reveal_after {
                if let Some(value) = &self.reveal_value {
                    return Ok(Some(value.clone()));
                }
            }
            Ok(None)
        }

        async fn put(
            &self,
            ctx: &TaskContext,
            key: &str,
            value: Value,
        ) -> std::result::Result<(), StoreError> {
            self.inner.put(ctx, key, value).await
        }
    }

    async fn seed_failure(store: &MemoryResultStore, ctx: &TaskContext, with_details: bool) {
        store
            .put(ctx, RETURN_VALUE_KEY, json!(EXCEPTION_SENTINEL))
            .await
            .unwrap();
        if with_details {
            store
                .put(ctx, EXCEPTION_MESSAGE_KEY, json!("division by zero"))
                .await
                .unwrap();
            store
                .put(ctx, EXCEPTION_TYPE_KEY, json!("ZeroDivisionError"))
                .await
                .unwrap();
            store
                .put(ctx, EXCEPTION_CALLSTACK_KEY, json!("Traceback (most recent call last): ..."))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_finished_job_skips_submit_and_poll() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/async/engine.core.commands.ExportCommand")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryResultStore::new());
        store
            .put(&ctx(), RETURN_VALUE_KEY, json!({"rows": 10}))
            .await
            .unwrap();

        dispatcher(&server.url(), store).execute(&ctx()).await.unwrap();
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_pending_marker_skips_submission() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/async/engine.core.commands.ExportCommand")
            .expect(0)
            .create_async()
            .await;

        // Pending marker present, terminal value appears on the second poll
        // read; submission must never happen.
        let store = Arc::new(RevealingStore::new(2, Some(json!("done"))));
        store
            .inner
            .put(&ctx(), &pending_key(1), json!(true))
            .await
            .unwrap();

        dispatcher(&server.url(), store.clone())
            .execute(&ctx())
            .await
            .unwrap();

        submit.assert_async().await;
        assert!(store.reads.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_submits_then_polls_to_success() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/async/engine.core.commands.ExportCommand")
            .match_header("x-conveyor-token", "token")
            .match_header("x-conveyor-workflow-id", "wf")
            .with_status(200)
            .with_body("accepted")
            .expect(1)
            .create_async()
            .await;

        // Adoption read misses, the second poll read finds the value; one
        // 1s backoff sleep in between.
        let store = Arc::new(RevealingStore::new(3, Some(Value::Null)));

        dispatcher(&server.url(), store)
            .execute(&ctx())
            .await
            .unwrap();
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_rejection_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _submit = server
            .mock("POST", "/async/engine.core.commands.ExportCommand")
            .with_status(500)
            .with_body("queue unavailable")
            .create_async()
            .await;

        let err = dispatcher(&server.url(), Arc::new(MemoryResultStore::new()))
            .execute(&ctx())
            .await
            .unwrap_err();

        match err {
            DispatchError::SubmissionFailed { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "queue unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_sentinel_with_details() {
        // Pre-populated terminal value: no HTTP traffic at all.
        let store = Arc::new(MemoryResultStore::new());
        seed_failure(&store, &ctx(), true).await;

        let err = dispatcher("http://127.0.0.1:1", store)
            .execute(&ctx())
            .await
            .unwrap_err();

        match err {
            DispatchError::RemoteTaskFailed { message } => {
                assert_eq!(message, "division by zero");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_sentinel_without_details_uses_placeholder() {
        let store = Arc::new(MemoryResultStore::new());
        seed_failure(&store, &ctx(), false).await;

        let err = dispatcher("http://127.0.0.1:1", store)
            .execute(&ctx())
            .await
            .unwrap_err();

        match err {
            DispatchError::RemoteTaskFailed { message } => {
                assert_eq!(message, UNKNOWN_PLACEHOLDER);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_after_budget() {
        // Pending marker set so no HTTP submission happens; the store never
        // produces a terminal value. Paused time lets the full hour of
        // backoff sleeps elapse instantly.
        let store = Arc::new(RevealingStore::new(u32::MAX, None));
        store
            .inner
            .put(&ctx(), &pending_key(1), json!(true))
            .await
            .unwrap();

        let start = Instant::now();
        let err = dispatcher("http://127.0.0.1:1", store.clone())
            .execute(&ctx())
            .await
            .unwrap_err();

        match err {
            DispatchError::PollTimeout { elapsed_secs } => {
                assert!(elapsed_secs >= 3600);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Backoff 1,2,4,8,16,32 then 60s steps: 65 sleeps pass the hour
        // mark, so the default key is read about 66 times in total.
        let reads = store.reads.load(Ordering::SeqCst);
        assert!((60..=70).contains(&reads), "unexpected read count {reads}");
        assert!(start.elapsed().as_secs() >= 3600);
    }
}
