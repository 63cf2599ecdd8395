//! Conveyor HTTP Client
//!
//! Client-side coordination protocol for long-running remote jobs.
//!
//! An orchestrator task cannot block a worker thread for hours, so a job is
//! handed to a queue-backed compute backend and its completion is observed
//! through the shared result store the orchestrator already uses to pass
//! data between steps. This crate implements the client half of that
//! protocol:
//!
//! - [`SyncDispatcher`]: one blocking request, body decoded by content type
//! - [`AsyncDispatcher`]: submit once (tolerating orchestrator retries), then
//!   poll the result store with bounded backoff under a wall-clock budget
//! - [`FileSentinelDispatcher`]: poll an object store for succeeded/failed
//!   marker objects instead of a result-store value
//!
//! # Example
//!
//! ```no_run
//! use conveyor_client::{AsyncDispatcher, BackendClient, Config, MemoryResultStore};
//! use conveyor_core::TaskContext;
//! use std::sync::Arc;
//!
//! # async fn example(ctx: TaskContext) -> conveyor_client::Result<()> {
//! let config = Config::new("http://localhost:8080", "token", "secret");
//! let client = BackendClient::new(&config.backend_url);
//! let store = Arc::new(MemoryResultStore::new());
//!
//! let dispatcher = AsyncDispatcher::new(
//!     config,
//!     client,
//!     store,
//!     "engine.core.commands.ExportCommand",
//!     "exports",
//!     Default::default(),
//! );
//! dispatcher.execute(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod params;
pub mod sentinel;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dispatch::AsyncDispatcher;
pub use error::{DispatchError, Result, StoreError};
pub use http::{BackendClient, SyncBody};
pub use sentinel::FileSentinelDispatcher;
pub use store::{MemoryResultStore, ObjectStore, ResultStore};
pub use sync::SyncDispatcher;
