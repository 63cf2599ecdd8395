//! Conveyor Core
//!
//! Core types for the Conveyor job-coordination protocol.
//!
//! This crate contains:
//! - Task identity: the logical coordinates of an orchestrator task attempt
//! - Job requests: the immutable value submitted to the remote backend
//! - Result-store vocabulary: the keys and sentinels the remote side writes
//! - Job-name uniquification: collision-resistant, re-derivable identifiers

pub mod job;
pub mod keys;
pub mod name;
pub mod task;

pub use job::{JobRequest, ParamValue, Params};
pub use name::{deuniquify_job_name, uniquify_job_name};
pub use task::TaskContext;
