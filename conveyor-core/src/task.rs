//! Task identity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical identity of the orchestrator task attempt driving a coordination
/// call.
///
/// The (workflow_id, step_id, run_date) triple keys all result-store reads
/// and writes for the task; `try_number` only participates through key names
/// (the per-attempt pending marker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub workflow_id: String,
    pub step_id: String,
    /// Logical run timestamp of the workflow run (not the wall-clock time
    /// the attempt started).
    pub run_date: DateTime<Utc>,
    /// Attempt number assigned by the orchestrator, starting at 1.
    pub try_number: u32,
}

impl TaskContext {
    pub fn new(
        workflow_id: impl Into<String>,
        step_id: impl Into<String>,
        run_date: DateTime<Utc>,
        try_number: u32,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            step_id: step_id.into(),
            run_date,
            try_number,
        }
    }

    /// Identity of a sibling step in the same workflow run.
    ///
    /// Used when resolving deferred parameter references: the referenced
    /// value lives under another step's identity for the same run.
    pub fn sibling(&self, step_id: impl Into<String>) -> Self {
        Self {
            workflow_id: self.workflow_id.clone(),
            step_id: step_id.into(),
            run_date: self.run_date,
            try_number: 0,
        }
    }
}
