//! Job request types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parameter mapping of a command invocation, in declaration form.
///
/// Values may be literals or deferred references into the result store;
/// references are resolved at submit time, not at construction.
pub type Params = BTreeMap<String, ParamValue>;

/// A single command parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A value read from another step's result-store entry at submit time.
    /// A missing referenced value omits the parameter from the submission.
    ///
    /// Listed before `Literal` so untagged deserialization tries the
    /// reference shape first; `Literal` accepts any JSON value.
    FromStep {
        step_id: String,
        /// Store key to read; `None` means the default return-value key.
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    /// A value sent as-is.
    Literal(Value),
}

impl ParamValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn from_step(step_id: impl Into<String>) -> Self {
        Self::FromStep {
            step_id: step_id.into(),
            key: None,
        }
    }
}

/// The immutable value submitted to the remote backend for out-of-band
/// execution. Built once per submission attempt, never mutated afterwards.
///
/// Serializes as the async submit body:
/// `{ "params": {...}, "queue_name": "...", "job_id": "...", "try_number": n }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Fully resolved parameter mapping (no deferred references remain).
    pub params: BTreeMap<String, Value>,
    /// Target queue on the remote backend.
    pub queue_name: String,
    /// Uniquified job identity, see [`crate::name::uniquify_job_name`].
    pub job_id: String,
    /// Attempt number of the submitting task.
    pub try_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_request_wire_shape() {
        let req = JobRequest {
            params: BTreeMap::from([("limit".to_string(), json!(100))]),
            queue_name: "exports".to_string(),
            job_id: "export-0123456789abcdef".to_string(),
            try_number: 2,
        };

        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(
            wire,
            json!({
                "params": {"limit": 100},
                "queue_name": "exports",
                "job_id": "export-0123456789abcdef",
                "try_number": 2,
            })
        );
    }

    #[test]
    fn test_param_value_literal_serializes_untagged() {
        let p = ParamValue::literal("plain");
        assert_eq!(serde_json::to_value(&p).unwrap(), json!("plain"));
    }
}
