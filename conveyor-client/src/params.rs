//! Deferred parameter resolution
//!
//! Command parameters may reference values another step left in the result
//! store. References are resolved at submit time against the caller's run;
//! a reference whose value is missing (or whose read fails) drops the
//! parameter from the submission rather than failing it.

use conveyor_core::keys::RETURN_VALUE_KEY;
use conveyor_core::{ParamValue, Params, TaskContext};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::store::{ResultStore, try_get};

/// Resolves a parameter mapping into the literal values sent to the
/// backend.
pub async fn resolve(
    params: &Params,
    store: &dyn ResultStore,
    ctx: &TaskContext,
) -> BTreeMap<String, Value> {
    let mut resolved = BTreeMap::new();

    for (name, value) in params {
        match value {
            ParamValue::Literal(v) => {
                resolved.insert(name.clone(), v.clone());
            }
            ParamValue::FromStep { step_id, key } => {
                let key = key.as_deref().unwrap_or(RETURN_VALUE_KEY);
                match try_get(store, &ctx.sibling(step_id.clone()), key).await {
                    Some(v) => {
                        resolved.insert(name.clone(), v);
                    }
                    None => {
                        warn!(
                            "parameter '{}' references step '{}' key '{}' with no value, omitting",
                            name, step_id, key
                        );
                    }
                }
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryResultStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx() -> TaskContext {
        TaskContext::new(
            "wf",
            "load",
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            1,
        )
    }

    #[tokio::test]
    async fn test_resolves_literals_and_references() {
        let store = MemoryResultStore::new();
        let ctx = ctx();
        store
            .put(&ctx.sibling("extract"), RETURN_VALUE_KEY, json!([1, 2, 3]))
            .await
            .unwrap();

        let params = Params::from([
            ("limit".to_string(), ParamValue::literal(100)),
            ("rows".to_string(), ParamValue::from_step("extract")),
        ]);

        let resolved = resolve(&params, &store, &ctx).await;
        assert_eq!(resolved.get("limit"), Some(&json!(100)));
        assert_eq!(resolved.get("rows"), Some(&json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn test_missing_reference_is_omitted() {
        let store = MemoryResultStore::new();
        let params = Params::from([
            ("rows".to_string(), ParamValue::from_step("never_ran")),
            ("limit".to_string(), ParamValue::literal(10)),
        ]);

        let resolved = resolve(&params, &store, &ctx()).await;
        assert!(!resolved.contains_key("rows"));
        assert_eq!(resolved.len(), 1);
    }
}
