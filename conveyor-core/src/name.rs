//! Job-name uniquification
//!
//! A submission and its result are correlated under a durable job identity:
//! the job's base name plus a truncated digest over the task's logical
//! coordinates and the wall-clock submission time. The identity is
//! reproducible given the same inputs, and the digest can be stripped back
//! off to recover the base name.

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha512};
use std::sync::LazyLock;

/// Trailing `-<16 hex>` with an optional legacy second `-<12..16 hex>`
/// segment (older identities carried two digest segments). The base-name
/// capture is lazy so a legacy name sheds both segments, not just the last.
static UNIQUE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)-[0-9a-f]{16}(-[0-9a-f]{12,16})?$").unwrap()
});

/// Derives a collision-resistant job identity for one submission attempt.
///
/// The digest covers the logical run timestamp, the workflow and step ids,
/// and the wall-clock submission timestamp, so a new attempt (new
/// `submitted_at`) yields a new identity. `submitted_at` is injectable for
/// reproducibility; production callers pass `Utc::now()`.
pub fn uniquify_job_name(
    base_name: &str,
    workflow_id: &str,
    step_id: &str,
    run_date: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
) -> String {
    let material = [
        run_date.to_rfc3339(),
        workflow_id.to_string(),
        step_id.to_string(),
        submitted_at.to_rfc3339(),
    ]
    .join(" ");

    let digest = hex::encode(Sha512::digest(material.as_bytes()));
    format!("{}-{}", base_name, &digest[..16])
}

/// Strips the unique suffix from a job identity, recovering the base name.
///
/// Identities that do not carry a recognizable suffix are returned
/// unchanged.
pub fn deuniquify_job_name(unique_name: &str) -> String {
    match UNIQUE_SUFFIX.captures(unique_name) {
        Some(caps) => caps[1].to_string(),
        None => unique_name.to_string(),
    }
}
