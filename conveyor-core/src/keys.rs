//! Result-store key vocabulary
//!
//! The remote backend and this client share an otherwise free-form value
//! channel; these constants are the reserved keys and in-band sentinels that
//! give it structure.

/// Default key under which a task's return value is stored.
pub const RETURN_VALUE_KEY: &str = "return_value";

/// In-band sentinel written under [`RETURN_VALUE_KEY`] when the remote task
/// raised instead of returning.
pub const EXCEPTION_SENTINEL: &str = "__EXCEPTION__";

/// Human-readable message of the remote exception.
pub const EXCEPTION_MESSAGE_KEY: &str = "__EXCEPTION_MESSAGE";

/// Type name of the remote exception.
pub const EXCEPTION_TYPE_KEY: &str = "__EXCEPTION_TYPE";

/// Remote stack trace, when the backend captured one.
pub const EXCEPTION_CALLSTACK_KEY: &str = "__EXCEPTION_CALLSTACK";

/// Placeholder rendered for exception detail fields the backend never wrote.
pub const UNKNOWN_PLACEHOLDER: &str = "<UNKNOWN>";

/// Key of the per-attempt marker the backend writes once it has received a
/// submission, independent of completion.
pub fn pending_key(try_number: u32) -> String {
    format!("is_pending_{}", try_number)
}
