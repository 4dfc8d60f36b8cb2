use crate::util::CONSTANTS;

/// Panic with an internal assertion message when the condition is false.
///
/// Reserved for states the surrounding code makes unreachable; recoverable
/// contract violations return `invariant_violation` errors instead.
pub fn assert(condition: bool, message: impl AsRef<str>) {
    if !condition {
        panic!("{}", assertion_error(message));
    }
}

pub fn assertion_error(message: impl AsRef<str>) -> String {
    format!(
        "{} ({}) INTERNAL ASSERT FAILED: {}",
        CONSTANTS.crate_name,
        CONSTANTS.crate_version,
        message.as_ref()
    )
}
