//! Stable exit codes for provisioner CLI commands.

use crate::io::process::CommandFailed;

/// Every step succeeded.
pub const OK: i32 = 0;
/// A step failed for a reason other than an external command's exit status.
pub const FAILURE: i32 = 1;

/// Exit code for a failed run.
///
/// When the failure came from an external command, its own exit status is
/// propagated so the image build sees what the tool reported.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CommandFailed>())
        .and_then(|failed| failed.code)
        .filter(|code| (1..=255).contains(code))
        .unwrap_or(FAILURE)
}
