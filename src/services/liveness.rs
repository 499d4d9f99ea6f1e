use tracing::debug;

use crate::services::process::ProcessControl;

/// Exit code reported by GetExitCodeProcess while the process is running.
pub const STILL_ACTIVE: u32 = 259;

/// A failed exit-code query counts as dead: the handle is no longer usable.
///
/// GetExitCodeProcess cannot tell a running process from one that exited
/// with code 259, so such a target keeps reading as alive and the loop only
/// ends on an operator stop. Suspend and resume on the exited process fail
/// with a logged NTSTATUS and change nothing.
pub fn is_alive<P: ProcessControl + ?Sized>(process: &P) -> bool {
    match process.exit_code() {
        Some(STILL_ACTIVE) => true,
        Some(code) => {
            debug!(pid = process.pid(), code, "target exited");
            false
        }
        None => {
            debug!(pid = process.pid(), "exit code query failed");
            false
        }
    }
}
