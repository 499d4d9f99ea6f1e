//! Operator-initiated stop (Ctrl+C, Ctrl+Break, console close).
//!
//! The console handler runs on its own thread. It only raises `requested`;
//! the control loop notices it on the next tick, unwinds normally (which
//! resumes a suspended target) and then raises `finished`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How long the console handler waits for the loop to clean up. Windows
/// kills the process about 5 s after a close event, whatever we do.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(4);

#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    finished: AtomicBool,
}

impl StopSignal {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Returns false if `timeout` elapsed before `mark_finished`.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.finished.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

/// Process-wide signal the console handler writes to.
pub static STOP: StopSignal = StopSignal::new();

#[cfg(windows)]
pub use self::win::install_console_handler;

#[cfg(windows)]
mod win {
    use windows::Win32::Foundation::{BOOL, TRUE};
    use windows::Win32::System::Console::SetConsoleCtrlHandler;

    use super::{CLEANUP_GRACE, STOP};
    use crate::services::error::PlatformError;

    unsafe extern "system" fn console_handler(_ctrl_type: u32) -> BOOL {
        STOP.request();
        // Close/logoff/shutdown terminate us as soon as this returns
        STOP.wait_finished(CLEANUP_GRACE);
        TRUE
    }

    pub fn install_console_handler() -> Result<(), PlatformError> {
        unsafe { SetConsoleCtrlHandler(Some(console_handler), true) }
            .map_err(|e| PlatformError::ConsoleHandler(e.to_string()))
    }
}
