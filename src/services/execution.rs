//! ExecutionController - suspends and resumes every thread of a process
//! through the undocumented ntdll entry points.

pub const NTDLL: &str = "ntdll.dll";
pub const SUSPEND_SYMBOL: &str = "NtSuspendProcess";
pub const RESUME_SYMBOL: &str = "NtResumeProcess";

/// NT_SUCCESS: informational and success codes are non-negative.
#[inline]
pub fn nt_success(status: i32) -> bool {
    status >= 0
}

#[cfg(windows)]
pub use self::win::ExecutionController;

#[cfg(windows)]
mod win {
    use std::fmt;
    use tracing::{debug, warn};
    use windows::core::{s, w};
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

    use super::{nt_success, NTDLL, RESUME_SYMBOL, SUSPEND_SYMBOL};
    use crate::services::error::PlatformError;

    type NtProcessFn = unsafe extern "system" fn(HANDLE) -> i32;
    type RawProc = unsafe extern "system" fn() -> isize;

    /// Entry points are resolved once in `resolve()` and copied into every
    /// process handle that needs them.
    #[derive(Clone, Copy)]
    pub struct ExecutionController {
        suspend: NtProcessFn,
        resume: NtProcessFn,
    }

    impl fmt::Debug for ExecutionController {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ExecutionController").finish_non_exhaustive()
        }
    }

    impl ExecutionController {
        pub fn resolve() -> Result<Self, PlatformError> {
            let unavailable = |symbol: &'static str| PlatformError::PrimitiveUnavailable {
                module: NTDLL,
                symbol,
            };

            // ntdll is mapped into every process, no LoadLibrary needed
            let module = unsafe { GetModuleHandleW(w!("ntdll.dll")) }
                .map_err(|_| PlatformError::ModuleUnavailable(NTDLL))?;

            let suspend = unsafe { GetProcAddress(module, s!("NtSuspendProcess")) }
                .ok_or_else(|| unavailable(SUSPEND_SYMBOL))?;
            let resume = unsafe { GetProcAddress(module, s!("NtResumeProcess")) }
                .ok_or_else(|| unavailable(RESUME_SYMBOL))?;

            debug!("resolved {} and {} from {}", SUSPEND_SYMBOL, RESUME_SYMBOL, NTDLL);

            // SAFETY: both exports take a single process HANDLE and return NTSTATUS.
            unsafe {
                Ok(Self {
                    suspend: std::mem::transmute::<RawProc, NtProcessFn>(suspend),
                    resume: std::mem::transmute::<RawProc, NtProcessFn>(resume),
                })
            }
        }

        /// Caller guarantees the process is not already suspended by us.
        #[inline]
        pub fn suspend(&self, handle: HANDLE) {
            let status = unsafe { (self.suspend)(handle) };
            if !nt_success(status) {
                warn!("{} failed with NTSTATUS 0x{:08X}", SUSPEND_SYMBOL, status as u32);
            }
        }

        /// Caller guarantees the process is currently suspended by us.
        #[inline]
        pub fn resume(&self, handle: HANDLE) {
            let status = unsafe { (self.resume)(handle) };
            if !nt_success(status) {
                warn!("{} failed with NTSTATUS 0x{:08X}", RESUME_SYMBOL, status as u32);
            }
        }
    }
}
