use std::time::Duration;
use tracing::{debug, info, trace};

use crate::services::shutdown::StopSignal;

/// The one process a run manages, chosen by executable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    name: String,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn matches(&self, exe_name: &str) -> bool {
        names_match(&self.name, exe_name)
    }
}

/// Case-insensitive exact comparison of executable names.
#[inline]
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || (!a.is_ascii() && a.to_lowercase() == b.to_lowercase())
}

/// Extract the executable name from a NUL-terminated UTF-16 buffer such as
/// PROCESSENTRY32W::szExeFile.
#[inline]
pub fn exe_name_from_wide(sz_exe_file: &[u16]) -> String {
    let len = sz_exe_file
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(sz_exe_file.len());
    String::from_utf16_lossy(&sz_exe_file[..len])
}

/// An opened process with suspend/resume and exit-code query rights.
/// Dropping it releases the OS handle.
pub trait ProcessControl {
    fn pid(&self) -> u32;

    /// `None` if the exit code could not be queried.
    fn exit_code(&self) -> Option<u32>;

    /// Must not be called while already suspended.
    fn suspend(&mut self);

    /// Must not be called while running.
    fn resume(&mut self);
}

pub trait ProcessLocator {
    type Process: ProcessControl;

    /// First process in enumeration order whose executable name matches.
    fn find_process_id(&mut self, target: &TargetSpec) -> Option<u32>;

    /// Fails when access is denied or the process is already gone.
    fn open_process(&mut self, pid: u32) -> Option<Self::Process>;
}

/// Block until the target can be found and opened, sleeping `delay`
/// between attempts. There is no timeout; `None` only when `stop` is raised.
pub fn acquire<L: ProcessLocator>(
    locator: &mut L,
    target: &TargetSpec,
    delay: Duration,
    stop: &StopSignal,
    mut sleep: impl FnMut(Duration),
) -> Option<L::Process> {
    info!("Trying to get process called {}", target.name());

    let mut attempts: u64 = 0;
    while !stop.is_requested() {
        attempts += 1;

        match locator.find_process_id(target) {
            Some(pid) => match locator.open_process(pid) {
                Some(process) => {
                    debug!(pid, attempts, "opened target process");
                    return Some(process);
                }
                None => trace!(pid, "found target but could not open it"),
            },
            None => trace!("target not running"),
        }

        if attempts == 1 {
            info!("Waiting for {} to start...", target.name());
        }
        sleep(delay);
    }

    info!("Stopped while waiting for {}", target.name());
    None
}

#[cfg(windows)]
pub use self::win::{ToolhelpLocator, WindowsProcess};

#[cfg(windows)]
mod win {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SUSPEND_RESUME,
    };

    use super::{exe_name_from_wide, ProcessControl, ProcessLocator, TargetSpec};
    use crate::services::execution::ExecutionController;

    /// Finds processes through a ToolHelp snapshot.
    #[derive(Debug)]
    pub struct ToolhelpLocator {
        controller: ExecutionController,
    }

    impl ToolhelpLocator {
        pub fn new(controller: ExecutionController) -> Self {
            Self { controller }
        }
    }

    impl ProcessLocator for ToolhelpLocator {
        type Process = WindowsProcess;

        fn find_process_id(&mut self, target: &TargetSpec) -> Option<u32> {
            unsafe {
                let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
                    return None;
                };
                if snapshot.is_invalid() {
                    return None;
                }

                let mut entry = PROCESSENTRY32W {
                    dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                    ..Default::default()
                };

                let mut found = None;
                if Process32FirstW(snapshot, &mut entry).is_ok() {
                    loop {
                        if target.matches(&exe_name_from_wide(&entry.szExeFile)) {
                            found = Some(entry.th32ProcessID);
                            break;
                        }
                        if Process32NextW(snapshot, &mut entry).is_err() {
                            break;
                        }
                    }
                }

                let _ = CloseHandle(snapshot);
                found
            }
        }

        fn open_process(&mut self, pid: u32) -> Option<WindowsProcess> {
            let handle = unsafe {
                OpenProcess(
                    PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SUSPEND_RESUME,
                    false,
                    pid,
                )
            }
            .ok()?;

            Some(WindowsProcess {
                handle,
                pid,
                controller: self.controller,
            })
        }
    }

    /// Owned process handle. Never duplicated, closed on drop.
    #[derive(Debug)]
    pub struct WindowsProcess {
        handle: HANDLE,
        pid: u32,
        controller: ExecutionController,
    }

    impl ProcessControl for WindowsProcess {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn exit_code(&self) -> Option<u32> {
            let mut code = 0u32;
            unsafe { GetExitCodeProcess(self.handle, &mut code) }
                .ok()
                .map(|_| code)
        }

        fn suspend(&mut self) {
            self.controller.suspend(self.handle);
        }

        fn resume(&mut self) {
            self.controller.resume(self.handle);
        }
    }

    impl Drop for WindowsProcess {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeLocator;

    #[test]
    fn names_compare_case_insensitively() {
        assert!(names_match("notepad.exe", "NOTEPAD.EXE"));
        assert!(names_match("Notepad.exe", "notepad.exe"));
        assert!(!names_match("notepad.exe", "notepad"));
        assert!(!names_match("notepad.exe", "notepad.exe.bak"));
        assert!(names_match("Ärger.exe", "ärger.EXE"));
    }

    #[test]
    fn target_spec_matches_exe_names() {
        let target = TargetSpec::new("Game.exe");
        assert!(target.matches("game.EXE"));
        assert!(!target.matches("game2.exe"));
    }

    #[test]
    fn wide_name_stops_at_nul() {
        let mut buf = [0u16; 260];
        for (slot, unit) in buf.iter_mut().zip("calc.exe".encode_utf16()) {
            *slot = unit;
        }
        buf[9] = 'x' as u16; // garbage after the terminator
        assert_eq!(exe_name_from_wide(&buf), "calc.exe");
    }

    #[test]
    fn wide_name_without_terminator_uses_whole_buffer() {
        let buf: Vec<u16> = "abc".encode_utf16().collect();
        assert_eq!(exe_name_from_wide(&buf), "abc");
    }

    #[test]
    fn first_match_in_enumeration_order_wins() {
        let mut locator = FakeLocator::new(vec![
            (10, "svchost.exe"),
            (20, "NOTEPAD.EXE"),
            (30, "notepad.exe"),
        ]);
        assert_eq!(locator.find_process_id(&TargetSpec::new("notepad.exe")), Some(20));
        assert_eq!(locator.find_process_id(&TargetSpec::new("missing.exe")), None);
    }

    #[test]
    fn acquire_retries_until_target_appears() {
        let mut locator = FakeLocator::new(vec![(5, "other.exe")]);
        locator.appear_after(3, 42, "target.exe");

        let mut sleeps = Vec::new();
        let process = acquire(
            &mut locator,
            &TargetSpec::new("TARGET.exe"),
            Duration::from_millis(50),
            &StopSignal::new(),
            |d| sleeps.push(d),
        )
        .unwrap();

        assert_eq!(process.pid(), 42);
        assert_eq!(sleeps, vec![Duration::from_millis(50); 3]);
    }

    #[test]
    fn acquire_retries_when_open_is_denied() {
        let mut locator = FakeLocator::new(vec![(42, "target.exe")]);
        locator.deny_opens(2);

        let mut sleeps = 0;
        let process = acquire(
            &mut locator,
            &TargetSpec::new("target.exe"),
            Duration::from_millis(5),
            &StopSignal::new(),
            |_| sleeps += 1,
        )
        .unwrap();

        assert_eq!(process.pid(), 42);
        assert_eq!(sleeps, 2);
        assert_eq!(locator.open_attempts(), 3);
    }

    #[test]
    fn acquire_without_wait_when_already_running() {
        let mut locator = FakeLocator::new(vec![(1, "target.exe")]);
        let mut slept = false;
        let process = acquire(
            &mut locator,
            &TargetSpec::new("target.exe"),
            Duration::from_millis(50),
            &StopSignal::new(),
            |_| slept = true,
        );
        assert!(process.is_some());
        assert!(!slept);
    }

    #[test]
    fn acquire_gives_up_when_stopped() {
        let mut locator = FakeLocator::new(vec![(1, "other.exe")]);
        let stop = StopSignal::new();
        let mut attempts = 0;

        let process = acquire(
            &mut locator,
            &TargetSpec::new("target.exe"),
            Duration::from_millis(50),
            &stop,
            |_| {
                attempts += 1;
                if attempts == 3 {
                    stop.request();
                }
            },
        );

        assert!(process.is_none());
        assert_eq!(attempts, 3);
        assert_eq!(locator.open_attempts(), 0);
    }
}
