//! In-memory stand-ins for the OS seams, shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::services::input::{KeyInput, VirtualKey};
use crate::services::liveness::STILL_ACTIVE;
use crate::services::process::{ProcessControl, ProcessLocator, TargetSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Suspend,
    Resume,
}

#[derive(Debug)]
struct Shared {
    exit_code: Option<u32>,
    queries_until_exit: Option<u32>,
    calls: Vec<Call>,
}

/// Clones share state, so a test can keep one and hand the other away.
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pid: u32,
    shared: Rc<RefCell<Shared>>,
}

impl FakeProcess {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            shared: Rc::new(RefCell::new(Shared {
                exit_code: Some(STILL_ACTIVE),
                queries_until_exit: None,
                calls: Vec::new(),
            })),
        }
    }

    pub fn exit_with(&self, code: u32) {
        self.shared.borrow_mut().exit_code = Some(code);
    }

    /// Report alive for `n` more exit-code queries, then exit with 0.
    pub fn exit_after(&self, n: u32) {
        self.shared.borrow_mut().queries_until_exit = Some(n);
    }

    pub fn lose_handle(&self) {
        self.shared.borrow_mut().exit_code = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.borrow().calls.clone()
    }
}

impl ProcessControl for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn exit_code(&self) -> Option<u32> {
        let mut shared = self.shared.borrow_mut();
        match shared.queries_until_exit {
            Some(0) => {
                shared.exit_code = Some(0);
                shared.queries_until_exit = None;
            }
            Some(n) => shared.queries_until_exit = Some(n - 1),
            None => {}
        }
        shared.exit_code
    }

    fn suspend(&mut self) {
        self.shared.borrow_mut().calls.push(Call::Suspend);
    }

    fn resume(&mut self) {
        self.shared.borrow_mut().calls.push(Call::Resume);
    }
}

/// Process listing with scripted appearance and access failures.
#[derive(Debug, Default)]
pub struct FakeLocator {
    listing: Vec<(u32, String)>,
    late_entry: Option<(u64, u32, String)>,
    prepared: Option<FakeProcess>,
    finds: u64,
    denied_opens: u32,
    open_attempts: u32,
}

impl FakeLocator {
    pub fn new(listing: Vec<(u32, &str)>) -> Self {
        Self {
            listing: listing
                .into_iter()
                .map(|(pid, name)| (pid, name.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// The entry shows up in the listing after `misses` failed lookups.
    pub fn appear_after(&mut self, misses: u64, pid: u32, name: &str) {
        self.late_entry = Some((misses, pid, name.to_string()));
    }

    pub fn deny_opens(&mut self, count: u32) {
        self.denied_opens = count;
    }

    /// Hand out (a clone of) this process when its pid is opened.
    pub fn prepare(&mut self, process: FakeProcess) {
        self.prepared = Some(process);
    }

    pub fn open_attempts(&self) -> u32 {
        self.open_attempts
    }
}

impl ProcessLocator for FakeLocator {
    type Process = FakeProcess;

    fn find_process_id(&mut self, target: &TargetSpec) -> Option<u32> {
        self.finds += 1;
        if let Some((misses, pid, ref entry)) = self.late_entry {
            if self.finds > misses {
                self.listing.push((pid, entry.clone()));
                self.late_entry = None;
            }
        }
        self.listing
            .iter()
            .find(|(_, exe)| target.matches(exe))
            .map(|(pid, _)| *pid)
    }

    fn open_process(&mut self, pid: u32) -> Option<FakeProcess> {
        self.open_attempts += 1;
        if self.denied_opens > 0 {
            self.denied_opens -= 1;
            return None;
        }
        match &self.prepared {
            Some(process) if process.pid == pid => Some(process.clone()),
            _ => Some(FakeProcess::new(pid)),
        }
    }
}

/// Key levels per poll; the last value repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedKeys {
    script: Vec<bool>,
    polls: usize,
    polled_keys: Vec<VirtualKey>,
}

impl ScriptedKeys {
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script,
            polls: 0,
            polled_keys: Vec::new(),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn polled_keys(&self) -> &[VirtualKey] {
        &self.polled_keys
    }
}

impl KeyInput for ScriptedKeys {
    fn is_down(&mut self, key: VirtualKey) -> bool {
        let down = self
            .script
            .get(self.polls)
            .or(self.script.last())
            .copied()
            .unwrap_or(false);
        self.polls += 1;
        self.polled_keys.push(key);
        down
    }
}
