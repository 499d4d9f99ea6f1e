use tracing::{debug, info};

use crate::services::input::{EdgeDetector, KeyInput, VirtualKey};
use crate::services::liveness;
use crate::services::notify::{Notification, Notifier};
use crate::services::process::ProcessControl;

/// How the toggle key drives the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each press flips suspended <-> running.
    Latch,
    /// Suspended exactly while the key is held down.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionState {
    Running,
    Suspended,
}

/// Whether the control loop should keep ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Terminated,
}

/// Owns the acquired process and decides, once per tick, whether to
/// suspend, resume or leave it alone.
///
/// Suspend and resume are only ever issued through `transition_to_suspended`
/// and `transition_to_running`, which keep `state` in lock-step with the
/// calls made on the process, so the two strictly alternate.
#[derive(Debug)]
pub struct StateMachine<P: ProcessControl> {
    process: P,
    mode: Mode,
    key: VirtualKey,
    auto_suspend: bool,
    state: SuspensionState,
    /// Hold mode: stay suspended until the first physical press.
    armed: bool,
    edges: EdgeDetector,
    terminated: bool,
}

impl<P: ProcessControl> StateMachine<P> {
    pub fn new(process: P, mode: Mode, key: VirtualKey, auto_suspend: bool) -> Self {
        Self {
            process,
            mode,
            key,
            auto_suspend,
            state: SuspensionState::Running,
            armed: false,
            edges: EdgeDetector::new(),
            terminated: false,
        }
    }

    pub fn state(&self) -> SuspensionState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Apply the auto-suspend policy. Call once, right after acquisition.
    pub fn start<N: Notifier + ?Sized>(&mut self, notifier: &mut N) -> Step {
        if self.check_terminated(notifier) {
            return Step::Terminated;
        }

        if self.auto_suspend {
            match self.mode {
                Mode::Latch => {
                    self.transition_to_suspended(notifier);
                    // Counts as the first press: a key already held at
                    // acquisition must not toggle straight back.
                    self.edges.update(true);
                }
                Mode::Hold => {
                    debug!("auto-suspend armed until first press");
                    self.armed = true;
                }
            }
        }
        Step::Continue
    }

    /// One control-loop iteration: liveness, then input, then transition.
    pub fn tick<K, N>(&mut self, input: &mut K, notifier: &mut N) -> Step
    where
        K: KeyInput + ?Sized,
        N: Notifier + ?Sized,
    {
        if self.check_terminated(notifier) {
            return Step::Terminated;
        }

        let down = input.is_down(self.key);
        let edge = self.edges.update(down);

        match self.mode {
            Mode::Hold => {
                if self.armed && down {
                    debug!("first press, leaving auto-suspend");
                    self.armed = false;
                }
                let hold = down || self.armed;
                match (self.state, hold) {
                    (SuspensionState::Running, true) => self.transition_to_suspended(notifier),
                    (SuspensionState::Suspended, false) => self.transition_to_running(notifier),
                    _ => {}
                }
            }
            Mode::Latch => {
                if edge.is_press() {
                    match self.state {
                        SuspensionState::Suspended => self.transition_to_running(notifier),
                        SuspensionState::Running => self.transition_to_suspended(notifier),
                    }
                }
            }
        }
        Step::Continue
    }

    /// Terminated is sticky and reported once.
    fn check_terminated<N: Notifier + ?Sized>(&mut self, notifier: &mut N) -> bool {
        if self.terminated {
            return true;
        }
        if liveness::is_alive(&self.process) {
            return false;
        }
        self.terminated = true;
        notifier.notify(Notification::Terminated);
        true
    }

    fn transition_to_suspended<N: Notifier + ?Sized>(&mut self, notifier: &mut N) {
        if self.state == SuspensionState::Suspended {
            return;
        }
        self.process.suspend();
        self.state = SuspensionState::Suspended;
        notifier.notify(Notification::Suspended);
    }

    fn transition_to_running<N: Notifier + ?Sized>(&mut self, notifier: &mut N) {
        if self.state == SuspensionState::Running {
            return;
        }
        self.process.resume();
        self.state = SuspensionState::Running;
        notifier.notify(Notification::Resumed);
    }
}

impl<P: ProcessControl> Drop for StateMachine<P> {
    fn drop(&mut self) {
        // Never leave a live target frozen behind us.
        if !self.terminated && self.state == SuspensionState::Suspended {
            info!(pid = self.process.pid(), "resuming target before exit");
            self.process.resume();
            self.state = SuspensionState::Running;
        }
    }
}
