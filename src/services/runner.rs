use std::time::Duration;
use tracing::{debug, info};

use crate::services::input::KeyInput;
use crate::services::machine::{StateMachine, Step};
use crate::services::notify::{Notification, Notifier};
use crate::services::process::{acquire, ProcessControl, ProcessLocator, TargetSpec};
use crate::services::settings::AppSettings;
use crate::services::shutdown::StopSignal;

/// Why the control loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    TargetExited,
    /// The operator asked us to stop; a suspended target was resumed.
    Stopped,
}

/// What a finished run looked like. `pid` is `None` if the run was stopped
/// before the target was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub pid: Option<u32>,
    pub ticks: u64,
    pub outcome: RunOutcome,
}

/// Whole run on a single thread: wait for the target, then tick until it
/// exits or `stop` is raised. `sleep` is the only place the loop blocks.
pub fn run<L, K, N>(
    locator: &mut L,
    input: &mut K,
    notifier: &mut N,
    settings: &AppSettings,
    stop: &StopSignal,
    mut sleep: impl FnMut(Duration),
) -> RunReport
where
    L: ProcessLocator,
    K: KeyInput + ?Sized,
    N: Notifier + ?Sized,
{
    let target = TargetSpec::new(settings.process_name.as_str());
    let Some(process) = acquire(locator, &target, settings.get_process_delay, stop, &mut sleep)
    else {
        return RunReport {
            pid: None,
            ticks: 0,
            outcome: RunOutcome::Stopped,
        };
    };
    let pid = process.pid();

    notifier.notify(Notification::Acquired {
        name: target.name().to_string(),
        pid,
    });
    debug!(
        mode = ?settings.mode,
        key = %settings.toggle_key,
        auto_suspend = settings.auto_suspend,
        "starting control loop"
    );

    let mut machine = StateMachine::new(
        process,
        settings.mode,
        settings.toggle_key,
        settings.auto_suspend,
    );

    let mut ticks: u64 = 0;
    let mut outcome = RunOutcome::TargetExited;
    if machine.start(notifier) == Step::Continue {
        loop {
            if stop.is_requested() {
                info!(pid, "stop requested, releasing target");
                outcome = RunOutcome::Stopped;
                break;
            }
            ticks += 1;
            if machine.tick(input, notifier) == Step::Terminated {
                break;
            }
            sleep(settings.tick_interval);
        }
    }
    // Resumes the target if it is still alive and suspended
    drop(machine);

    info!(pid, ticks, ?outcome, "control loop finished");
    RunReport {
        pid: Some(pid),
        ticks,
        outcome,
    }
}
