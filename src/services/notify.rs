use std::fmt;
use tracing::{event, Level};

/// State changes reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Acquired { name: String, pid: u32 },
    Suspended,
    Resumed,
    Terminated,
    ConfigRejected { reason: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Acquired { name, pid } => {
                write!(f, "Connected to the process {} (pid {})", name, pid)
            }
            Notification::Suspended => f.write_str("Process is suspended"),
            Notification::Resumed => f.write_str("Process is resumed"),
            Notification::Terminated => f.write_str("The process has been closed, exiting"),
            Notification::ConfigRejected { reason } => {
                write!(f, "Failed to parse the config file: {}", reason)
            }
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Emits every notification as a tracing event.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn level(notification: &Notification) -> Level {
        match notification {
            Notification::ConfigRejected { .. } => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: Notification) {
        // `event!` needs a constant level
        if Self::level(&notification) == Level::ERROR {
            event!(Level::ERROR, "{}", notification);
        } else {
            event!(Level::INFO, "{}", notification);
        }
    }
}

/// Keeps everything it is told; used by tests to assert on the sequence.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub seen: Vec<Notification>,
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.seen.push(notification);
    }
}
