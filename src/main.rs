use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use suspend_process::services::{
    notify::{LogNotifier, Notification, Notifier},
    runner::{RunOutcome, RunReport},
    settings::{AppSettings, SettingsService, DEFAULT_EXIT_DELAY_MS},
    shutdown::STOP,
};

/// Suspend and resume a running process with a hotkey
#[derive(Parser, Debug)]
#[command(name = "suspend-process", version)]
struct Cli {
    /// Config file to use instead of the default lookup
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Target executable name, overrides ProcessName from the config
    process: Option<String>,
}

fn init_tracing(verbose: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{:#}", e);
    }

    let settings = match SettingsService::new(cli.config).load(cli.process.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            LogNotifier.notify(Notification::ConfigRejected {
                reason: e.to_string(),
            });
            // Leave the console open long enough to read the message
            thread::sleep(Duration::from_millis(DEFAULT_EXIT_DELAY_MS));
            return ExitCode::FAILURE;
        }
    };

    let (code, stopped) = match run_platform(&settings) {
        Ok(report) => {
            info!(pid = ?report.pid, outcome = ?report.outcome, "Exiting...");
            (ExitCode::SUCCESS, report.outcome == RunOutcome::Stopped)
        }
        Err(e) => {
            error!("{:#}", e);
            (ExitCode::FAILURE, false)
        }
    };
    // The console handler is blocked on this before Windows tears us down.
    STOP.mark_finished();

    // Ctrl+C and console close should not linger on the exit delay
    if !stopped {
        thread::sleep(settings.exit_delay);
    }
    code
}

#[cfg(windows)]
fn run_platform(settings: &AppSettings) -> Result<RunReport> {
    use anyhow::Context;
    use suspend_process::services::{
        execution::ExecutionController, input::AsyncKeyInput, process::ToolhelpLocator, runner,
        shutdown::install_console_handler,
    };

    let controller =
        ExecutionController::resolve().context("cannot suspend or resume processes")?;
    let mut locator = ToolhelpLocator::new(controller);

    // Ctrl+C falls back to the default hard exit
    if let Err(e) = install_console_handler() {
        tracing::warn!("{}", e);
    }

    Ok(runner::run(
        &mut locator,
        &mut AsyncKeyInput,
        &mut LogNotifier,
        settings,
        &STOP,
        thread::sleep,
    ))
}

#[cfg(not(windows))]
fn run_platform(_settings: &AppSettings) -> Result<RunReport> {
    Err(suspend_process::services::error::PlatformError::Unsupported.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_config_and_process() {
        let cli = Cli::try_parse_from(["suspend-process", "-c", "my.json", "-v", "game.exe"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("my.json")));
        assert!(cli.verbose);
        assert_eq!(cli.process.as_deref(), Some("game.exe"));
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["suspend-process"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(cli.process.is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn non_windows_reports_unsupported() {
        let settings = AppSettings::from_raw(
            suspend_process::services::settings::RawSettings {
                process_name: Some("a.exe".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let err = run_platform(&settings).unwrap_err();
        assert!(err.to_string().contains("only supported on Windows"));
    }
}
