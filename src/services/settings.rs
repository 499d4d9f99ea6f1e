use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::services::error::ConfigError;
use crate::services::input::VirtualKey;
use crate::services::machine::Mode;

pub const CONFIG_FILE_NAME: &str = "suspend_process.json";
const CONFIG_DIR_NAME: &str = "SuspendProcess";

pub const DEFAULT_GET_PROCESS_DELAY_MS: u64 = 50;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
pub const DEFAULT_EXIT_DELAY_MS: u64 = 3000;
/// VK_INSERT
pub const DEFAULT_TOGGLE_KEY: u16 = 0x2D;

/// Settings as they appear in `suspend_process.json`.
/// Every field is optional at this level; `AppSettings::from_raw` decides
/// which ones are required and fills in defaults for the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    /// Executable name of the target, e.g. "notepad.exe"
    #[serde(rename = "ProcessName")]
    pub process_name: Option<String>,

    /// Suspend as soon as the target is acquired (default: false)
    #[serde(rename = "AutoSuspend")]
    pub auto_suspend: Option<bool>,

    /// Hold-to-suspend instead of press-to-toggle (default: false)
    #[serde(rename = "HoldMode")]
    pub hold_mode: Option<bool>,

    /// Milliseconds between acquisition attempts (default: 50)
    #[serde(rename = "GetProcessDelay")]
    pub get_process_delay: Option<u64>,

    /// Virtual key code, hex string ("0x2D", "2D") or plain integer (default: Insert)
    #[serde(rename = "ToggleKey")]
    pub toggle_key: Option<RawKey>,

    /// Milliseconds between control loop ticks (default: 10)
    #[serde(rename = "TickInterval")]
    pub tick_interval: Option<u64>,

    /// Milliseconds to keep the console open before exiting (default: 3000)
    #[serde(rename = "ExitDelay")]
    pub exit_delay: Option<u64>,
}

/// ToggleKey accepts both JSON numbers and hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawKey {
    Code(u64),
    Text(String),
}

/// Fully resolved configuration consumed by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub process_name: String,
    pub auto_suspend: bool,
    pub mode: Mode,
    pub get_process_delay: Duration,
    pub toggle_key: VirtualKey,
    pub tick_interval: Duration,
    pub exit_delay: Duration,
}

impl AppSettings {
    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let process_name = raw
            .process_name
            .ok_or(ConfigError::MissingKey("ProcessName"))?
            .trim()
            .to_string();
        if process_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ProcessName",
                reason: "must not be empty".into(),
            });
        }

        let toggle_key = match raw.toggle_key {
            Some(ref key) => parse_toggle_key(key)?,
            None => VirtualKey(DEFAULT_TOGGLE_KEY),
        };

        let delay_ms = raw.get_process_delay.unwrap_or(DEFAULT_GET_PROCESS_DELAY_MS);
        if delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GetProcessDelay",
                reason: "must be greater than zero".into(),
            });
        }

        let tick_ms = raw.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TickInterval",
                reason: "must be greater than zero".into(),
            });
        }

        let mode = if raw.hold_mode.unwrap_or(false) {
            Mode::Hold
        } else {
            Mode::Latch
        };

        Ok(Self {
            process_name,
            auto_suspend: raw.auto_suspend.unwrap_or(false),
            mode,
            get_process_delay: Duration::from_millis(delay_ms),
            toggle_key,
            tick_interval: Duration::from_millis(tick_ms),
            exit_delay: Duration::from_millis(raw.exit_delay.unwrap_or(DEFAULT_EXIT_DELAY_MS)),
        })
    }
}

/// Parse a ToggleKey value. Strings are always hexadecimal, with or without
/// a `0x` prefix. Valid virtual key codes are 0x01..=0xFE.
pub fn parse_toggle_key(raw: &RawKey) -> Result<VirtualKey, ConfigError> {
    let code = match raw {
        RawKey::Code(code) => *code,
        RawKey::Text(text) => {
            let text = text.trim();
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            u64::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidValue {
                key: "ToggleKey",
                reason: format!("`{}` is not a hexadecimal key code", text),
            })?
        }
    };

    if !(0x01..=0xFE).contains(&code) {
        return Err(ConfigError::InvalidValue {
            key: "ToggleKey",
            reason: format!("0x{:X} is outside the virtual key range 0x01..=0xFE", code),
        });
    }
    Ok(VirtualKey(code as u16))
}

/// SettingsService - finds and reads the JSON config file.
/// Lookup order: explicit path, working directory, then the per-user
/// config folder (%APPDATA%\SuspendProcess on Windows).
pub struct SettingsService {
    search_paths: Vec<PathBuf>,
}

impl SettingsService {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        let search_paths = match explicit {
            Some(path) => vec![path],
            None => {
                let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
                if let Some(dir) = dirs::config_dir() {
                    paths.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
                }
                paths
            }
        };
        Self { search_paths }
    }

    #[cfg(test)]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First search path that exists on disk.
    pub fn locate(&self) -> Result<&Path, ConfigError> {
        self.search_paths
            .iter()
            .find(|p| p.is_file())
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::Missing {
                searched: self
                    .search_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn load_raw(&self) -> Result<RawSettings, ConfigError> {
        info!("Trying to find the config file...");
        let path = self.locate()?;
        debug!(path = %path.display(), "reading config");

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Syntax {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load and validate. `process_override` (from the command line) replaces
    /// ProcessName before validation, so the file may omit it.
    pub fn load(&self, process_override: Option<&str>) -> Result<AppSettings, ConfigError> {
        let mut raw = self.load_raw()?;
        if let Some(name) = process_override {
            raw.process_name = Some(name.to_string());
        }
        let settings = AppSettings::from_raw(raw)?;
        info!("Parsed the config file");
        Ok(settings)
    }
}
