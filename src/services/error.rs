use std::path::PathBuf;
use thiserror::Error;

/// Problems with the configuration file. All of these abort the run before
/// any process is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing config file (searched: {searched})")]
    Missing { searched: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Failures of the OS layer that make the run impossible.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("module {0} is not loaded")]
    ModuleUnavailable(&'static str),

    #[error("`{symbol}` could not be resolved from {module}")]
    PrimitiveUnavailable {
        module: &'static str,
        symbol: &'static str,
    },

    #[error("process suspension is only supported on Windows")]
    Unsupported,

    #[error("failed to install console control handler: {0}")]
    ConsoleHandler(String),
}
