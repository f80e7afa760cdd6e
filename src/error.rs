//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("path error: {0}")]
    Path(String),

    #[error("failed to load environment variables from {}", path.display())]
    EnvLoad {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("failed to get environment variable {name}")]
    EnvLookup {
        name: String,
        #[source]
        source: std::env::VarError,
    },

    #[error("cannot convert {name}={value:?}: {reason}")]
    Conversion {
        name: String,
        value: String,
        reason: String,
    },

    #[error("environment variable {0} is not set and has no default")]
    MissingVar(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
