//! Bootstrap configuration with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! an explicit path), then applies `BOOTKIT_LOG_DIR`, `BOOTKIT_LOG_LEVEL` and
//! `BOOTKIT_ENV_FILE` overrides. A missing default file is not an error: the
//! hardcoded defaults below are used instead.
//!
//! Config is read before the env file is loaded (it names that file), so the
//! overrides must be set in the process environment, not in `.env`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Logger settings as written in `[logging]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Logger name, printed in every line.
    pub name: String,
    /// Directory for log files (already expanded, no `~`).
    pub log_dir: PathBuf,
    /// Minimum severity written to the file sink.
    pub file_level: String,
    /// Minimum severity written to the console sink.
    pub console_level: String,
    /// Size in bytes after which the file sink rolls over.
    pub max_bytes: u64,
    /// Rotated files kept next to the active one.
    pub backup_count: usize,
}

/// Env-file settings as written in `[env]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub file: PathBuf,
    /// When `true`, values from the file replace variables already set.
    pub override_existing: bool,
}

/// Search-path settings as written in `[paths]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    /// Environment variable holding the search path list.
    pub search_path_var: String,
}

/// Fully-resolved bootstrap configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub env: EnvConfig,
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                name: default_logger_name(),
                log_dir: PathBuf::from(default_log_dir()),
                file_level: default_file_level(),
                console_level: default_console_level(),
                max_bytes: default_max_bytes(),
                backup_count: default_backup_count(),
            },
            env: EnvConfig {
                file: PathBuf::from(default_env_file()),
                override_existing: false,
            },
            paths: PathsConfig {
                search_path_var: default_search_path_var(),
            },
        }
    }
}

/// Env-var overrides applied on top of the file. Tests build this directly
/// instead of mutating the process environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_dir: Option<String>,
    pub console_level: Option<String>,
    pub env_file: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_dir: env::var("BOOTKIT_LOG_DIR").ok(),
            console_level: env::var("BOOTKIT_LOG_LEVEL").ok(),
            env_file: env::var("BOOTKIT_ENV_FILE").ok(),
        }
    }

    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = expand_home(dir);
        }
        if let Some(level) = &self.console_level {
            config.logging.console_level = level.clone();
        }
        if let Some(file) = &self.env_file {
            config.env.file = expand_home(file);
        }
    }
}

// ── raw TOML shape ───────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    env: RawEnv,
    #[serde(default)]
    paths: RawPaths,
}

#[derive(Deserialize)]
struct RawLogging {
    #[serde(default = "default_logger_name")]
    name: String,
    #[serde(default = "default_log_dir")]
    log_dir: String,
    #[serde(default = "default_file_level")]
    file_level: String,
    #[serde(default = "default_console_level")]
    console_level: String,
    #[serde(default = "default_max_bytes")]
    max_bytes: u64,
    #[serde(default = "default_backup_count")]
    backup_count: usize,
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            name: default_logger_name(),
            log_dir: default_log_dir(),
            file_level: default_file_level(),
            console_level: default_console_level(),
            max_bytes: default_max_bytes(),
            backup_count: default_backup_count(),
        }
    }
}

#[derive(Deserialize)]
struct RawEnv {
    #[serde(default = "default_env_file")]
    file: String,
    #[serde(default)]
    override_existing: bool,
}

impl Default for RawEnv {
    fn default() -> Self {
        Self { file: default_env_file(), override_existing: false }
    }
}

#[derive(Deserialize)]
struct RawPaths {
    #[serde(default = "default_search_path_var")]
    search_path_var: String,
}

impl Default for RawPaths {
    fn default() -> Self {
        Self { search_path_var: default_search_path_var() }
    }
}

fn default_logger_name() -> String { "bootkit".to_string() }
fn default_log_dir() -> String { "logs".to_string() }
fn default_file_level() -> String { "debug".to_string() }
fn default_console_level() -> String { "error".to_string() }
fn default_max_bytes() -> u64 { 5 * 1024 * 1024 }
fn default_backup_count() -> usize { 5 }
fn default_env_file() -> String { ".env".to_string() }
fn default_search_path_var() -> String { "BOOTKIT_PATH".to_string() }

// ── loading ──────────────────────────────────────────────────────────────────

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. An explicit path must exist; the default one may not.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        let mut config = Config::default();
        overrides.apply(&mut config);
        Ok(config)
    }
}

/// Internal loader — accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let l = parsed.logging;
    let mut config = Config {
        logging: LoggingConfig {
            name: l.name,
            log_dir: expand_home(&l.log_dir),
            file_level: l.file_level,
            console_level: l.console_level,
            max_bytes: l.max_bytes,
            backup_count: l.backup_count,
        },
        env: EnvConfig {
            file: expand_home(&parsed.env.file),
            override_existing: parsed.env.override_existing,
        },
        paths: PathsConfig {
            search_path_var: parsed.paths.search_path_var,
        },
    };
    overrides.apply(&mut config);

    if config.logging.name.is_empty() {
        return Err(AppError::Config(format!(
            "[logging].name must not be empty in {}",
            path.display()
        )));
    }

    Ok(config)
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
