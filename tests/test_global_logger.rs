//! Crate `tracing` events routed through an installed logger.
//!
//! Kept in its own test binary: the global subscriber can be set only once
//! per process.

use std::{fs, sync::Arc};

use bootkit::{
    env::{EnvManager, EnvOptions, MemoryEnv},
    logger::{LogSettings, Logger, Severity},
};
use tempfile::TempDir;

#[test]
fn crate_events_reach_installed_logger() {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(
        LogSettings::new("global-test")
            .with_log_dir(tmp.path())
            .with_console_level(Severity::Critical),
    )
    .unwrap();
    logger.install_global().unwrap();
    assert!(logger.install_global().is_err());

    let env = EnvManager::unloaded(Arc::new(MemoryEnv::new()), EnvOptions::default());
    env.load_env(tmp.path().join("absent.env")).unwrap();
    env.get_env_variable("MISSING", Some("fallback")).unwrap();

    let text = fs::read_to_string(logger.log_file()).unwrap();
    assert!(
        text.contains("global-test - WARNING - No environment variables found"),
        "{text}"
    );
    assert!(
        text.contains("Environment variable MISSING not found, using default value: fallback"),
        "{text}"
    );
}
