//! bootkit — example entry point.
//!
//! Startup sequence:
//!   1. Load bootstrap config (`BOOTKIT_CONFIG` or `config/default.toml`).
//!      `BOOTKIT_*` overrides come from the process environment as it is at
//!      this point; setting them in the env file has no effect.
//!   2. Build the dual-sink logger and route `tracing` through it
//!   3. Load the env file once
//!   4. Put the project root on the search path
//!   5. Run the example computation

use std::sync::Arc;

use tracing::info;

use bootkit::{
    config,
    demo,
    env::{EnvManager, EnvOptions, ProcessEnv},
    error::AppError,
    logger::{LogSettings, Logger},
    path_setup,
};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config_path = std::env::var("BOOTKIT_CONFIG").ok();
    let config = config::load(config_path.as_deref())?;

    let logger = Logger::new(LogSettings::from_config(&config.logging)?)?;
    logger.install_global()?;
    info!(
        logger = %logger.name(),
        log_file = %logger.log_file().display(),
        "logger ready"
    );

    let env = EnvManager::new(Arc::new(ProcessEnv), EnvOptions::from_config(&config.env))?;

    let added = path_setup::add_project_root_to_sys_path(env.store(), &config.paths.search_path_var)?;
    info!(var = %config.paths.search_path_var, added, "search path ready");

    match demo::add_numbers(&env, &logger) {
        Some(sum) => println!("✓ result: {sum}"),
        None => println!("✗ no result, see {}", logger.log_file().display()),
    }

    Ok(())
}
