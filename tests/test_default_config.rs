//! The shipped `config/default.toml` matches the built-in defaults.

use std::path::Path;

use bootkit::config::{self, Config, Overrides};
use bootkit::logger::LogSettings;

#[test]
fn default_config_file_exists() {
    assert!(Path::new(config::DEFAULT_CONFIG_PATH).is_file());
}

#[test]
fn default_config_matches_builtin() {
    let cfg = config::load_from(Path::new(config::DEFAULT_CONFIG_PATH), &Overrides::default()).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn default_config_yields_valid_logger_settings() {
    let cfg = Config::default();
    let settings = LogSettings::from_config(&cfg.logging).unwrap();
    assert_eq!(settings, LogSettings::new("bootkit"));
}
