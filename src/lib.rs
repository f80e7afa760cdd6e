//! Application bootstrap kit.
//!
//! - **config** — bootstrap TOML + `BOOTKIT_*` overrides.
//! - **env** — one-time `.env` loading and variable lookup.
//! - **logger** — named dual-sink (rotating file + console) logger.
//! - **path_setup** — project root on the search path.
//! - **demo** — the example computation wired from the pieces above.

pub mod config;
pub mod demo;
pub mod env;
pub mod error;
pub mod logger;
pub mod path_setup;
