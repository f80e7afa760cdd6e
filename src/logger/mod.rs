//! Dual-sink logging via tracing-subscriber.
//!
//! A [`Logger`] owns a named `tracing` dispatch with two sinks:
//!
//! - **file** — a size-rotated file under `log_dir`, named
//!   `log_<YYYYMMDD_HHMMSS>.log` after the construction time;
//! - **console** — stderr unless another writer is supplied
//!   ([`Logger::with_console_writer`]).
//!
//! Each sink has its own [`Severity`] threshold. Both share one line format:
//! `timestamp - name - LEVEL - message`.
//!
//! Sinks are registered per logger name, once per process. Constructing a
//! second `Logger` with a name already in use reuses the first one's sinks.

pub mod rotating;

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use chrono::Local;
use tracing::{Dispatch, Event, Level, Metadata, Subscriber};
use tracing_subscriber::{
    Layer, Registry,
    filter::filter_fn,
    fmt::{FmtContext, FormatEvent, FormatFields, format, writer::BoxMakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
};

use crate::{config::LoggingConfig, error::AppError};

use rotating::RotatingFile;

/// Events on this target are labelled `CRITICAL`; they are emitted at
/// `ERROR` level since `tracing` has no higher one.
pub const CRITICAL_TARGET: &str = "bootkit::critical";

// ── severity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Severity of an event or callsite. `TRACE` folds into `Debug`.
    pub fn of(meta: &Metadata<'_>) -> Self {
        if meta.target() == CRITICAL_TARGET {
            return Severity::Critical;
        }
        match *meta.level() {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warning,
            Level::INFO => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_level(s)
    }
}

/// Parse a level string (`"debug"`, `"info"`, `"warn"`/`"warning"`, `"error"`,
/// `"critical"`, any case), returning an error on unrecognised values.
pub fn parse_level(level: &str) -> Result<Severity, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" => Ok(Severity::Debug),
        "info" => Ok(Severity::Info),
        "warn" | "warning" => Ok(Severity::Warning),
        "error" => Ok(Severity::Error),
        "critical" | "fatal" => Ok(Severity::Critical),
        _ => Err(AppError::Logger(format!("unrecognised log level: '{level}'"))),
    }
}

// ── settings ─────────────────────────────────────────────────────────────────

/// Construction parameters for a [`Logger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub name: String,
    pub log_dir: PathBuf,
    pub file_level: Severity,
    pub console_level: Severity,
    pub max_bytes: u64,
    pub backup_count: usize,
}

impl LogSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_dir: PathBuf::from("logs"),
            file_level: Severity::Debug,
            console_level: Severity::Error,
            max_bytes: 5 * 1024 * 1024,
            backup_count: 5,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self, AppError> {
        Ok(Self {
            name: config.name.clone(),
            log_dir: config.log_dir.clone(),
            file_level: parse_level(&config.file_level)?,
            console_level: parse_level(&config.console_level)?,
            max_bytes: config.max_bytes,
            backup_count: config.backup_count,
        })
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_file_level(mut self, level: Severity) -> Self {
        self.file_level = level;
        self
    }

    pub fn with_console_level(mut self, level: Severity) -> Self {
        self.console_level = level;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_backup_count(mut self, backup_count: usize) -> Self {
        self.backup_count = backup_count;
        self
    }
}

// ── line format ──────────────────────────────────────────────────────────────

/// `2026-01-01 12:00:00,123 - name - INFO - message`
struct LineFormat {
    name: String,
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        let severity = Severity::of(event.metadata());
        write!(writer, "{now} - {} - {severity} - ", self.name)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// ── sink registry ────────────────────────────────────────────────────────────

/// Sinks attached to one logger name.
struct Sinks {
    dispatch: Dispatch,
    log_file: PathBuf,
}

fn registry() -> &'static Mutex<HashMap<String, Arc<Sinks>>> {
    static SINKS: OnceLock<Mutex<HashMap<String, Arc<Sinks>>>> = OnceLock::new();
    SINKS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// `log_<YYYYMMDD_HHMMSS>.log` under `log_dir`, stamped with the local time.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let now = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("log_{now}.log"))
}

fn build_sinks(
    settings: &LogSettings,
    log_file: PathBuf,
    console: BoxMakeWriter,
) -> Result<Sinks, AppError> {
    let file = RotatingFile::open(&log_file, settings.max_bytes, settings.backup_count)
        .map_err(|e| {
            AppError::Logger(format!("failed to open log file '{}': {e}", log_file.display()))
        })?;

    let file_level = settings.file_level;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LineFormat { name: settings.name.clone() })
        .with_writer(file)
        .with_filter(filter_fn(move |meta| Severity::of(meta) >= file_level));

    let console_level = settings.console_level;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LineFormat { name: settings.name.clone() })
        .with_writer(console)
        .with_filter(filter_fn(move |meta| Severity::of(meta) >= console_level));

    let subscriber = Registry::default().with(file_layer).with(console_layer);

    Ok(Sinks {
        dispatch: Dispatch::new(subscriber),
        log_file,
    })
}

// ── logger ───────────────────────────────────────────────────────────────────

/// Named dual-sink logger. Cheap to clone; clones share sinks.
#[derive(Clone)]
pub struct Logger {
    name: String,
    sinks: Arc<Sinks>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("log_file", &self.sinks.log_file)
            .finish()
    }
}

impl Logger {
    /// Create `log_dir` if needed and attach sinks for `settings.name` unless
    /// that name already has them.
    pub fn new(settings: LogSettings) -> Result<Self, AppError> {
        Self::with_console_writer(settings, BoxMakeWriter::new(std::io::stderr))
    }

    /// Like [`Logger::new`], with the console sink writing to `console`.
    /// `console` is dropped when the name already has sinks.
    pub fn with_console_writer(
        settings: LogSettings,
        console: BoxMakeWriter,
    ) -> Result<Self, AppError> {
        fs::create_dir_all(&settings.log_dir).map_err(|e| {
            AppError::Logger(format!(
                "cannot create log dir '{}': {e}",
                settings.log_dir.display()
            ))
        })?;
        let log_file = log_file_path(&settings.log_dir);

        let mut sinks = registry().lock().unwrap_or_else(PoisonError::into_inner);
        let attached = match sinks.get(&settings.name) {
            Some(existing) => Arc::clone(existing),
            None => {
                let built = Arc::new(build_sinks(&settings, log_file, console)?);
                sinks.insert(settings.name.clone(), Arc::clone(&built));
                built
            }
        };

        Ok(Self {
            name: settings.name,
            sinks: attached,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the file sink writes to (the one attached first for this name).
    pub fn log_file(&self) -> &Path {
        &self.sinks.log_file
    }

    /// Route the crate's own `tracing` events through this logger's sinks.
    /// Fails if a global subscriber is already set.
    pub fn install_global(&self) -> Result<(), AppError> {
        tracing::dispatcher::set_global_default(self.sinks.dispatch.clone())
            .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
    }

    /// Run `f` with this logger as the thread's default subscriber, so the
    /// crate's own events inside it reach these sinks.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.sinks.dispatch, f)
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.sinks.dispatch, || {
            tracing::debug!("{message}");
        });
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.sinks.dispatch, || {
            tracing::info!("{message}");
        });
    }

    pub fn warning(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.sinks.dispatch, || {
            tracing::warn!("{message}");
        });
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.sinks.dispatch, || {
            tracing::error!("{message}");
        });
    }

    pub fn critical(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.sinks.dispatch, || {
            tracing::error!(target: CRITICAL_TARGET, "{message}");
        });
    }

    /// Log `message` at `severity`.
    pub fn log(&self, severity: Severity, message: impl fmt::Display) {
        match severity {
            Severity::Debug => self.debug(message),
            Severity::Info => self.info(message),
            Severity::Warning => self.warning(message),
            Severity::Error => self.error(message),
            Severity::Critical => self.critical(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_log(logger: &Logger) -> String {
        fs::read_to_string(logger.log_file()).unwrap_or_default()
    }

    #[test]
    fn valid_levels_parse() {
        for (s, want) in [
            ("debug", Severity::Debug),
            ("INFO", Severity::Info),
            ("warn", Severity::Warning),
            ("Warning", Severity::Warning),
            ("error", Severity::Error),
            ("critical", Severity::Critical),
        ] {
            assert_eq!(parse_level(s).unwrap(), want, "level '{s}'");
        }
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
        assert!("INFO_LEVEL".parse::<Severity>().is_err());
    }

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn default_settings() {
        let s = LogSettings::new("app");
        assert_eq!(s.log_dir, PathBuf::from("logs"));
        assert_eq!(s.file_level, Severity::Debug);
        assert_eq!(s.console_level, Severity::Error);
        assert_eq!(s.max_bytes, 5 * 1024 * 1024);
        assert_eq!(s.backup_count, 5);
    }

    #[test]
    fn settings_from_config_rejects_bad_level() {
        let mut cfg = crate::config::Config::default().logging;
        cfg.file_level = "loud".into();
        assert!(LogSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn log_file_name_embeds_timestamp() {
        let path = log_file_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("log_"));
        assert!(name.ends_with(".log"));
        // log_ + YYYYMMDD_HHMMSS + .log
        assert_eq!(name.len(), 4 + 15 + 4);
    }

    #[test]
    fn creates_missing_log_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let logger = Logger::new(LogSettings::new("logger-test-mkdir").with_log_dir(&dir)).unwrap();
        assert!(dir.is_dir());
        assert!(logger.log_file().starts_with(&dir));
    }

    #[test]
    fn lines_use_shared_format() {
        let tmp = TempDir::new().unwrap();
        let logger =
            Logger::new(LogSettings::new("logger-test-format").with_log_dir(tmp.path())).unwrap();
        logger.info("hello world");
        logger.critical("meltdown");

        let text = read_log(&logger);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - logger-test-format - INFO - hello world"), "{}", lines[0]);
        assert!(lines[1].ends_with(" - logger-test-format - CRITICAL - meltdown"), "{}", lines[1]);
    }

    #[test]
    fn file_threshold_drops_lower_severities() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::new(
            LogSettings::new("logger-test-threshold")
                .with_log_dir(tmp.path())
                .with_file_level(Severity::Warning),
        )
        .unwrap();
        logger.debug("d");
        logger.info("i");
        logger.warning("w");
        logger.error("e");

        let text = read_log(&logger);
        assert!(!text.contains("DEBUG"));
        assert!(!text.contains("INFO"));
        assert!(text.contains("WARNING - w"));
        assert!(text.contains("ERROR - e"));
    }

    #[test]
    fn critical_threshold_admits_only_critical() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::new(
            LogSettings::new("logger-test-critical")
                .with_log_dir(tmp.path())
                .with_file_level(Severity::Critical),
        )
        .unwrap();
        logger.error("plain error");
        logger.log(Severity::Critical, "fatal");

        let text = read_log(&logger);
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("CRITICAL - fatal"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn captured_logger(name: &str, dir: &Path, settings: LogSettings) -> (Logger, Captured) {
        let console = Captured::default();
        let writer = console.clone();
        let logger = Logger::with_console_writer(
            settings.with_log_dir(dir),
            BoxMakeWriter::new(move || writer.clone()),
        )
        .unwrap();
        assert_eq!(logger.name(), name);
        (logger, console)
    }

    #[test]
    fn sinks_filter_independently() {
        let tmp = TempDir::new().unwrap();
        let (logger, console) = captured_logger(
            "logger-test-sinks",
            tmp.path(),
            LogSettings::new("logger-test-sinks")
                .with_file_level(Severity::Debug)
                .with_console_level(Severity::Error),
        );
        logger.debug("quiet detail");
        logger.error("boom");

        let file = read_log(&logger);
        assert!(file.contains(" - logger-test-sinks - DEBUG - quiet detail"));
        assert!(file.contains(" - logger-test-sinks - ERROR - boom"));

        let console = console.text();
        assert_eq!(console.lines().count(), 1, "{console}");
        assert!(!console.contains("quiet detail"));
        assert!(console.trim_end().ends_with(" - logger-test-sinks - ERROR - boom"));
    }

    #[test]
    fn console_can_be_more_verbose_than_file() {
        let tmp = TempDir::new().unwrap();
        let (logger, console) = captured_logger(
            "logger-test-verbose-console",
            tmp.path(),
            LogSettings::new("logger-test-verbose-console")
                .with_file_level(Severity::Critical)
                .with_console_level(Severity::Info),
        );
        logger.debug("dropped everywhere");
        logger.info("console only");

        assert!(read_log(&logger).is_empty());
        let console = console.text();
        assert!(console.contains(" - logger-test-verbose-console - INFO - console only"));
        assert!(!console.contains("dropped everywhere"));
    }

    #[test]
    fn scope_routes_crate_events() {
        let tmp = TempDir::new().unwrap();
        let logger =
            Logger::new(LogSettings::new("logger-test-scope").with_log_dir(tmp.path())).unwrap();
        logger.scope(|| tracing::warn!("from inside"));
        tracing::warn!("from outside");

        let text = read_log(&logger);
        assert!(text.contains("WARNING - from inside"));
        assert!(!text.contains("from outside"));
    }

    #[test]
    fn same_name_attaches_sinks_once() {
        let tmp = TempDir::new().unwrap();
        let settings = LogSettings::new("logger-test-dup").with_log_dir(tmp.path());
        let first = Logger::new(settings.clone()).unwrap();
        let second = Logger::new(settings).unwrap();
        assert_eq!(first.log_file(), second.log_file());

        second.info("only once");
        assert_eq!(read_log(&first).matches("only once").count(), 1);
    }

    #[test]
    fn rotates_through_logger() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::new(
            LogSettings::new("logger-test-rotate")
                .with_log_dir(tmp.path())
                .with_max_bytes(200)
                .with_backup_count(2),
        )
        .unwrap();
        for n in 0..40 {
            logger.info(format_args!("message number {n}"));
        }

        let active = logger.log_file().to_path_buf();
        assert!(rotating::backup_path(&active, 1).exists());
        assert!(rotating::backup_path(&active, 2).exists());
        assert!(!rotating::backup_path(&active, 3).exists());
        assert!(fs::metadata(&active).unwrap().len() <= 200);
        assert!(read_log(&logger).contains("message number 39"));
    }
}
