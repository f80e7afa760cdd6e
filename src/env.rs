//! Env-file loading and variable lookup.
//!
//! An [`EnvManager`] is the process's environment context: it owns the
//! [`EnvStore`] it reads from and writes to, and the load state
//! (`Unloaded → Loaded`, terminal). Build one at startup and pass it to
//! whatever needs lookups; [`EnvManager::global`] exists for callers that
//! cannot thread a context through.
//!
//! The file is parsed with `dotenvy` (comments, blank lines, `export`,
//! quoting, `${VAR}` substitution) and applied all-or-nothing: a malformed
//! line leaves the store untouched. References resolve from the process
//! environment first, then from the manager's store, then from earlier lines.

use std::{
    collections::HashMap,
    env::{self, VarError},
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use tracing::{debug, error, info, warn};

use crate::{config::EnvConfig, error::AppError};

// ── store port ───────────────────────────────────────────────────────────────

/// Where environment variables live.
pub trait EnvStore: Send + Sync {
    /// `Ok(None)` when unset; `Err` when set but unreadable.
    fn get(&self, key: &str) -> Result<Option<String>, VarError>;

    fn set(&self, key: &str, value: &str);
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, key: &str) -> Result<Option<String>, VarError> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) {
        // SAFETY: writes happen during startup, before the process spawns
        // threads that read the environment.
        unsafe { env::set_var(key, value) };
    }
}

/// In-memory environment for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Mutex::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    fn vars(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvStore for MemoryEnv {
    fn get(&self, key: &str) -> Result<Option<String>, VarError> {
        Ok(self.vars().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        self.vars().insert(key.to_string(), value.to_string());
    }
}

// ── options / state ──────────────────────────────────────────────────────────

/// Which side wins when the file names a variable that is already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    /// Existing values are left alone.
    #[default]
    KeepExisting,
    /// File values replace existing ones.
    FileOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOptions {
    pub file: PathBuf,
    pub precedence: Precedence,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            file: PathBuf::from(".env"),
            precedence: Precedence::KeepExisting,
        }
    }
}

impl EnvOptions {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            file: config.file.clone(),
            precedence: if config.override_existing {
                Precedence::FileOverrides
            } else {
                Precedence::KeepExisting
            },
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }
}

/// What the one load attempt found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `count` variables parsed; those not shadowed by existing values were set.
    Applied { path: PathBuf, count: usize },
    /// The file exists but defines nothing.
    Empty { path: PathBuf },
    /// No file at `path`.
    Missing { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded(LoadOutcome),
}

// ── lookup result ────────────────────────────────────────────────────────────

/// Result of [`EnvManager::get_env_variable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Set in the environment.
    Found(String),
    /// Unset; the caller's default stands in.
    Defaulted(String),
    /// Unset and no default given.
    Missing,
}

impl Lookup {
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Found(v) | Lookup::Defaulted(v) => Some(v),
            Lookup::Missing => None,
        }
    }

    pub fn into_value(self) -> Option<String> {
        match self {
            Lookup::Found(v) | Lookup::Defaulted(v) => Some(v),
            Lookup::Missing => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Lookup::Defaulted(_))
    }

    /// Parse the resolved value; surrounding whitespace is ignored.
    pub fn parse<T>(&self, name: &str) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self
            .value()
            .ok_or_else(|| AppError::MissingVar(name.to_string()))?;
        value.trim().parse().map_err(|e: T::Err| AppError::Conversion {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Look `name` up in `store`, falling back to `default`. Unset variables are
/// logged at warn level.
pub fn lookup(store: &dyn EnvStore, name: &str, default: Option<&str>) -> Result<Lookup, AppError> {
    match store.get(name) {
        Ok(Some(value)) => Ok(Lookup::Found(value)),
        Ok(None) => match default {
            Some(fallback) => {
                warn!("Environment variable {name} not found, using default value: {fallback}");
                Ok(Lookup::Defaulted(fallback.to_string()))
            }
            None => {
                warn!("Environment variable {name} not found and no default given");
                Ok(Lookup::Missing)
            }
        },
        Err(source) => {
            error!("Error getting environment variable {name}: {source}");
            Err(AppError::EnvLookup {
                name: name.to_string(),
                source,
            })
        }
    }
}

// ── manager ──────────────────────────────────────────────────────────────────

pub struct EnvManager {
    store: Arc<dyn EnvStore>,
    options: EnvOptions,
    state: Mutex<LoadState>,
}

impl fmt::Debug for EnvManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvManager")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl EnvManager {
    /// Build the context and load `options.file`.
    pub fn new(store: Arc<dyn EnvStore>, options: EnvOptions) -> Result<Self, AppError> {
        let manager = Self::unloaded(store, options);
        manager.load_env(&manager.options.file)?;
        Ok(manager)
    }

    /// Build the context without touching the file.
    pub fn unloaded(store: Arc<dyn EnvStore>, options: EnvOptions) -> Self {
        Self {
            store,
            options,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Process-wide manager over [`ProcessEnv`]. Every call returns the same
    /// instance; `path` is only used while no load attempt has succeeded.
    pub fn global(path: impl AsRef<Path>) -> Result<&'static EnvManager, AppError> {
        static GLOBAL: OnceLock<EnvManager> = OnceLock::new();
        let path = path.as_ref();
        let manager = GLOBAL.get_or_init(|| {
            EnvManager::unloaded(Arc::new(ProcessEnv), EnvOptions::default().with_file(path))
        });
        manager.load_env(path)?;
        Ok(manager)
    }

    pub fn store(&self) -> &dyn EnvStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    pub fn state(&self) -> LoadState {
        self.lock_state().clone()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.lock_state(), LoadState::Loaded(_))
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `path` to the store unless a load already happened. The state
    /// lock is held across the attempt so concurrent callers load once.
    pub fn load_env(&self, path: impl AsRef<Path>) -> Result<LoadOutcome, AppError> {
        let path = path.as_ref();
        let mut state = self.lock_state();
        if let LoadState::Loaded(outcome) = &*state {
            debug!(path = %path.display(), "environment already loaded, skipping");
            return Ok(outcome.clone());
        }

        let outcome = match apply_file(self.store.as_ref(), path, self.options.precedence) {
            Ok(0) => {
                warn!("No environment variables found in {}", path.display());
                LoadOutcome::Empty { path: path.to_path_buf() }
            }
            Ok(count) => {
                info!("Environment variables loaded from {}", path.display());
                LoadOutcome::Applied { path: path.to_path_buf(), count }
            }
            Err(e) if e.not_found() => {
                warn!("No environment variables found in {} (file missing)", path.display());
                LoadOutcome::Missing { path: path.to_path_buf() }
            }
            Err(source) => {
                error!("Error loading environment variables from {}: {source}", path.display());
                return Err(AppError::EnvLoad {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        *state = LoadState::Loaded(outcome.clone());
        Ok(outcome)
    }

    /// Look `name` up in this context's store.
    pub fn get_env_variable(&self, name: &str, default: Option<&str>) -> Result<Lookup, AppError> {
        lookup(self.store.as_ref(), name, default)
    }
}

/// Parse the whole file, then apply it. Returns how many pairs it defines.
fn apply_file(
    store: &dyn EnvStore,
    path: &Path,
    precedence: Precedence,
) -> Result<usize, dotenvy::Error> {
    let text = fs::read_to_string(path).map_err(dotenvy::Error::Io)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let seeds = substitution_seeds(store, text);
    let mut source = String::new();
    for (name, value) in &seeds {
        source.push_str(&format!("{name}=\"{}\"\n", escape_weak_quoted(value)));
    }
    source.push_str(text);

    let pairs = dotenvy::from_read_iter(source.as_bytes())
        .skip(seeds.len())
        .collect::<Result<Vec<_>, _>>()?;
    for (key, value) in &pairs {
        if precedence == Precedence::KeepExisting && !matches!(store.get(key), Ok(None)) {
            continue;
        }
        store.set(key, value);
    }
    Ok(pairs.len())
}

/// Store values for every `$NAME` / `${NAME}` the file mentions. dotenvy
/// resolves references from the process environment, then from earlier
/// lines; leading `NAME="value"` lines make store-only variables resolvable.
fn substitution_seeds(store: &dyn EnvStore, text: &str) -> Vec<(String, String)> {
    let mut seeds: Vec<(String, String)> = Vec::new();
    for name in referenced_names(text) {
        if !is_key(name) || seeds.iter().any(|(seen, _)| seen == name) {
            continue;
        }
        if let Ok(Some(value)) = store.get(name) {
            seeds.push((name.to_string(), value));
        }
    }
    seeds
}

/// Names after `$`: a braced `${...}` body, or the alphanumeric run dotenvy
/// reads for a bare `$NAME`. Over-matches quoted and commented text.
fn referenced_names(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        rest = &rest[pos + 1..];
        let name = match rest.strip_prefix('{') {
            Some(inner) => inner.find('}').map(|end| &inner[..end]),
            None => {
                let end = rest.find(|c: char| !c.is_alphanumeric()).unwrap_or(rest.len());
                Some(&rest[..end])
            }
        };
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            names.push(name);
        }
    }
    names
}

/// Keys dotenvy accepts on the left of `=`.
fn is_key(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn escape_weak_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
