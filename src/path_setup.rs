//! Project-root search path setup.
//!
//! The search path is a platform path list (`:`-separated on Unix, `;` on
//! Windows) held in an environment variable, `BOOTKIT_PATH` by default.
//! [`add_project_root_to_sys_path`] puts the project root at its front once
//! and leaves every existing entry as it was, empty and repeated ones included
//! (an empty entry means the current directory on Unix).

use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{env::EnvStore, error::AppError};

pub const DEFAULT_SEARCH_PATH_VAR: &str = "BOOTKIT_PATH";

/// Parent of the directory holding this source file.
pub fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .join(file!())
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

/// Ordered directory list, entries kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Split a path list. An empty value is an empty list.
    pub fn parse(value: &OsStr) -> Self {
        if value.is_empty() {
            return Self::default();
        }
        Self {
            dirs: env::split_paths(value).collect(),
        }
    }

    pub fn from_store(store: &dyn EnvStore, var: &str) -> Result<Self, AppError> {
        let value = store.get(var).map_err(|source| AppError::EnvLookup {
            name: var.to_string(),
            source,
        })?;
        Ok(value.map(|v| Self::parse(OsStr::new(&v))).unwrap_or_default())
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == dir)
    }

    /// Insert `dir` at the front unless present. Returns whether it inserted.
    pub fn prepend(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.contains(&dir) {
            return false;
        }
        self.dirs.insert(0, dir);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn join(&self) -> Result<OsString, AppError> {
        env::join_paths(&self.dirs).map_err(|e| AppError::Path(e.to_string()))
    }
}

/// Prepend [`project_root`] to `path` if absent.
pub fn add_project_root(path: &mut SearchPath) -> bool {
    path.prepend(project_root())
}

const LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Prepend [`project_root`] to the path list in `var`, writing the variable
/// back only when it changed. The existing value is kept verbatim after the
/// root. Returns whether the root was added.
pub fn add_project_root_to_sys_path(store: &dyn EnvStore, var: &str) -> Result<bool, AppError> {
    let current = store.get(var).map_err(|source| AppError::EnvLookup {
        name: var.to_string(),
        source,
    })?;
    let current = current.unwrap_or_default();
    let root = project_root();
    if SearchPath::parse(OsStr::new(&current)).contains(&root) {
        debug!(var, "project root already on search path");
        return Ok(false);
    }

    let mut updated = env::join_paths([&root])
        .map_err(|e| AppError::Path(e.to_string()))?
        .into_string()
        .map_err(|raw| AppError::Path(format!("project root is not valid UTF-8: {raw:?}")))?;
    if !current.is_empty() {
        updated.push(LIST_SEPARATOR);
        updated.push_str(&current);
    }
    store.set(var, &updated);
    debug!(var, root = %root.display(), "project root added to search path");
    Ok(true)
}
