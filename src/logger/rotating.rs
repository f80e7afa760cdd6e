//! Size-based rotating log file.
//!
//! Layout next to the active file:
//! ```text
//! logs/
//! ├── log_20260101_120000.log     (active)
//! ├── log_20260101_120000.log.1   (newest rotation)
//! └── log_20260101_120000.log.N   (oldest kept, N = backup_count)
//! ```
//!
//! Rollover is disabled when either `max_bytes` or `backup_count` is zero.

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use tracing_subscriber::fmt::MakeWriter;

/// Cloneable handle to a rotating file; every clone writes to the same file.
#[derive(Clone, Debug)]
pub struct RotatingFile {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    /// Open (or create) `path` for appending. The current file length counts
    /// towards `max_bytes`.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path,
                max_bytes,
                backup_count,
                file,
                size,
            })),
        })
    }

    pub fn path(&self) -> io::Result<PathBuf> {
        Ok(self.lock()?.path.clone())
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("rotating log file lock poisoned"))
    }
}

/// `<path>.<index>`
pub fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Inner {
    // Rolls only when the record would push the file past `max_bytes`; a
    // file filled exactly to the limit stays put.
    fn should_roll(&self, incoming: usize) -> bool {
        self.max_bytes > 0
            && self.backup_count > 0
            && self.size > 0
            && self.size + incoming as u64 > self.max_bytes
    }

    fn roll(&mut self) -> io::Result<()> {
        for index in (1..self.backup_count).rev() {
            let src = backup_path(&self.path, index);
            if src.exists() {
                let dst = backup_path(&self.path, index + 1);
                if dst.exists() {
                    fs::remove_file(&dst)?;
                }
                fs::rename(&src, &dst)?;
            }
        }

        let first = backup_path(&self.path, 1);
        if first.exists() {
            fs::remove_file(&first)?;
        }
        if self.path.exists() {
            fs::rename(&self.path, &first)?;
        }

        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    /// Writes `buf` whole; one call is one log record.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock()?;
        if inner.should_roll(buf.len()) {
            inner.roll()?;
        }
        inner.file.write_all(buf)?;
        inner.size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
