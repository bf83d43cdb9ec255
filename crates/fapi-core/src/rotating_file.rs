//! Size-capped, append-only log file with numbered backups.
//!
//! `tracing-appender` only rotates on time boundaries; the audit log must stay
//! bounded in size instead. [`RotatingFile`] is a plain [`Write`] sink, so it is
//! wrapped with `tracing_appender::non_blocking` like any other writer.
//!
//! Layout after a few rotations with `max_backups = 3`:
//!
//! ```text
//! bot.log      <- active
//! bot.log.1    <- newest backup
//! bot.log.2
//! bot.log.3    <- oldest, deleted on the next rotation
//! ```

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only file that rolls over once it reaches `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: File,
    /// Bytes in the active file.
    written: u64,
}

impl RotatingFile {
    /// Open (or create) the active file, continuing from its current size.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes: max_bytes.max(1),
            max_backups,
            file,
            written,
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of backup number `n` (1 = newest).
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups == 0 {
            self.file = OpenOptions::new().write(true).truncate(true).create(true).open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.max_backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.max_backups).rev() {
            let src = self.backup_path(n);
            if src.exists() {
                fs::rename(&src, self.backup_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A single oversized record still goes into a fresh file rather than
        // being split across two.
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
