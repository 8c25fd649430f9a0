//! Per-tag statement log file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use tracing::warn;

use super::query::Statement;
use crate::error::Result;

/// Appends one timestamped line per executed statement.
#[derive(Debug)]
pub(crate) struct SqlLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl SqlLog {
    /// Create (or truncate) the log file at `path`.
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Write failures are reported through tracing and never fail the query.
    pub(crate) fn record(&self, tag: &str, statement: &Statement) {
        let mut line = format!(
            "{} [{tag}] {}",
            Local::now().format("%Y/%m/%d %H:%M:%S"),
            statement.sql()
        );
        if !statement.binds().is_empty() {
            let binds: Vec<String> = statement.binds().iter().map(ToString::to_string).collect();
            line.push_str(&format!(" [{}]", binds.join(", ")));
        }

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %self.path.display(), error = %e, "failed to write SQL log");
        }
    }
}
