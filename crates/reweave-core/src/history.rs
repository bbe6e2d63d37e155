//! Version-history access for the inputs of the previous generation.
//!
//! The engine never diffs against the previous merged output; it
//! reconstructs the previous fragment from the previous template and
//! input model, and those come from here. A missing entry is
//! ordinary data, not a failure: first generations have no history.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),

    #[error("git output for {0} was not valid UTF-8")]
    Encoding(String),
}

pub trait HistoryResolver {
    /// Content of `path` as of `revision`, or `None` when the
    /// revision or the path is not in history.
    fn fetch(&self, revision: &str, path: &Path) -> Result<Option<String>, HistoryError>;
}

/// Reads historical file content out of a git repository via
/// `git show REV:PATH`.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo_root: PathBuf,
}

impl GitHistory {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        GitHistory {
            repo_root: repo_root.into(),
        }
    }
}

impl HistoryResolver for GitHistory {
    fn fetch(&self, revision: &str, path: &Path) -> Result<Option<String>, HistoryError> {
        let relative = path.strip_prefix(&self.repo_root).unwrap_or(path);
        let spec = format!("{}:{}", revision, relative.display());
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .arg("show")
            .arg(&spec)
            .output()?;
        if output.status.success() {
            let text =
                String::from_utf8(output.stdout).map_err(|_| HistoryError::Encoding(spec))?;
            Ok(Some(text))
        } else {
            // Unknown revision, path not tracked at that revision, or
            // no repository at all: each means the same thing here,
            // there is no previous generation to compare against.
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(spec = %spec, stderr = %stderr.trim(), "no history for spec");
            Ok(None)
        }
    }
}

/// In-memory resolver for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    entries: HashMap<(String, PathBuf), String>,
}

impl StaticHistory {
    pub fn new() -> Self {
        StaticHistory::default()
    }

    pub fn insert(
        &mut self,
        revision: impl Into<String>,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
    ) {
        self.entries
            .insert((revision.into(), path.into()), content.into());
    }
}

impl HistoryResolver for StaticHistory {
    fn fetch(&self, revision: &str, path: &Path) -> Result<Option<String>, HistoryError> {
        Ok(self
            .entries
            .get(&(revision.to_string(), path.to_path_buf()))
            .cloned())
    }
}
