//! External downloader invocation.
//!
//! Runs the Bulk Downloader for Reddit (`bdfr`) against a resolved post link, writing
//! media into a scratch directory. Output is passed through for logging only.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Errors that can occur while fetching media
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Target directory could not be created
    #[error("failed to prepare {path}: {source}")]
    Io {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Downloader executable could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Downloader exited unsuccessfully
    #[error("downloader exited with {status}: {stderr}")]
    Failed {
        /// Process exit status
        status: ExitStatus,
        /// Diagnostic output from the tool
        stderr: String,
    },
}

/// Fetches the media behind a link into a directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download everything referenced by `link` into `target_dir`, creating it if needed.
    async fn download(&self, link: &str, target_dir: &Path) -> Result<(), DownloadError>;
}

/// `bdfr download -l <link> <dir> --no-dupes`
#[derive(Debug, Clone)]
pub struct BdfrDownloader {
    program: String,
}

impl BdfrDownloader {
    /// Use `program` as the downloader executable
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args<'a>(link: &'a str, target_dir: &'a Path) -> [&'a OsStr; 5] {
        [
            OsStr::new("download"),
            OsStr::new("-l"),
            OsStr::new(link),
            target_dir.as_os_str(),
            OsStr::new("--no-dupes"),
        ]
    }
}

impl Default for BdfrDownloader {
    fn default() -> Self {
        Self::new("bdfr")
    }
}

#[async_trait]
impl MediaDownloader for BdfrDownloader {
    async fn download(&self, link: &str, target_dir: &Path) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: target_dir.to_path_buf(),
                source,
            })?;

        info!(
            program = %self.program,
            link = %link,
            dir = %target_dir.display(),
            "Running downloader"
        );

        let output = Command::new(&self.program)
            .args(Self::args(link, target_dir))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "Downloader output");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(status = %output.status, stderr = %stderr, "Downloader failed");
        Err(DownloadError::Failed {
            status: output.status,
            stderr,
        })
    }
}
