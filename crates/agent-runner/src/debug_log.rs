//! Raw protocol log
//!
//! Every raw stdout line of an invocation is appended to a log file when
//! debugging is on. Failing to open or write the log never fails the step;
//! logging is just switched off for that invocation.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::runner::RunOptions;

/// Append-only log for one invocation
#[derive(Debug)]
pub struct DebugLog {
    file: File,
    path: PathBuf,
}

impl DebugLog {
    /// Open the log for an invocation, if one is configured.
    ///
    /// Writes a session banner first when the invocation starts a new session.
    pub async fn open(options: &RunOptions, cwd: &Path) -> Option<Self> {
        let path = log_path(options, cwd)?;
        match Self::open_at(&path, options.session_id.is_none()).await {
            Ok(log) => {
                debug!("Writing agent stream to {:?}", path);
                Some(log)
            }
            Err(e) => {
                warn!("Debug log {:?} unavailable: {}", path, e);
                None
            }
        }
    }

    async fn open_at(path: &Path, new_session: bool) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let mut log = Self {
            file,
            path: path.to_path_buf(),
        };
        if new_session {
            let banner = format!(
                "\n\n========== NEW SESSION: {} ==========\n",
                Local::now().format("%H:%M:%S")
            );
            log.write_raw(banner.as_bytes()).await?;
        }
        Ok(log)
    }

    /// Append one raw line.
    pub async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write_raw(&buf).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await
    }
}

/// Explicit log file, else `<cwd>/<log_dir>/<date>_<agent>_<label>.log` when
/// debug is enabled.
fn log_path(options: &RunOptions, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = &options.log_file {
        return Some(path.clone());
    }
    let debug = &options.config.debug;
    if !debug.enabled || debug.log_dir.as_os_str().is_empty() {
        return None;
    }
    let agent = Path::new(&options.config.agent.command)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| options.config.agent.command.clone());
    let filename = format!(
        "{}_{}_{}.log",
        Local::now().format("%Y-%m-%d"),
        agent,
        options.label
    );
    Some(cwd.join(&debug.log_dir).join(filename))
}
