//! Agent process management

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};

/// Longest protocol line kept; longer lines are dropped whole
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A spawned agent subprocess
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
    program: String,
}

impl AgentProcess {
    /// Spawn `program` with `args` in `working_dir`.
    ///
    /// Stdout is piped for the event stream. Stdin and stderr are detached.
    pub fn spawn(program: &str, args: &[String], working_dir: &Path) -> Result<Self> {
        info!("Spawning {} in {:?} ({} args)", program, working_dir, args.len());

        let child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunnerError::spawn_failed_with_source(format!("Failed to spawn {}: {}", program, e), e)
            })?;

        Ok(Self {
            child,
            program: program.to_string(),
        })
    }

    /// Take the stdout pipe (can only be called once)
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::spawn_failed("Failed to capture stdout"))
    }

    /// Get the process ID
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process and reap it.
    pub async fn kill(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {}", self.program, e);
        }
    }

    /// Wait for the process to exit; a failure status becomes an error.
    pub async fn wait(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| RunnerError::ProcessExited {
                code: None,
                message: format!("waiting for {}: {}", self.program, e),
            })?;

        debug!("{} exited with {}", self.program, status);
        if status.success() {
            Ok(())
        } else {
            Err(RunnerError::ProcessExited {
                code: status.code(),
                message: format!("{} exited with error: {}", self.program, status),
            })
        }
    }
}

/// Newline-framed reader with a per-line size ceiling
pub struct LineReader<R> {
    reader: BufReader<R>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            limit,
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    ///
    /// Lines longer than the limit are discarded without buffering them.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            match read_frame(&mut self.reader, self.limit).await? {
                Frame::Eof => return Ok(None),
                Frame::Oversized(len) => {
                    warn!("Dropping {} byte line over the {} byte limit", len, self.limit);
                }
                Frame::Line(mut bytes) => {
                    if bytes.last() == Some(&b'\r') {
                        bytes.pop();
                    }
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
            }
        }
    }
}

enum Frame {
    Line(Vec<u8>),
    Oversized(usize),
    Eof,
}

async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R, limit: usize) -> std::io::Result<Frame> {
    let mut line = Vec::new();
    let mut dropped = 0usize;
    let mut saw_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        saw_any = true;

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];

        if dropped > 0 || line.len() + chunk.len() > limit {
            dropped += line.len() + chunk.len();
            line.clear();
        } else {
            line.extend_from_slice(chunk);
        }

        let consumed = newline.map_or(chunk.len(), |i| i + 1);
        reader.consume(consumed);
        if newline.is_some() {
            break;
        }
    }

    Ok(match (saw_any, dropped) {
        (false, _) => Frame::Eof,
        (true, 0) => Frame::Line(line),
        (true, n) => Frame::Oversized(n),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8], limit: usize) -> Vec<String> {
        let mut reader = LineReader::new(input, limit);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_splits_lines() {
        let lines = collect(b"one\r\ntwo\n\nthree", 64).await;
        assert_eq!(lines, vec!["one", "two", "", "three"]);
    }

    #[tokio::test]
    async fn test_drops_oversized_lines_only() {
        let mut input = b"short\n".to_vec();
        input.extend(std::iter::repeat(b'x').take(100));
        input.extend_from_slice(b"\nafter\n");

        let lines = collect(&input, 16).await;
        assert_eq!(lines, vec!["short", "after"]);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_kept() {
        let lines = collect(b"abcd\n", 4).await;
        assert_eq!(lines, vec!["abcd"]);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let dir = std::env::temp_dir();
        let err = AgentProcess::spawn("definitely-not-an-agent-binary", &[], &dir).unwrap_err();
        assert!(matches!(err, RunnerError::SpawnFailed { source: Some(_), .. }));
    }
}
