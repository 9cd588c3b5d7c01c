//! Claude CLI backend
//!
//! Runs `claude -p <prompt>` with stream-JSON output and turns each stdout
//! line into an [`Event`].

use std::path::PathBuf;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{RunHandle, RunOptions, Runner};
use crate::debug_log::DebugLog;
use crate::error::{Result, RunnerError};
use crate::event::Event;
use crate::process::{AgentProcess, LineReader, MAX_LINE_BYTES};

/// Registry key of this backend
pub const BACKEND_NAME: &str = "claude";

/// Runner that spawns the Claude CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeRunner;

impl ClaudeRunner {
    pub fn new() -> Self {
        Self
    }

    /// Arguments passed after the binary name.
    pub fn build_args(options: &RunOptions) -> Vec<String> {
        let agent = &options.config.agent;
        let mut args = vec!["-p".to_string(), options.prompts.user.clone()];

        if let Some(system) = options.prompts.system.as_deref().filter(|s| !s.is_empty()) {
            args.push("--system-prompt".to_string());
            args.push(system.to_string());
        }
        args.extend(agent.args.iter().cloned());
        if !agent.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(agent.allowed_tools.join(","));
        }
        if !agent.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(agent.disallowed_tools.join(","));
        }
        if agent.dangerously_skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        if let Some(session_id) = options.session_id.as_deref().filter(|s| !s.is_empty()) {
            args.push("--resume".to_string());
            args.push(session_id.to_string());
        }
        args
    }
}

impl Runner for ClaudeRunner {
    fn run(&self, options: RunOptions) -> RunHandle {
        RunHandle::spawn(move |events| run_claude(options, events))
    }
}

async fn run_claude(options: RunOptions, events: mpsc::Sender<Event>) -> Result<()> {
    let cwd = match &options.cwd {
        Some(dir) => dir.clone(),
        None => current_dir()?,
    };
    let args = ClaudeRunner::build_args(&options);

    let mut process = AgentProcess::spawn(&options.config.agent.command, &args, &cwd)?;
    debug!(
        pid = ?process.pid(),
        resume = options.session_id.is_some(),
        "claude started"
    );
    let stdout = process.take_stdout()?;
    let log = DebugLog::open(&options, &cwd).await;

    if let Err(e) = forward_events(stdout, &events, log).await {
        process.kill().await;
        return Err(e);
    }
    process.wait().await
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        RunnerError::spawn_failed_with_source(format!("Failed to resolve working directory: {}", e), e)
    })
}

/// Decode stdout lines into events until the stream ends or the consumer leaves.
///
/// A read error cuts the stream short and is returned.
async fn forward_events<R>(
    stdout: R,
    events: &mpsc::Sender<Event>,
    mut log: Option<DebugLog>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineReader::new(stdout, MAX_LINE_BYTES);
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed reading agent output: {}", e);
                return Err(RunnerError::OutputRead { source: e });
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(file) = log.as_mut() {
            if let Err(e) = file.write_line(&line).await {
                warn!("Disabling debug log {:?}: {}", file.path(), e);
                log = None;
            }
        }

        let Some(event) = Event::from_line(&line) else {
            continue;
        };
        if events.send(event).await.is_err() {
            warn!("Event channel closed, stopping stdout reader");
            break;
        }
    }
    Ok(())
}
