//! Error types for agent-runner

use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that end a step
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The agent process could not be started
    #[error("Failed to start agent: {message}")]
    SpawnFailed {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The agent process exited with a failure status or was killed
    #[error("Agent process exited with code {code:?}: {message}")]
    ProcessExited { code: Option<i32>, message: String },

    /// Reading the agent's stdout failed mid-stream
    #[error("Failed to read agent output: {source}")]
    OutputRead {
        #[source]
        source: std::io::Error,
    },

    /// The agent finished but reported an error result
    #[error("Agent reported an error: {message}")]
    AgentReported { message: String },

    /// No backend registered under this name
    #[error("Unknown runner backend: {name}")]
    UnknownBackend { name: String },

    /// Config or project-file failure
    #[error(transparent)]
    Core(#[from] spek_core::Error),
}

impl RunnerError {
    /// Create a SpawnFailed error
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a SpawnFailed error with source
    pub fn spawn_failed_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an AgentReported error
    pub fn agent_reported(message: impl Into<String>) -> Self {
        Self::AgentReported {
            message: message.into(),
        }
    }
}
