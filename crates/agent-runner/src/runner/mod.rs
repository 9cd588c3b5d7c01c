//! Runner abstraction over agent CLIs
//!
//! A [`Runner`] starts one agent invocation and hands back a [`RunHandle`]:
//! a live stream of [`Event`]s plus a deferred error slot. Backends are looked
//! up by name in a [`RunnerRegistry`], so the orchestrator never names a
//! concrete agent.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use spek_core::Config;

use crate::error::{Result, RunnerError};
use crate::event::Event;

pub mod claude;

pub use claude::ClaudeRunner;

/// Events buffered between the reader task and the orchestrator
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The prompt pair sent to the agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompts {
    /// User message
    pub user: String,
    /// Instructions passed as the agent's system prompt
    pub system: Option<String>,
}

impl Prompts {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Parameters for one agent invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub prompts: Prompts,
    pub config: Config,
    /// Session to resume; `None` starts a new conversation
    pub session_id: Option<String>,
    /// Working directory (current directory if unset)
    pub cwd: Option<PathBuf>,
    /// Explicit raw-stream log file
    pub log_file: Option<PathBuf>,
    /// Short name of the workflow, used in default log file names
    pub label: String,
}

impl RunOptions {
    pub fn new(prompts: Prompts, config: Config) -> Self {
        Self {
            prompts,
            config,
            session_id: None,
            cwd: None,
            log_file: None,
            label: "agent".to_string(),
        }
    }
}

/// Output of a running invocation
///
/// `events` closes once the agent process has exited. `error` then yields
/// the failure, if any; a closed slot with no value means success.
#[derive(Debug)]
pub struct RunHandle {
    pub events: mpsc::Receiver<Event>,
    pub error: oneshot::Receiver<RunnerError>,
}

impl RunHandle {
    /// Run `producer` on a background task wired to a fresh handle.
    ///
    /// The event sender is dropped when the producer returns, before any
    /// error is posted, so both channels close exactly once.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Event>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, error) = oneshot::channel();
        let task = producer(event_tx);

        tokio::spawn(async move {
            if let Err(e) = task.await {
                let _ = error_tx.send(e);
            }
        });

        Self { events, error }
    }

    /// Wait for the error slot. Call after `events` is drained.
    pub async fn finish(self) -> Option<RunnerError> {
        self.error.await.ok()
    }
}

/// An agent backend
pub trait Runner: Send + Sync {
    /// Start the agent without blocking; progress arrives through the handle.
    fn run(&self, options: RunOptions) -> RunHandle;
}

/// Builds a fresh runner instance
pub type RunnerFactory = Arc<dyn Fn() -> Box<dyn Runner> + Send + Sync>;

/// Backend name → factory
#[derive(Clone)]
pub struct RunnerRegistry {
    factories: HashMap<String, RunnerFactory>,
}

impl RunnerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding the built-in backends
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(claude::BACKEND_NAME, || Box::new(ClaudeRunner::new()));
        registry
    }

    /// Add or replace a backend
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Runner> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Instantiate a backend by name
    pub fn create(&self, name: &str) -> Result<Box<dyn Runner>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| RunnerError::UnknownBackend {
                name: name.to_string(),
            })
    }

    /// Instantiate the backend named by `agent.backend`
    pub fn for_config(&self, config: &Config) -> Result<Box<dyn Runner>> {
        self.create(&config.agent.backend)
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
