//! Step orchestration
//!
//! A [`Step`] is one logical unit of agent work. It may take several agent
//! invocations: whenever the agent stops with unanswered questions, the
//! observer is asked for an answer and the same session is resumed with it.
//!
//! ```text
//! Running ──stream drained, questions pending──▶ AwaitingAnswer ──answer──▶ Running
//!    │                                                 │
//!    ├──finish marker / result / nothing pending──▶ Done ◀──no answer──┘
//!    └──spawn failure / crash / error result──────▶ Failed
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use spek_core::Config;

use crate::error::{Result, RunnerError};
use crate::event::ToolUse;
use crate::markers::{self, Question};
use crate::runner::{Prompts, RunOptions, Runner};

/// One unit of agent work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub prompts: Prompts,
    /// Raw-stream log for every invocation of this step
    pub log_file: Option<PathBuf>,
    /// Short name used in logs
    pub label: String,
}

impl Step {
    pub fn new(prompts: Prompts) -> Self {
        Self {
            prompts,
            log_file: None,
            label: "step".to_string(),
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Where a step is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// An agent invocation is streaming events
    Running,
    /// Waiting on the observer for an answer
    AwaitingAnswer,
    Done,
    Failed,
}

/// How a completed step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Last session id reported by the agent
    pub session_id: Option<String>,
    /// Number of agent invocations, including resumes
    pub invocations: usize,
    /// Whether a finish marker or result event was seen. `false` means the
    /// stream simply ended with nothing pending.
    pub signalled: bool,
}

/// Receives display output and supplies answers
#[async_trait]
pub trait StepObserver: Send {
    /// Assistant text with markers removed. Never empty.
    fn on_text(&mut self, _text: &str) {}

    /// A tool invocation reported by the agent
    fn on_tool(&mut self, _tool: &ToolUse<'_>) {}

    /// Answer the pending questions. `None` ends the step without resuming.
    async fn on_questions(&mut self, _questions: Vec<Question>) -> Option<String> {
        None
    }
}

/// What one drained invocation produced
#[derive(Debug, Default)]
struct Invocation {
    finished: bool,
    questions: Vec<Question>,
}

/// Runs steps against a runner
pub struct StepRunner<'a> {
    runner: &'a dyn Runner,
    config: &'a Config,
    cwd: Option<PathBuf>,
}

impl<'a> StepRunner<'a> {
    pub fn new(runner: &'a dyn Runner, config: &'a Config) -> Self {
        Self {
            runner,
            config,
            cwd: None,
        }
    }

    /// Working directory for every invocation
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Run steps in order. The first failure aborts the rest.
    pub async fn run_steps(
        &self,
        steps: &[Step],
        observer: &mut dyn StepObserver,
    ) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            info!("Starting step {}/{} ({})", index + 1, steps.len(), step.label);
            let outcome = self.run_step(step, observer).await.inspect_err(|e| {
                warn!("Step {} ({}) failed: {}", index + 1, step.label, e);
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Drive one step to `Done` or `Failed`.
    #[instrument(skip_all, fields(step = %step.label))]
    pub async fn run_step(&self, step: &Step, observer: &mut dyn StepObserver) -> Result<StepOutcome> {
        let mut session_id: Option<String> = None;
        let mut prompts = step.prompts.clone();
        let mut invocations = 0;

        loop {
            invocations += 1;
            debug!(state = ?StepState::Running, invocations, "invoking agent");
            let options = RunOptions {
                prompts,
                config: self.config.clone(),
                session_id: session_id.clone(),
                cwd: self.cwd.clone(),
                log_file: step.log_file.clone(),
                label: step.label.clone(),
            };

            let invocation = self.drain(options, &mut session_id, observer).await?;

            if !invocation.finished && !invocation.questions.is_empty() {
                debug!(
                    state = ?StepState::AwaitingAnswer,
                    questions = invocation.questions.len(),
                    "agent is waiting for input"
                );
                if let Some(answer) = observer.on_questions(invocation.questions).await {
                    // The resumed session already carries the system prompt.
                    prompts = Prompts::new(answer);
                    continue;
                }
                debug!("no answer supplied, ending step");
            } else if !invocation.finished {
                warn!("Agent stream ended without a completion signal; treating step as done");
            }

            debug!(state = ?StepState::Done, invocations, "step complete");
            return Ok(StepOutcome {
                session_id,
                invocations,
                signalled: invocation.finished,
            });
        }
    }

    /// Start one invocation and consume its stream and error slot.
    async fn drain(
        &self,
        options: RunOptions,
        session_id: &mut Option<String>,
        observer: &mut dyn StepObserver,
    ) -> Result<Invocation> {
        let mut handle = self.runner.run(options);
        let mut invocation = Invocation::default();

        while let Some(event) = handle.events.recv().await {
            if let Some(id) = event.session_id() {
                if session_id.as_deref() != Some(id) {
                    debug!(session_id = id, "agent session");
                    *session_id = Some(id.to_string());
                }
            }

            for tool in event.tool_uses() {
                observer.on_tool(&tool);
            }

            let text = event.text_content();
            if !text.is_empty() {
                // Protocol decisions look at the raw text; stripping is for display only.
                if markers::is_finished(&text) {
                    invocation.finished = true;
                }
                invocation.questions.extend(markers::detect_questions(&text));

                let display = markers::strip_markers(&text);
                if !display.is_empty() {
                    observer.on_text(&display);
                }
            }

            if event.is_error() {
                debug!(state = ?StepState::Failed, "agent reported an error");
                return Err(RunnerError::agent_reported(event.result_text()));
            }
            if event.is_result() {
                invocation.finished = true;
            }
        }

        if let Some(err) = handle.finish().await {
            debug!(state = ?StepState::Failed, "agent invocation failed");
            return Err(err);
        }
        Ok(invocation)
    }
}

/// Run `steps` in order with `runner`, resuming sessions through `observer`.
pub async fn run_steps(
    runner: &dyn Runner,
    steps: &[Step],
    config: &Config,
    cwd: impl Into<PathBuf>,
    observer: &mut dyn StepObserver,
) -> Result<Vec<StepOutcome>> {
    StepRunner::new(runner, config)
        .with_cwd(cwd)
        .run_steps(steps, observer)
        .await
}
