//! Agent Runner - drives agent CLIs through pipeline steps
//!
//! This crate spawns agent processes (Claude Code, ...), decodes their
//! stream-JSON output into events, watches the assistant text for control
//! markers, and resumes the same agent session whenever the agent stops to
//! ask a human something.

mod debug_log;
mod error;
mod event;
pub mod markers;
mod process;
pub mod prompt;
pub mod runner;
mod step;
#[cfg(test)]
mod testing;

pub use error::{Result, RunnerError};
pub use event::{Event, ToolUse};
pub use markers::{Question, QuestionType};
pub use process::MAX_LINE_BYTES;
pub use prompt::PromptBuilder;
pub use runner::{ClaudeRunner, Prompts, RunHandle, RunOptions, Runner, RunnerRegistry};
pub use step::{run_steps, Step, StepObserver, StepOutcome, StepRunner, StepState};
