//! Test doubles: a scripted runner and a recording observer

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RunnerError;
use crate::event::{Event, ToolUse};
use crate::markers::Question;
use crate::runner::{RunHandle, RunOptions, Runner};
use crate::step::StepObserver;

struct Script {
    events: Vec<Value>,
    error: Option<RunnerError>,
}

/// Replays one script per invocation and records the options it was given
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<RunOptions>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an invocation that emits `events` and exits cleanly
    pub fn script(self, events: Vec<Value>) -> Self {
        self.push(Script { events, error: None })
    }

    /// Queue an invocation that emits `events` and then fails
    pub fn failing_script(self, events: Vec<Value>, error: RunnerError) -> Self {
        self.push(Script {
            events,
            error: Some(error),
        })
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<RunOptions> {
        self.calls.lock().unwrap().clone()
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, options: RunOptions) -> RunHandle {
        self.calls.lock().unwrap().push(options);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script {
            events: Vec::new(),
            error: None,
        });

        RunHandle::spawn(move |tx| async move {
            for value in script.events {
                let event = Event::from_line(&value.to_string()).expect("script events are objects");
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            match script.error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}

/// Collects everything the orchestrator shows and answers from a queue
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub texts: Vec<String>,
    pub tools: Vec<String>,
    pub asked: Vec<Vec<Question>>,
    answers: VecDeque<String>,
}

impl RecordingObserver {
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl StepObserver for RecordingObserver {
    fn on_text(&mut self, text: &str) {
        self.texts.push(text.to_string());
    }

    fn on_tool(&mut self, tool: &ToolUse<'_>) {
        self.tools.push(tool.describe());
    }

    async fn on_questions(&mut self, questions: Vec<Question>) -> Option<String> {
        self.asked.push(questions);
        self.answers.pop_front()
    }
}

pub fn system(session_id: &str) -> Value {
    json!({"type": "system", "subtype": "init", "session_id": session_id})
}

pub fn assistant_text(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {"content": [{"type": "text", "text": text}]}
    })
}

pub fn result(text: &str) -> Value {
    json!({"type": "result", "is_error": false, "result": text})
}
