//! Control markers embedded in assistant text
//!
//! The agent signals completion with `<!-- FINISHED -->` and asks for human
//! input with `<!--QUESTION:{"questions":[...]}-->`. Both are protocol-internal
//! and are stripped before text reaches a human.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

static FINISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!--\s*FINISHED\s*-->").expect("finish marker pattern is valid")
});

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--QUESTION:(.*?)-->").expect("question marker pattern is valid")
});

/// How a question should be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    /// Free text
    Text,
    /// Pick one of the listed options
    Choice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Choice => "choice",
        }
    }
}

/// A question parsed from a QUESTION marker
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub question: String,
    pub header: String,
    /// `Choice` only when at least one option is present
    pub kind: QuestionType,
    /// Opaque option records, usually `{"label": ..., "description": ...}`
    pub options: Vec<Map<String, Value>>,
}

impl Question {
    /// Label of an option, falling back to its `value` field.
    pub fn option_label(option: &Map<String, Value>) -> &str {
        option
            .get("label")
            .or_else(|| option.get("value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

// A `null` field reads the same as a missing one.
#[derive(Deserialize)]
struct QuestionPayload {
    #[serde(default)]
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    header: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Option<Vec<Map<String, Value>>>,
}

impl From<RawQuestion> for Question {
    fn from(raw: RawQuestion) -> Self {
        let options = raw.options.unwrap_or_default();
        // An undeclared type with options is a choice; "choice" without options is not.
        let declared = raw
            .kind
            .as_deref()
            .filter(|kind| !kind.is_empty())
            .unwrap_or(QuestionType::Choice.as_str());
        let kind = if declared == QuestionType::Choice.as_str() && !options.is_empty() {
            QuestionType::Choice
        } else {
            QuestionType::Text
        };
        Self {
            question: raw.question.unwrap_or_default(),
            header: raw.header.unwrap_or_default(),
            kind,
            options,
        }
    }
}

/// Whether the text contains a finish marker.
pub fn is_finished(text: &str) -> bool {
    FINISHED_RE.is_match(text)
}

/// Remove finish markers and trim surrounding whitespace.
pub fn strip_finished(text: &str) -> String {
    FINISHED_RE.replace_all(text, "").trim().to_string()
}

/// Parse every QUESTION marker in the text, in order.
///
/// A marker whose body is not valid JSON is skipped; the others still count.
pub fn detect_questions(text: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    for caps in QUESTION_RE.captures_iter(text) {
        match serde_json::from_str::<QuestionPayload>(&caps[1]) {
            Ok(payload) => questions.extend(
                payload.questions.unwrap_or_default().into_iter().map(Question::from),
            ),
            Err(e) => debug!("Skipping malformed question marker: {}", e),
        }
    }
    questions
}

/// Remove both marker kinds and trim whitespace, for display.
pub fn strip_markers(text: &str) -> String {
    let without_questions = QUESTION_RE.replace_all(text, "");
    FINISHED_RE
        .replace_all(&without_questions, "")
        .trim()
        .to_string()
}
