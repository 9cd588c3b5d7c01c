//! Events decoded from the agent's line-delimited JSON stream
//!
//! The wire format has no stability contract, so nothing here rejects
//! unknown kinds or fields. Accessors return empty values when the shape
//! they look for is missing.

use serde_json::{Map, Value};

/// Event kind carrying the assistant's message blocks
pub const KIND_ASSISTANT: &str = "assistant";
/// Terminal event kind
pub const KIND_RESULT: &str = "result";

const MAX_TOOL_DESCRIPTION: usize = 100;

static NULL: Value = Value::Null;

/// One decoded protocol line
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: String,
    payload: Map<String, Value>,
}

impl Event {
    /// Build an event from an already-decoded JSON object.
    pub fn new(payload: Map<String, Value>) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { kind, payload }
    }

    /// Decode one line of agent output.
    ///
    /// Returns `None` for empty lines and for anything that is not a JSON object.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str::<Map<String, Value>>(line)
            .ok()
            .map(Self::new)
    }

    /// The `type` discriminator (empty if absent)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The raw JSON object
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Session id assigned by the agent, if this event carries one.
    pub fn session_id(&self) -> Option<&str> {
        self.payload
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_result(&self) -> bool {
        self.kind == KIND_RESULT
    }

    /// A result event with `is_error: true`. Always false for other kinds.
    pub fn is_error(&self) -> bool {
        self.is_result()
            && self
                .payload
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    /// The `result` string of a result event, empty otherwise.
    pub fn result_text(&self) -> &str {
        if !self.is_result() {
            return "";
        }
        self.payload
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// All `text` blocks of an assistant message, in order, joined by newline.
    pub fn text_content(&self) -> String {
        self.content_blocks()
            .filter(|block| block_type(block) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All `tool_use` blocks of an assistant message, in order.
    pub fn tool_uses(&self) -> Vec<ToolUse<'_>> {
        self.content_blocks()
            .filter(|block| block_type(block) == Some("tool_use"))
            .map(ToolUse)
            .collect()
    }

    fn content_blocks(&self) -> impl Iterator<Item = &Map<String, Value>> {
        let blocks: &[Value] = if self.kind == KIND_ASSISTANT {
            self.payload
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
        } else {
            &[]
        };
        blocks.iter().filter_map(Value::as_object)
    }
}

fn block_type(block: &Map<String, Value>) -> Option<&str> {
    block.get("type").and_then(Value::as_str)
}

/// A borrowed `tool_use` content block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolUse<'a>(&'a Map<String, Value>);

impl<'a> ToolUse<'a> {
    pub fn name(&self) -> &'a str {
        self.0.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Structured tool input (`Value::Null` if absent)
    pub fn input(&self) -> &'a Value {
        self.0.get("input").unwrap_or(&NULL)
    }

    /// The whole block as sent by the agent
    pub fn block(&self) -> &'a Map<String, Value> {
        self.0
    }

    /// One-line summary: the tool name plus its most telling input.
    pub fn describe(&self) -> String {
        let name = self.name();
        let input = self.input().as_object();
        let value = match (primary_input_key(name), input) {
            (Some(key), Some(input)) => input.get(key).map(display_value),
            (None, Some(input)) => input.values().next().map(display_value),
            _ => None,
        }
        .unwrap_or_default();

        format!("{}  {}", name, truncate(&value, MAX_TOOL_DESCRIPTION))
    }
}

fn primary_input_key(tool: &str) -> Option<&'static str> {
    match tool {
        "Bash" => Some("command"),
        "Read" | "Write" | "Edit" => Some("file_path"),
        "Glob" | "Grep" => Some("pattern"),
        "WebFetch" => Some("url"),
        "WebSearch" => Some("query"),
        "Task" => Some("description"),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> Event {
        match value {
            Value::Object(map) => Event::new(map),
            _ => panic!("Expected JSON object"),
        }
    }

    #[test]
    fn test_from_line_drops_garbage() {
        assert!(Event::from_line("").is_none());
        assert!(Event::from_line("   ").is_none());
        assert!(Event::from_line("not json").is_none());
        assert!(Event::from_line("{\"type\":").is_none());
        assert!(Event::from_line("[1,2,3]").is_none());
        assert!(Event::from_line("42").is_none());
    }

    #[test]
    fn test_from_line_reads_kind() {
        let e = Event::from_line(r#"{"type":"system","session_id":"sess-123"}"#).unwrap();
        assert_eq!(e.kind(), "system");
        assert_eq!(e.session_id(), Some("sess-123"));

        let untyped = Event::from_line(r#"{"foo":1}"#).unwrap();
        assert_eq!(untyped.kind(), "");
        assert_eq!(untyped.session_id(), None);
    }

    #[test]
    fn test_result_accessors() {
        let e = event(json!({"type": "result", "is_error": true, "result": "boom"}));
        assert!(e.is_result());
        assert!(e.is_error());
        assert_eq!(e.result_text(), "boom");

        let ok = event(json!({"type": "result", "result": "plan text"}));
        assert!(ok.is_result());
        assert!(!ok.is_error());
        assert_eq!(ok.result_text(), "plan text");
    }

    #[test]
    fn test_error_flag_ignored_outside_result() {
        let e = event(json!({"type": "assistant", "is_error": true, "result": "x"}));
        assert!(!e.is_result());
        assert!(!e.is_error());
        assert_eq!(e.result_text(), "");
    }

    #[test]
    fn test_text_content_and_tool_uses() {
        let e = event(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "a"},
                {"type": "tool_use", "name": "Bash", "input": {"command": "ls"}},
                {"type": "text", "text": "b"}
            ]}
        }));
        assert_eq!(e.text_content(), "a\nb");

        let tools = e.tool_uses();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "Bash");
        assert_eq!(tools[0].input()["command"], "ls");
    }

    #[test]
    fn test_text_content_only_for_assistant() {
        let e = event(json!({
            "type": "user",
            "message": {"content": [{"type": "text", "text": "hidden"}]}
        }));
        assert_eq!(e.text_content(), "");
        assert!(e.tool_uses().is_empty());

        let malformed = event(json!({"type": "assistant", "message": "oops"}));
        assert_eq!(malformed.text_content(), "");
    }

    #[test]
    fn test_tool_description() {
        let e = event(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "tool_use", "name": "Read", "input": {"file_path": "src/main.rs", "limit": 10}},
                {"type": "tool_use", "name": "Custom", "input": {"only": 7}},
                {"type": "tool_use", "name": "Bash", "input": {"command": "x".repeat(150)}}
            ]}
        }));
        let tools = e.tool_uses();
        assert_eq!(tools[0].describe(), "Read  src/main.rs");
        assert_eq!(tools[1].describe(), "Custom  7");
        let long = tools[2].describe();
        assert!(long.ends_with('…'));
        assert_eq!(long.chars().count(), "Bash  ".len() + 100 + 1);
    }
}
