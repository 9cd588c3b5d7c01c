//! Plain-terminal observer: prints agent output, reads answers from stdin

use std::io::Write;

use agent_runner::{Question, QuestionType, StepObserver, ToolUse};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// Prints to `out` and reads one answer line from `input` per question
pub struct ConsoleObserver<R, W> {
    input: R,
    out: W,
}

impl ConsoleObserver<BufReader<Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }
}

impl<R, W> ConsoleObserver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    fn print_question(&mut self, question: &Question) -> std::io::Result<()> {
        writeln!(self.out)?;
        if question.header.is_empty() {
            writeln!(self.out, "? {}", question.question)?;
        } else {
            writeln!(self.out, "? [{}] {}", question.header, question.question)?;
        }
        for (index, option) in question.options.iter().enumerate() {
            let label = Question::option_label(option);
            match option.get("description").and_then(|d| d.as_str()) {
                Some(description) if !description.is_empty() => {
                    writeln!(self.out, "  {}. {} - {}", index + 1, label, description)?
                }
                _ => writeln!(self.out, "  {}. {}", index + 1, label)?,
            }
        }
        write!(self.out, "> ")?;
        self.out.flush()
    }

    async fn read_answer(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()).filter(|answer| !answer.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read answer: {}", e);
                None
            }
        }
    }
}

/// Separator between answers when one round asks several questions
const ANSWER_SEPARATOR: &str = "\n\n---\n\n";

/// Replace a bare option number of a choice question with that option's label.
fn expand_choice(question: &Question, answer: String) -> String {
    if question.kind != QuestionType::Choice {
        return answer;
    }
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| question.options.get(index))
        .map(|option| Question::option_label(option).to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or(answer)
}

#[async_trait]
impl<R, W> StepObserver for ConsoleObserver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    fn on_text(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn on_tool(&mut self, tool: &ToolUse<'_>) {
        let _ = writeln!(self.out, "  > {}", tool.describe());
    }

    /// One answer line per question. EOF or a blank line abandons the round.
    async fn on_questions(&mut self, questions: Vec<Question>) -> Option<String> {
        let mut answers = Vec::with_capacity(questions.len());
        for question in &questions {
            if let Err(e) = self.print_question(question) {
                tracing::warn!("Failed to print question: {}", e);
            }
            let answer = self.read_answer().await?;
            answers.push(expand_choice(question, answer));
        }
        Some(answers.join(ANSWER_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_runner::markers::detect_questions;

    const CHOICE: &str = r#"<!--QUESTION:{"questions":[{"question":"Which database?","header":"Storage","options":[{"label":"Postgres","description":"managed"},{"label":"SQLite"}]}]}-->"#;
    const TEXT: &str = r#"<!--QUESTION:{"questions":[{"question":"Any deadline?"}]}-->"#;

    fn observer(input: &'static str) -> ConsoleObserver<&'static [u8], Vec<u8>> {
        ConsoleObserver::new(input.as_bytes(), Vec::new())
    }

    #[tokio::test]
    async fn test_prints_question_with_numbered_options() {
        let mut console = observer("SQLite\n");
        let answer = console.on_questions(detect_questions(CHOICE)).await;
        assert_eq!(answer.as_deref(), Some("SQLite"));

        let printed = String::from_utf8(console.out).unwrap();
        assert!(printed.contains("? [Storage] Which database?"));
        assert!(printed.contains("  1. Postgres - managed"));
        assert!(printed.contains("  2. SQLite"));
        assert!(printed.ends_with("> "));
    }

    #[tokio::test]
    async fn test_option_number_selects_label() {
        let mut console = observer("1\n");
        let answer = console.on_questions(detect_questions(CHOICE)).await;
        assert_eq!(answer.as_deref(), Some("Postgres"));
    }

    #[tokio::test]
    async fn test_out_of_range_number_is_kept_verbatim() {
        let mut console = observer("7\n");
        let answer = console.on_questions(detect_questions(CHOICE)).await;
        assert_eq!(answer.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_text_question_takes_line_as_is() {
        let mut console = observer("  next Friday \n");
        let answer = console.on_questions(detect_questions(TEXT)).await;
        assert_eq!(answer.as_deref(), Some("next Friday"));
    }

    #[tokio::test]
    async fn test_eof_means_no_answer() {
        let mut console = observer("");
        assert_eq!(console.on_questions(detect_questions(TEXT)).await, None);
    }

    #[tokio::test]
    async fn test_blank_line_means_no_answer() {
        let mut console = observer("\n");
        assert_eq!(console.on_questions(detect_questions(TEXT)).await, None);
    }

    #[tokio::test]
    async fn test_each_question_gets_its_own_line() {
        let two = r#"<!--QUESTION:{"questions":[{"question":"Name?"},{"question":"Deadline?"}]}-->"#;
        let mut console = observer("Alice\nFriday\n");
        let answer = console.on_questions(detect_questions(two)).await;
        assert_eq!(answer.as_deref(), Some("Alice\n\n---\n\nFriday"));

        let printed = String::from_utf8(console.out).unwrap();
        let name = printed.find("? Name?").unwrap();
        let deadline = printed.find("? Deadline?").unwrap();
        assert!(name < deadline);
    }

    #[tokio::test]
    async fn test_choice_numbers_expand_per_question() {
        let mixed = r#"<!--QUESTION:{"questions":[{"question":"DB?","options":[{"label":"Postgres"},{"label":"SQLite"}]},{"question":"Why?"}]}-->"#;
        let mut console = observer("2\n2\n");
        let answer = console.on_questions(detect_questions(mixed)).await;
        assert_eq!(answer.as_deref(), Some("SQLite\n\n---\n\n2"));
    }

    #[tokio::test]
    async fn test_eof_mid_round_means_no_answer() {
        let two = r#"<!--QUESTION:{"questions":[{"question":"Name?"},{"question":"Deadline?"}]}-->"#;
        let mut console = observer("Alice\n");
        assert_eq!(console.on_questions(detect_questions(two)).await, None);
    }

    #[test]
    fn test_text_is_printed() {
        let mut console = observer("");
        console.on_text("Drafting the plan");
        assert_eq!(String::from_utf8(console.out).unwrap(), "Drafting the plan\n");
    }
}
