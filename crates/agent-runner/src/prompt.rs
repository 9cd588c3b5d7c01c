//! User prompt assembly

use std::collections::BTreeMap;
use std::fmt::Write;

/// Pointer to the project knowledge directory, placed at the top of every prompt
pub const KNOWLEDGE_HINT: &str = "Additional project knowledge, architectural context, and past learnings can be found in `.spektacular/knowledge/`. Use your available tools to explore this directory as needed.";

/// Section title used by [`build_prompt`]
pub const DEFAULT_HEADER: &str = "Specification to Plan";

/// Builds the user prompt around a piece of content
#[derive(Debug, Clone)]
pub struct PromptBuilder<'a> {
    content: &'a str,
    header: &'a str,
    knowledge: Option<&'a BTreeMap<String, String>>,
    output_dir: Option<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            header: DEFAULT_HEADER,
            knowledge: None,
            output_dir: None,
        }
    }

    pub fn header(mut self, header: &'a str) -> Self {
        self.header = header;
        self
    }

    /// Inline knowledge files (name → content) as a Knowledge Base section
    pub fn knowledge(mut self, knowledge: &'a BTreeMap<String, String>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Tell the agent where to write plan output
    pub fn output_dir(mut self, dir: &'a str) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        out.push_str(KNOWLEDGE_HINT);
        out.push_str("\n\n");

        if let Some(knowledge) = self.knowledge.filter(|k| !k.is_empty()) {
            out.push_str("---\n\n# Knowledge Base\n\n");
            for (name, content) in knowledge {
                let _ = write!(out, "## {}\n\n{}\n\n", name, content.trim_end());
            }
        }

        if let Some(dir) = self.output_dir {
            let dir = dir.trim_end_matches('/');
            let _ = write!(
                out,
                "---\n\n# Output Directory\n\n\
                 Write the plan files into `{dir}/` using your Write tool:\n\n\
                 - `{dir}/plan.md` (required): the implementation plan\n\
                 - `{dir}/context.md`: architectural notes and key decisions\n\
                 - `{dir}/research.md`: relevant patterns and references\n\n",
                dir = dir
            );
        }

        let _ = write!(out, "---\n\n# {}\n\n{}", self.header, self.content);
        out
    }
}

/// Prompt for planning from a spec
pub fn build_prompt(spec_content: &str) -> String {
    PromptBuilder::new(spec_content).build()
}

/// Prompt with a custom section header
pub fn build_prompt_with_header(content: &str, header: &str) -> String {
    PromptBuilder::new(content).header(header).build()
}

/// Planning prompt that names the output directory
pub fn build_plan_prompt(spec_content: &str, plan_dir: &str) -> String {
    PromptBuilder::new(spec_content).output_dir(plan_dir).build()
}
