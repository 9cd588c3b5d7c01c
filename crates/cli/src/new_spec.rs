//! Interactive spec creation: one agent step per spec section

use std::path::Path;

use agent_runner::prompt::build_prompt_with_header;
use agent_runner::{Prompts, Step};
use serde_json::json;
use spek_core::project::SPEC_SECTIONS;

/// Label shared by every section step, so they append to one debug log
pub const LABEL: &str = "new-spec";

/// Used when no `--system-prompt` is given
pub const DEFAULT_SYSTEM_PROMPT: &str = "You help a developer write a feature specification. \
Work on one section at a time, ask questions only through the QUESTION marker format you are \
given, keep the spec file's headings intact, and end each session with <!-- FINISHED --> once \
the section is written.";

struct Section {
    title: &'static str,
    question: &'static str,
    /// How to turn the answer into section content
    write: &'static str,
}

const SECTIONS: [Section; 7] = [
    Section {
        title: "Overview",
        question: "Describe this feature in 2-3 sentences: what is being built, what problem it solves, and who benefits.",
        write: "If the answer is vague, ask one clarifying question in the same format. Then write the Overview section.",
    },
    Section {
        title: "Requirements",
        question: "List the testable behaviours this feature must deliver, one per line (\"Users can...\", \"The system must...\").",
        write: "Write them to the Requirements section as a markdown checklist: `- [ ] **Title** - description`.",
    },
    Section {
        title: "Acceptance Criteria",
        question: "Requirement [N] of [total]: [title]. What pass/fail condition proves it is done?",
        write: "First list the requirements found in the spec. Ask this question for one requirement per turn, \
replacing the placeholders, and stop after each question. Accept vague answers after two clarification rounds. \
After the last requirement write all criteria to the Acceptance Criteria section.",
    },
    Section {
        title: "Constraints",
        question: "Which hard constraints must the solution work within? Leave blank if none.",
        write: "Write the answer to the Constraints section, or `None.` if it is blank.",
    },
    Section {
        title: "Technical Approach",
        question: "Is any technical direction already decided (architecture, patterns, integrations, known risks)? Leave blank to let the planner decide.",
        write: "Write the answer to the Technical Approach section, or `None.` if it is blank.",
    },
    Section {
        title: "Success Metrics",
        question: "How will you know the feature works well after delivery? Leave blank if not applicable.",
        write: "Write the answer to the Success Metrics section, or `None.` if it is blank.",
    },
    Section {
        title: "Non-Goals",
        question: "What is explicitly out of scope? Leave blank if nothing is excluded.",
        write: "Write the answer to the Non-Goals section, or `None.` if it is blank.",
    },
];

/// Introduction printed before the first step
pub fn preamble(name: &str) -> String {
    format!(
        "Creating spec: {}\nSections: {}\n",
        name,
        SPEC_SECTIONS.join(" -> ")
    )
}

/// The section steps for a spec file, in order
pub fn section_steps(spec_path: &Path, system_prompt: &str) -> Vec<Step> {
    SECTIONS
        .iter()
        .map(|section| {
            let user = build_prompt_with_header(&section_task(section, spec_path), section.title);
            Step::new(Prompts::new(user).with_system(system_prompt)).with_label(LABEL)
        })
        .collect()
}

fn section_task(section: &Section, spec_path: &Path) -> String {
    let marker = json!({
        "questions": [{
            "question": section.question,
            "header": section.title,
            "type": "text",
        }]
    });
    format!(
        "The spec file is at '{path}'. Read it.\n\n\
         Your task for this session: collect the **{title}** section only.\n\n\
         Ask the user this question:\n\n\
         <!--QUESTION:{marker}-->\n\n\
         {write}\n\n\
         Then output:\n\n\
         <!-- FINISHED -->",
        path = spec_path.display(),
        title = section.title,
        marker = marker,
        write = section.write,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use agent_runner::markers::{detect_questions, is_finished};
    use agent_runner::{run_steps, Event, RunHandle, RunOptions, Runner};
    use spek_core::Config;

    use crate::console::ConsoleObserver;

    /// Asks one question in each new session and finishes once resumed
    #[derive(Default)]
    struct SectionAgent {
        calls: Mutex<Vec<RunOptions>>,
    }

    impl Runner for SectionAgent {
        fn run(&self, options: RunOptions) -> RunHandle {
            let mut calls = self.calls.lock().unwrap();
            let lines = match &options.session_id {
                None => vec![
                    json!({"type": "system", "session_id": format!("sess-{}", calls.len())}),
                    json!({"type": "assistant", "message": {"content": [{"type": "text",
                        "text": r#"<!--QUESTION:{"questions":[{"question":"Your input?"}]}-->"#}]}}),
                ],
                Some(_) => vec![
                    json!({"type": "assistant", "message": {"content": [{"type": "text",
                        "text": "Section written. <!-- FINISHED -->"}]}}),
                    json!({"type": "result", "is_error": false, "result": "ok"}),
                ],
            };
            calls.push(options);

            RunHandle::spawn(move |tx| async move {
                for line in lines {
                    if let Some(event) = Event::from_line(&line.to_string()) {
                        let _ = tx.send(event).await;
                    }
                }
                Ok(())
            })
        }
    }

    #[test]
    fn test_one_step_per_section_in_order() {
        let steps = section_steps(Path::new("/p/.spektacular/specs/search.md"), "sys");
        assert_eq!(steps.len(), SPEC_SECTIONS.len());

        for (step, title) in steps.iter().zip(SPEC_SECTIONS) {
            assert_eq!(step.label, LABEL);
            assert_eq!(step.prompts.system.as_deref(), Some("sys"));
            assert!(step.prompts.user.contains("'/p/.spektacular/specs/search.md'"));
            assert!(step.prompts.user.contains(&format!("# {}\n\n", title)));
        }
    }

    #[test]
    fn test_each_section_embeds_a_parsable_question() {
        for step in section_steps(Path::new("spec.md"), "sys") {
            let questions = detect_questions(&step.prompts.user);
            assert_eq!(questions.len(), 1);
            assert!(!questions[0].question.is_empty());
            assert!(is_finished(&step.prompts.user));
        }
    }

    #[test]
    fn test_preamble_lists_sections() {
        let text = preamble("search");
        assert!(text.contains("Creating spec: search"));
        assert!(text.contains("Overview -> Requirements"));
        assert!(text.ends_with("Non-Goals\n"));
    }

    #[tokio::test]
    async fn test_sections_run_as_one_sequence() {
        let steps = section_steps(Path::new(".spektacular/specs/search.md"), "sys");
        let answers: String = (1..=steps.len()).map(|n| format!("answer {}\n", n)).collect();
        let mut observer = ConsoleObserver::new(answers.as_bytes(), Vec::new());
        let agent = SectionAgent::default();

        let outcomes = run_steps(&agent, &steps, &Config::default(), "/tmp", &mut observer)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), SPEC_SECTIONS.len());
        assert!(outcomes.iter().all(|o| o.invocations == 2 && o.signalled));

        let calls = agent.calls.lock().unwrap();
        assert_eq!(calls.len(), 2 * SPEC_SECTIONS.len());
        for (index, pair) in calls.chunks(2).enumerate() {
            assert!(pair[0].prompts.user.contains(SPEC_SECTIONS[index]));
            assert_eq!(pair[0].session_id, None);
            assert_eq!(pair[1].session_id, Some(format!("sess-{}", 2 * index)));
            assert_eq!(pair[1].prompts.user, format!("answer {}", index + 1));
        }
    }
}
