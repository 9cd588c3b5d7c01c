//! Project-file collaborators
//!
//! Knowledge files, spec files and plan directories live under `.spektacular/` in the
//! project root. The orchestrator never touches these; callers load content
//! here and hand plain text to the prompt builder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

pub const KNOWLEDGE_DIR: &str = ".spektacular/knowledge";
pub const PLANS_DIR: &str = ".spektacular/plans";
pub const SPECS_DIR: &str = ".spektacular/specs";

/// Required plan file
pub const PLAN_FILE: &str = "plan.md";
const CONTEXT_FILE: &str = "context.md";
const RESEARCH_FILE: &str = "research.md";

/// Sections of a spec file, in the order they are filled in
pub const SPEC_SECTIONS: [&str; 7] = [
    "Overview",
    "Requirements",
    "Acceptance Criteria",
    "Constraints",
    "Technical Approach",
    "Success Metrics",
    "Non-Goals",
];

/// Load every `.md` file under the knowledge directory, keyed by its path
/// relative to that directory. A missing directory yields an empty map.
pub async fn load_knowledge(project_path: &Path) -> BTreeMap<String, String> {
    let base = project_path.join(KNOWLEDGE_DIR);
    let mut knowledge = BTreeMap::new();
    let mut pending = vec![base.clone()];

    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                pending.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let key = path
                .strip_prefix(&base)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            knowledge.insert(key, content);
        }
    }

    debug!("Loaded {} knowledge files", knowledge.len());
    knowledge
}

/// Plan directory for a spec file: `.spektacular/plans/<spec stem>`.
pub fn plan_dir_for_spec(project_path: &Path, spec_file: &Path) -> PathBuf {
    let stem = spec_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    project_path.join(PLANS_DIR).join(stem)
}

/// Create the plan directory and remove any stale `plan.md`, so that
/// [`verify_plan_output`] only passes if the agent wrote a fresh one.
pub async fn prepare_plan_dir(plan_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(plan_dir).await?;
    let _ = tokio::fs::remove_file(plan_dir.join(PLAN_FILE)).await;
    Ok(())
}

/// Check that the agent produced `plan.md` in the plan directory.
pub async fn verify_plan_output(plan_dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(plan_dir.join(PLAN_FILE)).await? {
        Ok(())
    } else {
        Err(Error::PlanNotFound(format!(
            "agent did not produce {} in {}",
            PLAN_FILE,
            plan_dir.display()
        )))
    }
}

/// Combine the plan files into one document.
///
/// `plan.md` is required; `context.md` and `research.md` are included when
/// present. Each file is introduced by a `## <name>` heading.
pub async fn load_plan_content(plan_dir: &Path) -> Result<String> {
    let plan = tokio::fs::read_to_string(plan_dir.join(PLAN_FILE))
        .await
        .map_err(|e| Error::PlanNotFound(format!("{}: {}", plan_dir.display(), e)))?;

    let mut content = String::new();
    if let Ok(context) = tokio::fs::read_to_string(plan_dir.join(CONTEXT_FILE)).await {
        push_section(&mut content, CONTEXT_FILE, &context);
    }
    push_section(&mut content, PLAN_FILE, &plan);
    if let Ok(research) = tokio::fs::read_to_string(plan_dir.join(RESEARCH_FILE)).await {
        push_section(&mut content, RESEARCH_FILE, &research);
    }
    Ok(content)
}

fn push_section(buf: &mut String, name: &str, body: &str) {
    buf.push_str("## ");
    buf.push_str(name);
    buf.push('\n');
    buf.push_str(body);
    buf.push_str("\n\n");
}

/// Resolve a plan argument: a direct path, a path relative to `cwd`, or a
/// plan name under `.spektacular/plans/`.
pub async fn resolve_plan_dir(arg: &str, cwd: &Path) -> Result<PathBuf> {
    let candidates = [
        PathBuf::from(arg),
        cwd.join(arg),
        cwd.join(PLANS_DIR).join(arg),
    ];
    for dir in candidates {
        if tokio::fs::try_exists(dir.join(PLAN_FILE)).await.unwrap_or(false) {
            return Ok(dir);
        }
    }
    Err(Error::PlanNotFound(format!(
        "tried {}, {} and {}/{}",
        arg,
        cwd.join(arg).display(),
        PLANS_DIR,
        arg
    )))
}

/// Spec file for a name: `.spektacular/specs/<name>.md`.
pub fn spec_path_for_name(project_path: &Path, name: &str) -> PathBuf {
    let file = if name.ends_with(".md") {
        name.to_string()
    } else {
        format!("{}.md", name)
    };
    project_path.join(SPECS_DIR).join(file)
}

/// `search-v2_api` → `Search V2 Api`
pub fn title_from_name(name: &str) -> String {
    name.trim_end_matches(".md")
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write an empty spec with one heading per section unless the file exists.
///
/// Returns `true` when a new file was written.
pub async fn init_spec_skeleton(spec_path: &Path, title: &str) -> Result<bool> {
    if tokio::fs::try_exists(spec_path).await? {
        debug!("Spec {:?} already exists, keeping it", spec_path);
        return Ok(false);
    }
    if let Some(parent) = spec_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut content = format!("# {}\n\n", title);
    for section in SPEC_SECTIONS {
        content.push_str("## ");
        content.push_str(section);
        content.push_str("\n\n");
    }
    tokio::fs::write(spec_path, content).await?;
    Ok(true)
}
