//! `spek` - turns specs into plans and plans into code with an agent CLI.

mod console;
mod new_spec;

use std::path::{Path, PathBuf};

use agent_runner::prompt::{build_prompt_with_header, PromptBuilder};
use agent_runner::{run_steps, Prompts, RunnerRegistry, Step, StepOutcome};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spek_core::{project, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::console::ConsoleObserver;

const IMPLEMENT_HEADER: &str = "Implementation Plan";

#[derive(Debug, Parser)]
#[command(name = "spek", version, about = "Drive an agent CLI from spec to plan to code")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a spec interactively, one section per agent session.
    New {
        /// Spec name; the file is `.spektacular/specs/<name>.md`.
        name: String,
        #[arg(long)]
        system_prompt: Option<PathBuf>,
    },
    /// Generate a plan from a specification file.
    Plan {
        /// Markdown specification.
        spec_file: PathBuf,
        /// File whose content is sent as the agent's system prompt.
        #[arg(long)]
        system_prompt: Option<PathBuf>,
        /// Embed `.spektacular/knowledge/` files in the prompt.
        #[arg(long)]
        inline_knowledge: bool,
    },
    /// Implement a plan: a plan directory path or a plan name.
    Implement {
        plan: String,
        #[arg(long)]
        system_prompt: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spek=info,agent_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let config = Config::load_for_project(&cwd).await?;
    config.validate()?;

    match cli.command {
        Command::New {
            name,
            system_prompt,
        } => cmd_new(&cwd, &config, &name, system_prompt.as_deref()).await,
        Command::Plan {
            spec_file,
            system_prompt,
            inline_knowledge,
        } => cmd_plan(&cwd, &config, &spec_file, system_prompt.as_deref(), inline_knowledge).await,
        Command::Implement {
            plan,
            system_prompt,
        } => cmd_implement(&cwd, &config, &plan, system_prompt.as_deref()).await,
    }
}

async fn cmd_new(
    cwd: &Path,
    config: &Config,
    name: &str,
    system_prompt: Option<&Path>,
) -> Result<()> {
    let spec_path = project::spec_path_for_name(cwd, name);
    if project::init_spec_skeleton(&spec_path, &project::title_from_name(name)).await? {
        tracing::info!("Created spec skeleton {:?}", spec_path);
    }

    let system = match system_prompt {
        Some(path) => read_system_prompt(path).await?,
        None => new_spec::DEFAULT_SYSTEM_PROMPT.to_string(),
    };
    let relative = spec_path.strip_prefix(cwd).unwrap_or(&spec_path);
    let steps = new_spec::section_steps(relative, &system);

    println!("{}", new_spec::preamble(name));
    execute(cwd, config, &steps).await?;

    println!("\nCreated spec: {}", spec_path.display());
    Ok(())
}

async fn cmd_plan(
    cwd: &Path,
    config: &Config,
    spec_file: &Path,
    system_prompt: Option<&Path>,
    inline_knowledge: bool,
) -> Result<()> {
    let spec = tokio::fs::read_to_string(spec_file)
        .await
        .with_context(|| format!("read spec {}", spec_file.display()))?;

    let plan_dir = project::plan_dir_for_spec(cwd, spec_file);
    project::prepare_plan_dir(&plan_dir).await?;
    let relative = plan_dir.strip_prefix(cwd).unwrap_or(&plan_dir);
    let relative = relative.to_string_lossy();

    let knowledge = if inline_knowledge {
        project::load_knowledge(cwd).await
    } else {
        Default::default()
    };
    let user = PromptBuilder::new(&spec)
        .knowledge(&knowledge)
        .output_dir(&relative)
        .build();

    let step = Step::new(prompts(user, system_prompt).await?).with_label("plan");
    execute(cwd, config, &[step]).await?;

    project::verify_plan_output(&plan_dir).await?;
    println!("\nPlan written to {}", plan_dir.display());
    Ok(())
}

async fn cmd_implement(
    cwd: &Path,
    config: &Config,
    plan: &str,
    system_prompt: Option<&Path>,
) -> Result<()> {
    let plan_dir = project::resolve_plan_dir(plan, cwd).await?;
    let content = project::load_plan_content(&plan_dir).await?;
    let user = build_prompt_with_header(&content, IMPLEMENT_HEADER);

    let step = Step::new(prompts(user, system_prompt).await?).with_label("implement");
    execute(cwd, config, &[step]).await?;

    println!("\nImplementation of {} complete", plan_dir.display());
    Ok(())
}

async fn prompts(user: String, system_prompt: Option<&Path>) -> Result<Prompts> {
    let prompts = Prompts::new(user);
    match system_prompt {
        Some(path) => Ok(prompts.with_system(read_system_prompt(path).await?)),
        None => Ok(prompts),
    }
}

async fn read_system_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read system prompt {}", path.display()))
}

async fn execute(cwd: &Path, config: &Config, steps: &[Step]) -> Result<Vec<StepOutcome>> {
    let runner = RunnerRegistry::default().for_config(config)?;
    let mut observer = ConsoleObserver::stdio();

    let outcomes = run_steps(runner.as_ref(), steps, config, cwd, &mut observer).await?;
    for outcome in &outcomes {
        tracing::info!(
            session_id = ?outcome.session_id,
            invocations = outcome.invocations,
            "step finished"
        );
    }
    Ok(outcomes)
}
