//! CLI command definitions for kataforge.
//!
//! Two commands: `run` executes an evaluation batch against an agent
//! endpoint, `parse` dumps the test cases decoded from a spec file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::agent::HttpAgent;
use crate::batch::{Batch, BatchRunner, ScheduleMode};
use crate::config::HarnessConfig;
use crate::executor::ExecutorConfig;
use crate::exercise::load_manifest;
use crate::feedback::ChatMentor;
use crate::run::Runner;
use crate::testspec::parse_spec;

/// Default agent endpoint.
const DEFAULT_AGENT_URL: &str = "http://localhost:4000/ask";

/// Default mentor chat-completions API base.
const DEFAULT_MENTOR_API_BASE: &str = "https://api.openai.com/v1";

/// Default mentor model.
const DEFAULT_MENTOR_MODEL: &str = "gpt-4o-mini";

/// Curriculum evaluation harness for code-generation agents.
#[derive(Parser)]
#[command(name = "kataforge")]
#[command(about = "Run algorithm exercises against a code-generation agent")]
#[command(version)]
#[command(
    long_about = "kataforge drives a code-generation agent through a manifest of algorithm \
exercises, executes the extracted code against an external interpreter, scores it, and \
optionally closes the loop with mentoring feedback.\n\nExample usage:\n  kataforge run \
--manifest ./exercises.yaml --workers 4 --docs ./docs"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run an evaluation batch from an exercise manifest.
    Run(RunArgs),

    /// Parse a test spec file and dump the decoded cases as JSON.
    Parse(ParseArgs),
}

/// Arguments for `kataforge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the YAML exercise manifest.
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Agent endpoint URL.
    #[arg(long, default_value = DEFAULT_AGENT_URL)]
    pub agent_url: String,

    /// Agent API key (can also be set via KATAFORGE_AGENT_KEY).
    #[arg(long, env = "KATAFORGE_AGENT_KEY")]
    pub agent_key: Option<String>,

    /// Agent call timeout in seconds.
    #[arg(long, default_value = "120")]
    pub agent_timeout: u64,

    /// Mentor chat-completions API base.
    #[arg(long, default_value = DEFAULT_MENTOR_API_BASE)]
    pub mentor_api_base: String,

    /// Mentor model name.
    #[arg(long, default_value = DEFAULT_MENTOR_MODEL)]
    pub mentor_model: String,

    /// Mentor API key (can also be set via KATAFORGE_MENTOR_KEY).
    #[arg(long, env = "KATAFORGE_MENTOR_KEY")]
    pub mentor_key: Option<String>,

    /// Interpreter binary used to execute candidate code.
    #[arg(long, default_value = "python3")]
    pub interpreter: String,

    /// File extension for staged programs.
    #[arg(long, default_value = "py")]
    pub extension: String,

    /// Invocation template appended to candidate code, with `{name}`
    /// and `{args}` placeholders.
    #[arg(long, default_value = "print({name}({args}))")]
    pub call_template: String,

    /// Per-case execution timeout in seconds.
    #[arg(long, default_value = "10")]
    pub exec_timeout: u64,

    /// Directory holding conflicting-algorithm teaching docs.
    #[arg(long, default_value = "./docs")]
    pub docs: PathBuf,

    /// Number of concurrent runs; 1 means strictly sequential.
    #[arg(short, long, default_value = "1")]
    pub workers: usize,

    /// Disable the mentoring feedback round.
    #[arg(long)]
    pub no_feedback: bool,

    /// Write per-run outcomes as JSON to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the batch summary as JSON instead of plain text.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `kataforge parse`.
#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Path to the test spec file.
    #[arg(short, long)]
    pub spec: PathBuf,
}

/// Parse command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the kataforge CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_batch_command(args).await?,
        Commands::Parse(args) => run_parse_command(args)?,
    }
    Ok(())
}

async fn run_batch_command(args: RunArgs) -> anyhow::Result<()> {
    let exercises = load_manifest(&args.manifest)?;
    info!(
        manifest = %args.manifest.display(),
        exercises = exercises.len(),
        "Loaded exercise manifest"
    );

    let mut agent = HttpAgent::new(&args.agent_url, Duration::from_secs(args.agent_timeout));
    if let Some(ref key) = args.agent_key {
        agent = agent.with_api_key(key);
    }

    let mut mentor = ChatMentor::new(
        &args.mentor_api_base,
        &args.mentor_model,
        Duration::from_secs(args.agent_timeout),
    );
    if let Some(ref key) = args.mentor_key {
        mentor = mentor.with_api_key(key);
    }

    let executor = ExecutorConfig::new(&args.interpreter)
        .with_file_extension(&args.extension)
        .with_call_template(&args.call_template)
        .with_timeout(Duration::from_secs(args.exec_timeout));

    let config = HarnessConfig::new()
        .with_executor(executor)
        .with_docs_dir(&args.docs)
        .with_feedback(!args.no_feedback);

    let runner = Arc::new(Runner::new(Arc::new(agent), Arc::new(mentor), config));
    let mode = if args.workers <= 1 {
        ScheduleMode::Sequential
    } else {
        ScheduleMode::Bounded(args.workers)
    };

    let mut batch = Batch::new();
    let result = BatchRunner::new(runner, mode).run(exercises, &mut batch).await;

    if let Some(ref path) = args.output {
        std::fs::write(path, serde_json::to_string_pretty(batch.outcomes())?)?;
        info!(output = %path.display(), runs = batch.outcomes().len(), "Wrote outcomes");
    }

    let summary = batch.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Batch {}", batch.id());
        println!("  runs:       {}", summary.total);
        println!("  failed:     {}", summary.failed);
        println!("  mean score: {:.3}", summary.mean_score);
        if let Some(latency) = summary.mean_task_latency {
            println!("  mean task latency:  {:.2}s", latency.as_secs_f64());
        }
        if let Some(latency) = summary.mean_teach_latency {
            println!("  mean teach latency: {:.2}s", latency.as_secs_f64());
        }
    }

    // The batch aborted; surface the corpus error after reporting what
    // did complete.
    result.map_err(anyhow::Error::from)
}

fn run_parse_command(args: ParseArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.spec)?;
    let cases = parse_spec(&text)?;

    println!("{}", serde_json::to_string_pretty(&cases)?);
    Ok(())
}
