use anyhow::Result;
use clap::Parser;
use mend::agent::RepairLoop;
use mend::config::{Config, RunSettings};
use mend::issue::Issue;
use mend::llm::OpenRouterClient;
use mend::sandbox::{LocalSandbox, Sandbox};
use mend::telemetry::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "mend",
    about = "Reproduce, locate, and fix a reported bug in a repository",
    version
)]
struct Args {
    /// Path to the issue file (JSON with id and problem_statement)
    issue: PathBuf,

    /// Path to the repository to repair (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    /// Fix-and-verify rounds before giving up
    #[arg(long, default_value = "3")]
    max_attempts: usize,

    /// Timeout in seconds for reproduction and verification runs
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Test command to run when verification trips an import error
    #[arg(long)]
    fallback_test_command: Option<String>,

    /// Model identifier (overrides the configured one)
    #[arg(long)]
    model: Option<String>,

    /// Emit logs as JSON instead of human-readable lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs, tracing::Level::INFO);

    let issue = Issue::from_json_file(&args.issue)?;

    let config = Config::load()?;
    let api_key = config.resolve_api_key().ok_or_else(|| {
        anyhow::anyhow!("No API key found. Set MEND_API_KEY or add one to the config file.")
    })?;
    let model = args.model.or_else(|| config.model.clone());
    let client = Arc::new(OpenRouterClient::new(api_key, model));

    let repo = args.repo.canonicalize()?;
    let sandbox: Box<dyn Sandbox> = Box::new(LocalSandbox::new(repo));

    let settings = RunSettings {
        max_attempts: args.max_attempts,
        repro_timeout: Duration::from_secs(args.timeout_secs),
        verify_timeout: Duration::from_secs(args.timeout_secs),
        fallback_test_command: args.fallback_test_command,
        ..RunSettings::default()
    };

    let mut agent = RepairLoop::new(issue, client, sandbox, settings);
    let success = agent.run().await;

    let patch = agent.patch();
    if !patch.is_empty() {
        println!("{}", patch);
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
