//! IAM policy evaluator
//!
//! Validates a policy document and evaluates one request context against it.

use anyhow::{Context, Result};
use clap::Parser;
use iam_policy_engine::{EngineConfig, PolicyEngine, PolicyType, RequestContext};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "iam-eval")]
#[command(about = "Evaluate an AWS IAM policy against a simulated request")]
struct Args {
    /// Path to the policy document (JSON)
    #[arg(short = 'p', long)]
    policy: PathBuf,

    /// Path to the request context (JSON object)
    #[arg(short = 'c', long, required_unless_present = "variables")]
    context: Option<PathBuf>,

    /// Policy type (identity, resource, trust) [default: from config or identity]
    #[arg(short = 't', long = "type")]
    policy_type: Option<String>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,

    /// List the policy variables instead of evaluating
    #[arg(long)]
    variables: bool,
}

fn read_json(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn init_tracing(config: &EngineConfig) {
    let filter = match &config.log_filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(policy_type) = &args.policy_type {
        let policy_type: PolicyType = policy_type.parse().map_err(anyhow::Error::msg)?;
        config = config.with_policy_type(policy_type);
    }

    init_tracing(&config);

    let document = read_json(&args.policy)?;
    let engine = PolicyEngine::with_config(document, &config)
        .with_context(|| format!("invalid {}", config.policy_type.display_name()))?;

    info!(
        "Loaded {} from {:?}",
        engine.policy_type().display_name(),
        args.policy
    );

    if args.variables {
        let variables = engine.policy_variables();
        if args.json {
            println!("{}", json!({ "variables": variables }));
        } else {
            for variable in variables {
                println!("{}", variable);
            }
        }
        return Ok(());
    }

    let context_path = args
        .context
        .as_deref()
        .context("--context is required unless --variables is given")?;
    let context: RequestContext = serde_json::from_value(read_json(context_path)?)
        .with_context(|| format!("invalid request context in {}", context_path.display()))?;

    let decision = engine.evaluate(&context).context("evaluation failed")?;

    if args.json {
        println!(
            "{}",
            json!({
                "decision": decision,
                "allowed": decision.is_allowed(),
                "result": Option::<bool>::from(decision),
            })
        );
    } else {
        println!("{}", decision);
    }

    Ok(())
}
