//! meshcheck CLI

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use meshcheck::common::inventory::{registry_status_from_yaml, RegistryStatus};
use meshcheck::common::telemetry::{init_logging, LogConfig};
use meshcheck::graph::TrafficMap;
use meshcheck::{badge_graph, Snapshot, ValidationConfig, ValidationEngine};

/// meshcheck - correctness checks for Istio service-mesh configuration
#[derive(Parser, Debug)]
#[command(name = "meshcheck", version, about, long_about = None)]
struct Cli {
    /// Path to a YAML engine configuration file
    #[arg(long, global = true, env = "MESHCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MESHCHECK_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the Istio objects of a snapshot and print the findings as JSON
    Validate(ValidateArgs),

    /// Badge a traffic graph with the Istio configuration of a namespace
    Badge(BadgeArgs),
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Multi-document YAML snapshot of cluster manifests
    snapshot: PathBuf,

    /// Only validate this namespace (all namespaces if not specified)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Worker threads for per-object checks (overrides the config file)
    #[arg(long)]
    workers: Option<usize>,

    /// YAML list of hostnames known to the mesh registry (e.g. remote clusters)
    #[arg(long, env = "MESHCHECK_REGISTRY_STATUS")]
    registry_status: Option<PathBuf>,

    /// Print only error and warning totals
    #[arg(long)]
    summary: bool,
}

#[derive(Args, Debug)]
struct BadgeArgs {
    /// Multi-document YAML snapshot of cluster manifests
    snapshot: PathBuf,

    /// Traffic map as JSON: node id to node
    #[arg(long)]
    graph: PathBuf,

    /// Namespace to badge
    #[arg(short, long)]
    namespace: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig {
        json: cli.json_logs,
        ..Default::default()
    })?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate(args) => run_validate(args, config),
        Commands::Badge(args) => run_badge(args, config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ValidationConfig> {
    let Some(path) = path else {
        return Ok(ValidationConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ValidationConfig::from_yaml(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    Snapshot::from_yaml(&content).with_context(|| format!("Invalid snapshot {}", path.display()))
}

fn load_registry_status(path: &Path) -> anyhow::Result<Vec<RegistryStatus>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry status {}", path.display()))?;
    registry_status_from_yaml(&content)
        .with_context(|| format!("Invalid registry status {}", path.display()))
}

fn run_validate(args: ValidateArgs, mut config: ValidationConfig) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
        config.validate()?;
    }

    let mut snapshot = load_snapshot(&args.snapshot)?;
    if let Some(path) = &args.registry_status {
        snapshot = snapshot.with_registry_status(load_registry_status(path)?);
    }
    let engine = ValidationEngine::new(config);

    let validations = match &args.namespace {
        Some(namespace) => engine.validate(&snapshot.context_for(namespace, engine.config())),
        None => engine.validate_snapshot(&snapshot),
    };

    let summary = validations.summary();
    info!(
        objects = summary.object_count,
        errors = summary.errors,
        warnings = summary.warnings,
        "validation finished"
    );

    let output = if args.summary {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string_pretty(&validations)?
    };
    println!("{output}");
    Ok(())
}

fn run_badge(args: BadgeArgs, config: ValidationConfig) -> anyhow::Result<()> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let content = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read traffic map {}", args.graph.display()))?;
    let mut traffic_map: TrafficMap = serde_json::from_str(&content)
        .with_context(|| format!("Invalid traffic map {}", args.graph.display()))?;

    badge_graph(&snapshot, &args.namespace, &config, &mut traffic_map);

    println!("{}", serde_json::to_string_pretty(&traffic_map)?);
    Ok(())
}
