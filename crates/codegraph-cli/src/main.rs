use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use codegraph_core::knowledge::{
    Analytics, FactBatch, IngestReport, KnowledgeGraph, KnowledgeStore, PatternRequest, QueryNode,
};
use codegraph_core::{Config, KnowledgeError};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Build and query code knowledge graphs from parser facts", long_about = None)]
struct Cli {
    /// Config file (defaults to ./codegraph.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from a fact file or directory and persist it
    Ingest {
        /// JSON/YAML fact file or directory of them
        path: PathBuf,
        /// Build in memory only
        #[arg(long)]
        no_persist: bool,
    },
    /// Run a query tree document (inline JSON or @file)
    Query {
        #[arg(long)]
        facts: PathBuf,
        document: String,
    },
    /// Run a structural pattern request (inline JSON or @file)
    Pattern {
        #[arg(long)]
        facts: PathBuf,
        document: String,
    },
    /// Expand the call graph below a function id
    CallGraph {
        #[arg(long)]
        facts: PathBuf,
        function_id: String,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Types reachable from a type
    Subgraph {
        #[arg(long)]
        facts: PathBuf,
        type_name: String,
        module: String,
        /// Keep only types whose module contains this substring
        #[arg(long)]
        module_filter: Option<String>,
    },
    /// Cross-module call coupling
    Coupling {
        #[arg(long)]
        facts: PathBuf,
    },
    /// Functions ranked by keyword complexity
    Complex {
        #[arg(long)]
        facts: PathBuf,
        #[arg(long)]
        threshold: Option<usize>,
    },
    /// Entity and edge counts
    Stats {
        #[arg(long)]
        facts: PathBuf,
    },
    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(&config);
    debug!(data_dir = %config.storage.data_dir, "configuration loaded");

    if let Err(e) = run(cli.command, config).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, KnowledgeError> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(command: Commands, config: Config) -> Result<(), KnowledgeError> {
    match command {
        Commands::Ingest { path, no_persist } => {
            let kg = if no_persist {
                KnowledgeGraph::in_memory(config)
            } else {
                KnowledgeGraph::open(config).await?
            };
            kg.initialize().await?;

            let spinner = spinner(&format!("Ingesting {}", path.display()));
            let report = kg.ingest_path(&path).await;
            spinner.finish_and_clear();

            print_ingest_report(&report?);
        }
        Commands::Query { facts, document } => {
            let kg = load_snapshot(&facts, config).await?;
            let query: QueryNode = serde_json::from_value(read_document(&document)?)
                .map_err(|e| KnowledgeError::query(e.to_string()))?;
            print_json(&kg.query(&query).await?)?;
        }
        Commands::Pattern { facts, document } => {
            let kg = load_snapshot(&facts, config).await?;
            let request = PatternRequest::from_value(&read_document(&document)?)?;
            print_json(&kg.pattern(&request).await?)?;
        }
        Commands::CallGraph {
            facts,
            function_id,
            depth,
        } => {
            let depth = depth.unwrap_or(config.graph.default_call_depth);
            let kg = load_snapshot(&facts, config).await?;
            print_json(&kg.call_graph(&function_id, depth).await?)?;
        }
        Commands::Subgraph {
            facts,
            type_name,
            module,
            module_filter,
        } => {
            let kg = load_snapshot(&facts, config).await?;
            let reached = kg
                .reachable_types(&type_name, &module, module_filter.as_deref())
                .await?;
            print_json(&reached)?;
        }
        Commands::Coupling { facts } => {
            let kg = load_snapshot(&facts, config).await?;
            let graph = kg.snapshot().await;
            print_json(&Analytics::new(&graph, &kg.config().graph).analyze_module_coupling())?;
        }
        Commands::Complex { facts, threshold } => {
            let threshold = threshold.unwrap_or(config.graph.complexity_threshold);
            let kg = load_snapshot(&facts, config).await?;
            let graph = kg.snapshot().await;
            print_json(&Analytics::new(&graph, &kg.config().graph).find_complex_functions(threshold))?;
        }
        Commands::Stats { facts } => {
            let kg = load_snapshot(&facts, config).await?;
            print_json(&kg.get_stats().await?)?;
        }
        Commands::Config => {
            print!("{}", Config::default_config_string());
        }
    }
    Ok(())
}

/// Build an in-memory snapshot for a read-only command.
async fn load_snapshot(facts: &Path, config: Config) -> Result<KnowledgeGraph, KnowledgeError> {
    let kg = KnowledgeGraph::in_memory(config);
    let spinner = spinner(&format!("Loading {}", facts.display()));
    let batch = FactBatch::load(facts);
    let result = match batch {
        Ok(batch) => kg.ingest(batch).await.map(|_| ()),
        Err(e) => Err(e),
    };
    spinner.finish_and_clear();
    result?;
    Ok(kg)
}

/// Inline JSON, or `@path` to read it from a file.
fn read_document(arg: &str) -> Result<serde_json::Value, KnowledgeError> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|e| KnowledgeError::io(path, e))?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_json<T: Serialize>(value: &T) -> Result<(), KnowledgeError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    println!("{}", report.stats);
    if let Some(persisted) = &report.persisted {
        println!(
            "  persisted {} nodes, {} edges in {} batches",
            persisted.nodes, persisted.edges, persisted.batches
        );
    }
    if !report.diagnostics.is_empty() {
        println!("  {} diagnostics:", report.diagnostics.len());
        for diagnostic in report.diagnostics.iter().take(20) {
            println!("    {}", diagnostic);
        }
        if report.diagnostics.len() > 20 {
            println!("    ... {} more", report.diagnostics.len() - 20);
        }
    }
}
