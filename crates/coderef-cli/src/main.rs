//! CLI binary for coderef: build, persist and query code dependency graphs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coderef_core::analyzer::Analyzer;
use coderef_core::config::CoderefConfig;
use coderef_core::storage;
use coderef_nav::query::{QueryExecutor, QueryRequest, QueryType, ResultFormat};
use coderef_nav::traversal::{MultiHopTraversal, TraversalQuery};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "coderef", about = "Code dependency graph analyzer")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from an element JSON file and save it to .coderef/graph.json
    Analyze {
        /// JSON array of code elements
        elements: PathBuf,

        /// Print the analysis without writing the graph
        #[arg(long)]
        no_save: bool,
    },

    /// Run a query against the saved graph
    Query {
        /// what-calls, what-calls-me, what-imports, what-imports-me,
        /// what-depends-on, what-depends-on-me, shortest-path, all-paths
        query_type: String,

        /// Target node id
        target: String,

        /// Source node id (path queries)
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum depth
        #[arg(short, long)]
        depth: Option<usize>,

        /// Omit locations, paths and edges from results
        #[arg(long)]
        compact: bool,
    },

    /// Multi-hop traversal from a node
    Traverse {
        /// used-by, calls, depends-on
        query: String,

        /// Starting node id
        node: String,

        /// Maximum traversal depth (defaults to traversal.max_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Maximum number of results (defaults to traversal.max_results)
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Show graph statistics, cycles and isolated nodes
    Info,

    /// Print the saved graph in export format
    Export {
        /// Attach layout and color hints
        #[arg(long)]
        visualization: bool,
    },

    /// Report whether a graph is loaded and queryable
    Health,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Analyze { elements, no_save } => cmd_analyze(&project_root, &elements, no_save),
        Commands::Query {
            query_type,
            target,
            source,
            depth,
            compact,
        } => cmd_query(
            &project_root,
            &query_type,
            target,
            source,
            depth,
            compact,
        ),
        Commands::Traverse {
            query,
            node,
            depth,
            max_results,
        } => cmd_traverse(&project_root, &query, &node, depth, max_results),
        Commands::Info => cmd_info(&project_root),
        Commands::Export { visualization } => cmd_export(&project_root, visualization),
        Commands::Health => cmd_health(&project_root),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load config and the saved graph for a project.
fn load_analyzer(project_root: &Path) -> Result<Analyzer> {
    let config = CoderefConfig::load(project_root)?;
    if !storage::graph_exists(project_root) {
        anyhow::bail!("No graph found. Run `coderef analyze <elements.json>` first.");
    }
    let path = storage::graph_file(project_root);
    let mut analyzer = Analyzer::new(config);
    analyzer
        .load_graph(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(analyzer)
}

fn cmd_analyze(project_root: &Path, elements: &Path, no_save: bool) -> Result<()> {
    let config = CoderefConfig::load(project_root)?;
    let mut analyzer = Analyzer::new(config);
    let result = analyzer
        .analyze_file(elements)
        .with_context(|| format!("failed to analyze {}", elements.display()))?;

    if !no_save {
        let path = storage::graph_file(project_root);
        analyzer
            .save_graph(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        eprintln!("Saved to: {}", path.display());
    }

    print_json(&result)
}

fn cmd_query(
    project_root: &Path,
    query_type: &str,
    target: String,
    source: Option<String>,
    depth: Option<usize>,
    compact: bool,
) -> Result<()> {
    let query_type: QueryType = query_type.parse().map_err(anyhow::Error::msg)?;
    let analyzer = load_analyzer(project_root)?;
    let mut executor = QueryExecutor::new(analyzer.into_shared());

    let mut request = QueryRequest::new(query_type, target);
    request.source = source;
    request.max_depth = depth;
    if compact {
        request.format = Some(ResultFormat::Compact);
    }

    let response = executor.execute(&request);
    print_json(&response)?;
    if let Some(error) = &response.error {
        anyhow::bail!("{error}");
    }
    Ok(())
}

fn cmd_traverse(
    project_root: &Path,
    query: &str,
    node: &str,
    depth: Option<usize>,
    max_results: Option<usize>,
) -> Result<()> {
    let query = match query {
        "used-by" | "usedby" => TraversalQuery::UsedBy,
        "calls" => TraversalQuery::Calls,
        "depends-on" | "dependson" => TraversalQuery::DependsOn,
        _ => anyhow::bail!(
            "Unknown traversal: {}. Use 'used-by', 'calls' or 'depends-on'.",
            query
        ),
    };

    let analyzer = load_analyzer(project_root)?;
    let mut engine = MultiHopTraversal::new(analyzer.into_shared());
    if let Some(limit) = max_results {
        engine.set_max_results(limit);
    }

    match engine.traverse(node, query, depth) {
        Some(result) => print_json(&result),
        None => anyhow::bail!("Node not found: {}", node),
    }
}

fn cmd_info(project_root: &Path) -> Result<()> {
    let analyzer = load_analyzer(project_root)?;
    let result = analyzer
        .last_analysis()
        .context("graph loaded without analysis summary")?;
    print_json(result)
}

fn cmd_export(project_root: &Path, visualization: bool) -> Result<()> {
    let analyzer = load_analyzer(project_root)?;
    let exported = analyzer
        .export_graph_as_json()
        .context("no graph to export")?;
    let exported = if visualization && exported.visualization.is_none() {
        exported.with_visualization()
    } else {
        exported
    };
    print_json(&exported)
}

fn cmd_health(project_root: &Path) -> Result<()> {
    let config = CoderefConfig::load(project_root)?;
    let mut analyzer = Analyzer::new(config);
    if storage::graph_exists(project_root) {
        let path = storage::graph_file(project_root);
        if let Err(e) = analyzer.load_graph(&path) {
            tracing::warn!(path = %path.display(), error = %e, "saved graph could not be loaded");
        }
    }
    let executor = QueryExecutor::new(analyzer.into_shared());
    print_json(&executor.health_check())
}
