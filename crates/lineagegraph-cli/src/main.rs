use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use lineagegraph_core::{
    units_from_path, CollapseOverrideSet, ConfigManager, LoggingConfig, NamespaceFilterState,
    NodePayload, RenderGraph, StatementLineageUnit, ViewMode,
};
use lineagegraph_graph::{
    build_graph, find_search_match_ids, BuildOptions, ImpactIndex, ImpactResult, TraversalConfig,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lineagegraph")]
#[command(about = "LineageGraph CLI - SQL lineage views, impact analysis and search", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Explicit configuration file
    #[arg(long, global = true, env = "LINEAGEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the render graph for one view
    Render {
        #[command(flatten)]
        graph: GraphArgs,

        /// Selected node or column id
        #[arg(long)]
        select: Option<String>,

        /// Search term to highlight
        #[arg(long)]
        search: Option<String>,
    },

    /// Print every element connected to the start ids
    Impact {
        #[command(flatten)]
        graph: GraphArgs,

        /// Start node, column or edge ids (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        start: Vec<String>,

        /// Maximum edge hops per direction
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Print element ids matching a search term
    Search {
        #[command(flatten)]
        graph: GraphArgs,

        /// Search term
        term: String,
    },
}

#[derive(Args)]
struct GraphArgs {
    /// JSON file with statement lineage units
    #[arg(short, long)]
    input: PathBuf,

    /// View mode (table, column, script, hybrid)
    #[arg(long, default_value = "table")]
    view: ViewMode,

    /// Node ids whose collapse state is flipped (comma-separated)
    #[arg(long, value_delimiter = ',')]
    collapse: Vec<String>,

    /// Schemas to include (comma-separated)
    #[arg(long, value_delimiter = ',')]
    schema: Vec<String>,

    /// Databases to include (comma-separated)
    #[arg(long, value_delimiter = ',')]
    database: Vec<String>,
}

impl GraphArgs {
    fn load_units(&self) -> Result<Vec<StatementLineageUnit>> {
        units_from_path(&self.input)
            .with_context(|| format!("Failed to load lineage from {}", self.input.display()))
    }

    fn options(&self, base: &BuildOptions) -> BuildOptions {
        base.clone()
            .with_collapse_overrides(self.collapse.iter().cloned().collect::<CollapseOverrideSet>())
            .with_namespace_filter(NamespaceFilterState::new(
                self.schema.clone(),
                self.database.clone(),
            ))
    }
}

#[derive(Serialize)]
struct ImpactOutput {
    starts: Vec<String>,
    connected: Vec<String>,
    upstream: Vec<String>,
    downstream: Vec<String>,
}

#[derive(Serialize)]
struct SearchOutput {
    term: String,
    view: String,
    matches: Vec<String>,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Columns")]
    columns: usize,
    #[tabled(rename = "Flags")]
    flags: String,
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Label")]
    label: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    init_tracing(&manager.config().logging, cli.verbose);

    let base = BuildOptions::from_config(manager.config());
    if let Err(e) = execute_command(&cli, &base) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lineagegraph={}", level)));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => registry.with(layer.json()).init(),
        "compact" => registry.with(layer.compact()).init(),
        _ => registry.with(layer.pretty()).init(),
    }
}

fn execute_command(cli: &Cli, base: &BuildOptions) -> Result<()> {
    match &cli.command {
        Commands::Render {
            graph,
            select,
            search,
        } => {
            let mut options = graph.options(base);
            options.selected_id = select.clone();
            options.search_term = search.clone().unwrap_or_default();
            let units = graph.load_units()?;
            let rendered = build_graph(&units, graph.view, &options);
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
                OutputFormat::Pretty => print_graph(&rendered, graph.view),
            }
        }
        Commands::Impact {
            graph,
            start,
            max_depth,
        } => {
            let units = graph.load_units()?;
            let rendered = build_graph(&units, graph.view, &graph.options(base));
            let output = impact(&rendered, start, TraversalConfig { max_depth: *max_depth });
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Pretty => print_impact(&output),
            }
        }
        Commands::Search { graph, term } => {
            let units = graph.load_units()?;
            let rendered = build_graph(&units, graph.view, &graph.options(base));
            let output = SearchOutput {
                term: term.clone(),
                view: graph.view.to_string(),
                matches: sorted(find_search_match_ids(term, &rendered.nodes, graph.view)),
            };
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Pretty => print_search(&output),
            }
        }
    }
    Ok(())
}

fn impact(graph: &RenderGraph, starts: &[String], config: TraversalConfig) -> ImpactOutput {
    let index = ImpactIndex::new(&graph.edges);
    let results: Vec<ImpactResult> = starts.iter().map(|s| index.impact(s, &config)).collect();

    let mut connected = HashSet::new();
    let mut upstream = HashSet::new();
    let mut downstream = HashSet::new();
    for result in &results {
        connected.extend(result.connected());
        upstream.extend(result.upstream.iter().cloned());
        downstream.extend(result.downstream.iter().cloned());
    }

    ImpactOutput {
        starts: starts.to_vec(),
        connected: sorted(connected),
        upstream: sorted(upstream),
        downstream: sorted(downstream),
    }
}

fn sorted(ids: HashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids
}

fn node_flags(payload: &NodePayload) -> String {
    let flags = match payload {
        NodePayload::Table(data) => vec![
            (data.is_base_table, "base"),
            (data.is_highlighted, "highlighted"),
            (data.is_selected, "selected"),
            (data.is_collapsed, "collapsed"),
        ],
        NodePayload::Script(data) => vec![
            (data.is_highlighted, "highlighted"),
            (data.is_selected, "selected"),
        ],
    };
    flags
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect::<Vec<_>>()
        .join(",")
}

fn print_graph(graph: &RenderGraph, view: ViewMode) {
    println!(
        "{} {} ({} nodes, {} edges)",
        "View:".cyan().bold(),
        view.to_string().green(),
        graph.nodes.len().to_string().yellow(),
        graph.edges.len().to_string().yellow()
    );
    if graph.is_empty() {
        return;
    }

    let nodes: Vec<NodeRow> = graph
        .nodes
        .iter()
        .map(|node| NodeRow {
            id: node.id.clone(),
            kind: node.payload.kind().to_string(),
            label: node.payload.label().to_string(),
            columns: node.payload.columns().len(),
            flags: node_flags(&node.payload),
        })
        .collect();
    let mut table = Table::new(nodes);
    table.with(Style::rounded());
    println!("\n{}\n{}", "Nodes".cyan().bold(), table);

    if !graph.edges.is_empty() {
        let edges: Vec<EdgeRow> = graph
            .edges
            .iter()
            .map(|edge| EdgeRow {
                id: edge.id.clone(),
                source: edge.source_endpoint().to_string(),
                target: edge.target_endpoint().to_string(),
                kind: edge.kind.to_string(),
                label: edge.label.clone().or_else(|| edge.expression.clone()).unwrap_or_default(),
            })
            .collect();
        let mut table = Table::new(edges);
        table.with(Style::rounded());
        println!("\n{}\n{}", "Edges".cyan().bold(), table);
    }
}

fn print_impact(output: &ImpactOutput) {
    println!("{} {}", "Start:".cyan().bold(), output.starts.join(", ").green());
    println!("{}", "Upstream:".cyan().bold());
    for id in &output.upstream {
        println!("  {}", id);
    }
    println!("{}", "Downstream:".cyan().bold());
    for id in &output.downstream {
        println!("  {}", id);
    }
    println!(
        "{} {}",
        "Connected elements:".cyan().bold(),
        output.connected.len().to_string().yellow()
    );
}

fn print_search(output: &SearchOutput) {
    if output.matches.is_empty() {
        println!("{} '{}' in {} view", "No matches for".red(), output.term, output.view);
        return;
    }
    println!(
        "{} {} for '{}' in {} view",
        output.matches.len().to_string().yellow(),
        "matches".cyan().bold(),
        output.term,
        output.view
    );
    for id in &output.matches {
        println!("  {}", id.green());
    }
}
