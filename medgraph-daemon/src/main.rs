//! medgraph daemon - biomedical knowledge graph builder.
//!
//! A single Rust binary that provides:
//! - One-shot graph builds from a JSON graph request
//! - HTTP API for builds and search-term listing
//! - Listing the search terms already materialized

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use medgraph_core::sources::RecordArchive;
use medgraph_core::GraphRequest;
use medgraph_daemon::build::{BuildPipeline, GraphMaterializer, Sources};
use medgraph_daemon::config::{MedGraphConfig, StoreBackend, CONFIG_FILE};
use medgraph_daemon::server::{create_router, AppState};
use medgraph_daemon::storage::GraphStore;

/// medgraph knowledge graph daemon
#[derive(Parser, Debug)]
#[command(name = "medgraph-daemon")]
#[command(about = "Build biomedical knowledge graphs from literature")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Graph store backend (memory, duckdb, neo4j)
    #[arg(long, value_parser = parse_backend)]
    store: Option<StoreBackend>,

    /// JSON record archive to draw papers, entities and concepts from
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one graph request and exit
    Build {
        /// Graph request JSON file
        #[arg(short, long)]
        request: PathBuf,

        /// Delete the existing graph first
        #[arg(long)]
        reset: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// HTTP port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the search terms already in the graph
    SearchTerms,
}

fn parse_backend(s: &str) -> Result<StoreBackend, String> {
    StoreBackend::parse(s).ok_or_else(|| format!("unknown store backend '{}'", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut config = MedGraphConfig::load_file(&cli.config);
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }
    if let Some(archive) = cli.archive {
        config.sources.archive = Some(archive);
    }

    match cli.command {
        Command::Build { request, reset } => run_build(&config, request, reset),
        Command::Serve { port } => serve(&config, port.unwrap_or(config.server.port)),
        Command::SearchTerms => search_terms(&config),
    }
}

fn open_materializer(config: &MedGraphConfig) -> Result<GraphMaterializer<Box<dyn GraphStore>>> {
    info!("Opening {} store...", config.store.backend);
    let store = config
        .store
        .open()
        .with_context(|| format!("Failed to open {} store", config.store.backend))?;
    Ok(GraphMaterializer::new(store)
        .with_anchor(config.build.anchor())
        .with_batch_size(config.build.batch_size))
}

fn open_pipeline(config: &MedGraphConfig) -> Result<BuildPipeline<Box<dyn GraphStore>>> {
    let path = config
        .sources
        .archive
        .as_ref()
        .context("No record archive configured; set [sources].archive or pass --archive")?;
    let archive = RecordArchive::from_path(path)
        .with_context(|| format!("Failed to load record archive {}", path.display()))?;

    let pipeline = BuildPipeline::new(Sources::from_archive(archive), open_materializer(config)?)?;
    Ok(pipeline.with_max_records(config.build.max_records))
}

fn run_build(config: &MedGraphConfig, request_path: PathBuf, reset: bool) -> Result<()> {
    let body = std::fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read {}", request_path.display()))?;
    let mut request = GraphRequest::from_json_str(&body).context("Invalid graph request")?;
    request.reset |= reset;

    let pipeline = open_pipeline(config)?;
    let result = pipeline
        .build(&request)
        .with_context(|| format!("Graph build for '{}' failed", request.search_term))?;

    info!(
        "Build complete: {} nodes, {} relations in {:?}",
        result.report.node_count(),
        result.report.relation_count(),
        result.duration
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn search_terms(config: &MedGraphConfig) -> Result<()> {
    let materializer = open_materializer(config)?;
    let terms = materializer
        .anchor_values()
        .context("Failed to list search terms")?;
    for term in terms {
        match term.as_str() {
            Some(s) => println!("{}", s),
            None => println!("{}", term),
        }
    }
    Ok(())
}

fn serve(config: &MedGraphConfig, port: u16) -> Result<()> {
    // Stores with a blocking HTTP client must be created and dropped outside
    // the async runtime.
    let state = AppState::new(open_pipeline(config)?);
    let pipeline = state.pipeline.clone();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let served = runtime.block_on(async move {
        let router = create_router(state);
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("medgraph daemon listening on http://{}", addr);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")
    });
    drop(runtime);
    drop(pipeline);
    served
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
