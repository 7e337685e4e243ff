//! Atlas CLI: build and keep fresh the workspace code index.

use anyhow::{bail, Context, Result};
use atlas_indexer::{
    CacheStore, ConfigGate, FileHashCache, FileWatcher, IndexOrchestrator, LineBlockChunker,
    Scanner, StateManager, StatusSnapshot, SystemState, WatcherConfig, WorkspaceConfig,
    WorkspaceRegistry, WorkspaceScanner, WorkspaceWatcher,
};
use atlas_vector_store::{HashingEmbedder, LocalVectorStore, VectorStore};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Semantic code index for a workspace", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the workspace with a default .atlas/config.toml
    Init {
        /// Workspace root (default: current directory)
        path: Option<PathBuf>,
    },

    /// Run one full indexing pass
    Index {
        path: Option<PathBuf>,
    },

    /// Index, then keep watching for changes until interrupted
    Watch {
        path: Option<PathBuf>,
    },

    /// Delete the collection and the hash cache
    Clear {
        path: Option<PathBuf>,
    },

    /// Show index status
    Status {
        path: Option<PathBuf>,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => cmd_init(path).await,
        Commands::Index { path } => cmd_index(path).await,
        Commands::Watch { path } => cmd_watch(path).await,
        Commands::Clear { path } => cmd_clear(path).await,
        Commands::Status { path, json } => cmd_status(path, json).await,
    }
}

struct Services {
    config: WorkspaceConfig,
    cache: Arc<FileHashCache>,
    store: Arc<LocalVectorStore>,
    orchestrator: IndexOrchestrator,
}

async fn build_services(root: &Path) -> Result<Services> {
    let config = WorkspaceConfig::load(root).await?;
    let data_dir = WorkspaceConfig::data_dir(root);

    let cache = Arc::new(FileHashCache::new(&data_dir));
    let collection_name = config
        .collection
        .name
        .clone()
        .unwrap_or_else(|| "workspace".to_string());
    let store = Arc::new(LocalVectorStore::new(&data_dir, &collection_name));
    let dimension = config
        .embedding
        .dimension
        .unwrap_or(HashingEmbedder::DEFAULT_DIMENSION);

    let scanner = Arc::new(WorkspaceScanner::new(
        Arc::clone(&cache) as Arc<dyn CacheStore>,
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::new(HashingEmbedder::new(dimension)),
        Arc::new(LineBlockChunker::default()),
    ));
    let watcher = Arc::new(WorkspaceWatcher::new(
        root,
        Arc::clone(&scanner),
        WatcherConfig::default(),
    ));

    let orchestrator = IndexOrchestrator::new(
        root,
        Arc::new(config.clone()) as Arc<dyn ConfigGate>,
        Arc::clone(&cache) as Arc<dyn CacheStore>,
        Arc::clone(&store) as Arc<dyn VectorStore>,
        scanner as Arc<dyn Scanner>,
        watcher as Arc<dyn FileWatcher>,
        Arc::new(StateManager::new()),
    );

    Ok(Services {
        config,
        cache,
        store,
        orchestrator,
    })
}

fn workspace_root(path: Option<PathBuf>) -> Result<PathBuf> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    root.canonicalize()
        .with_context(|| format!("workspace root {} is not accessible", root.display()))
}

async fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = workspace_root(path)?;
    let config_path = WorkspaceConfig::config_path(&root);
    if config_path.exists() {
        bail!("already initialized: {} exists", config_path.display());
    }

    WorkspaceConfig::local_defaults().save(&root).await?;
    println!("Initialized workspace config at {}", config_path.display());
    Ok(())
}

async fn cmd_index(path: Option<PathBuf>) -> Result<()> {
    let root = workspace_root(path)?;
    let services = build_services(&root).await?;
    ensure_configured(&services.config)?;

    let (bar, render) = spawn_progress_bar(services.orchestrator.subscribe());
    services.orchestrator.start_indexing().await;
    render.abort();
    bar.finish_and_clear();

    let status = services.orchestrator.status();
    let snapshot = services.orchestrator.subscribe().borrow().clone();
    services.orchestrator.stop_watcher().await;

    if status.state() == SystemState::Error {
        bail!("indexing failed: {status}");
    }
    println!(
        "Indexed {} of {} blocks ({})",
        snapshot.block_progress.indexed, snapshot.block_progress.found, status
    );
    Ok(())
}

async fn cmd_watch(path: Option<PathBuf>) -> Result<()> {
    let root = workspace_root(path)?;
    let services = build_services(&root).await?;
    ensure_configured(&services.config)?;

    let registry = WorkspaceRegistry::new();
    let orchestrator = registry.register(services.orchestrator).await;

    let (bar, render) = spawn_progress_bar(orchestrator.subscribe());
    orchestrator.start_indexing().await;
    render.abort();
    bar.finish_and_clear();

    let status = orchestrator.status();
    if status.state() == SystemState::Error {
        registry.close_all().await;
        bail!("indexing failed: {status}");
    }

    println!("{status}. Watching for changes, press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    registry.close_all().await;
    println!("Watcher stopped.");
    Ok(())
}

async fn cmd_clear(path: Option<PathBuf>) -> Result<()> {
    let root = workspace_root(path)?;
    let services = build_services(&root).await?;

    services.orchestrator.clear_index_data().await;

    let status = services.orchestrator.status();
    if status.state() == SystemState::Error {
        bail!("{status}");
    }
    println!("{status}");
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    configured: bool,
    collection_exists: bool,
    points: usize,
    cache_entries: usize,
}

async fn cmd_status(path: Option<PathBuf>, json: bool) -> Result<()> {
    let root = workspace_root(path)?;
    let services = build_services(&root).await?;

    let collection_exists = services.store.collection_path().exists();
    let points = if collection_exists {
        services.store.initialize().await?;
        services.store.point_count().await?
    } else {
        0
    };

    let report = StatusReport {
        configured: services.config.is_fully_configured(),
        collection_exists,
        points,
        cache_entries: services.cache.entry_count().await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Workspace:   {}", root.display());
        println!(
            "Configured:  {}",
            if report.configured { "yes" } else { "no (run `atlas init`)" }
        );
        println!(
            "Collection:  {}",
            if report.collection_exists {
                format!("{} blocks", report.points)
            } else {
                "not indexed".to_string()
            }
        );
        println!("Cache:       {} files", report.cache_entries);
    }
    Ok(())
}

fn ensure_configured(config: &WorkspaceConfig) -> Result<()> {
    if !config.is_fully_configured() {
        bail!("workspace is not configured; run `atlas init` first");
    }
    Ok(())
}

/// Render live snapshots as a progress bar until aborted.
fn spawn_progress_bar(
    mut rx: watch::Receiver<StatusSnapshot>,
) -> (ProgressBar, tokio::task::JoinHandle<()>) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg:<32} {pos}/{len} blocks")
            .expect("static progress template"),
    );

    let render_bar = bar.clone();
    let handle = tokio::spawn(async move {
        loop {
            {
                let snapshot = rx.borrow();
                render_bar.set_length(snapshot.block_progress.found);
                render_bar.set_position(snapshot.block_progress.indexed);
                render_bar.set_message(snapshot.status.to_string());
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    });

    (bar, handle)
}
