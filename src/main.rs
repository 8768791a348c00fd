// Command-line front end: enhances the given files through the batch engine
// and prints a JSON summary when the run ends.

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use image_enhancer_lib::{
    CacheStats, Engine, EngineConfig, EnhanceMode, FsStorage, ItemStatus, MemorySnapshot, QueueEvent,
    QueueSnapshot, SourceRef, SystemMemorySource, UpscaleEnhancer,
};

#[derive(Parser, Debug)]
#[command(name = "image-enhancer", version, about = "Batch image enhancement with memory-aware scheduling")]
struct Cli {
    /// Enhancement mode: general, anime or photo
    #[arg(short, long, default_value = "general")]
    mode: EnhanceMode,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the on-disk artifact cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Images to enhance (JPEG, PNG, BMP, TIFF, WebP). HEIC/HEIF files are
    /// queued but fail: the built-in upscaler cannot decode them
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    queue: QueueSnapshot,
    cache: CacheStats,
    memory: MemorySnapshot,
    recent_files: Vec<SourceRef>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.cache.directory = Some(dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!("=== Image Enhancer Starting ===");

    let config = load_config(&cli)?;
    let engine = Engine::new(
        config,
        Arc::new(UpscaleEnhancer::default()),
        Arc::new(FsStorage::new()),
        Arc::new(SystemMemorySource::new()),
    )
    .context("Failed to initialize engine")?;
    engine.start_telemetry();

    let queue = engine.queue().clone();
    let admission = queue.submit(cli.files, cli.mode);
    for rejection in &admission.rejected {
        eprintln!("Skipped {}: {}", rejection.source, rejection.reason_text());
    }

    let mut events = queue.subscribe();
    if queue.start()? {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(QueueEvent::ItemUpdated { item }) => match &item.status {
                        ItemStatus::Completed => {
                            let output = item.output_path.as_ref().map(|p| p.display().to_string());
                            eprintln!("✓ {} -> {}", item.file_name, output.unwrap_or_default());
                        }
                        ItemStatus::Failed(reason) => eprintln!("✗ {}: {}", item.file_name, reason),
                        _ => {}
                    },
                    Ok(QueueEvent::Progress(update)) => {
                        debug!("Progress {}% ({}/{})", update.progress_percentage,
                            update.completed_tasks + update.failed_tasks, update.total_tasks);
                    }
                    Ok(QueueEvent::Paused { reason }) => warn!("Queue paused: {:?}", reason),
                    Ok(QueueEvent::Resumed { reason }) => info!("Queue resumed: {:?}", reason),
                    Ok(QueueEvent::Finished(_)) | Ok(QueueEvent::Cancelled) => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!("Missed {} queue events", skipped),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, cancelling batch");
                    queue.cancel();
                }
            }
        }
    } else {
        warn!("Nothing to process");
    }

    engine.cache().flush_pending_writes().await;

    let summary = RunSummary {
        queue: queue.snapshot(),
        cache: engine.cache().stats(),
        memory: engine.telemetry().snapshot(),
        recent_files: engine.recent_files(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    engine.shutdown();
    Ok(())
}
