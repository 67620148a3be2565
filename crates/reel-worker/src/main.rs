//! Scene assembly worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe, FfmpegEngine};
use reel_queue::{JobQueue, ProgressChannel, QueueConfig};
use reel_storage::{ObjectStore, R2Client};
use reel_worker::{metrics, Assembler, JobExecutor, StorageCatalog, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    // JSON for production, colored text for dev
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,reel_worker=info,reel_media=info"))?;

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (redis TLS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting reel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr).context("failed to start metrics listener")?;
        info!("Serving metrics on {}", addr);
    }

    let r2 = R2Client::from_env().context("failed to create R2 client")?;
    r2.check_connectivity()
        .await
        .context("object store is unreachable")?;
    info!("Connected to R2 bucket {}", r2.bucket());
    let store: Arc<dyn ObjectStore> = Arc::new(r2);
    let catalog = Arc::new(StorageCatalog::new(Arc::clone(&store)));
    let engine = Arc::new(FfmpegEngine::new().with_timeout(config.ffmpeg_timeout.as_secs()));

    let queue_config = QueueConfig::from_env();
    let progress =
        ProgressChannel::new(&queue_config.redis_url).context("failed to create progress channel")?;
    let queue = JobQueue::new(queue_config).context("failed to create job queue")?;

    let assembler = Assembler::new(store, catalog, engine, config);
    let executor = Arc::new(JobExecutor::new(queue, progress, assembler));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        return Err(e.into());
    }

    info!("Worker shutdown complete");
    Ok(())
}
