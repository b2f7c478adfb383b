//! sonicforge-worker: consumes music generation jobs and reports results.
//!
//! This binary can run in four modes:
//! - Worker mode: long-lived consumption loop (default)
//! - Once mode: a single consumption cycle, then exit
//! - Health mode: check the generation endpoint, then exit
//! - Enqueue mode: push a job id onto the work queue, then exit

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sonicforge_worker::audio::{StandardEncoder, Transcoder};
use sonicforge_worker::backend::RemoteBackend;
use sonicforge_worker::cli::Cli;
use sonicforge_worker::config::{StorageBackend, WorkerConfig};
use sonicforge_worker::error::WorkerError;
use sonicforge_worker::processor::JobProcessor;
use sonicforge_worker::queue::{QueueConsumer, RedisQueue, WorkQueue};
use sonicforge_worker::storage::{ArtifactStore, LocalStorage, S3Storage};
use sonicforge_worker::store::HttpJobStore;
use sonicforge_worker::types::JobId;
use sonicforge_worker::worker::Worker;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    init_logging(cli.log_json);

    let mut config = WorkerConfig::from_env();
    cli.apply(&mut config);
    if let Some(msg) = config.validate() {
        return Err(WorkerError::invalid_config(msg).into());
    }

    if cli.is_health_mode() {
        run_health_mode(&config).await
    } else if let Some(ref raw) = cli.enqueue {
        run_enqueue_mode(&config, raw).await
    } else {
        run_worker_mode(&config, cli.once).await
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the default filter.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sonicforge_worker=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Calls `/health` and compares the reported GPU with `MODAL_GPU`.
async fn run_health_mode(config: &WorkerConfig) -> anyhow::Result<()> {
    let backend = RemoteBackend::new(&config.generation_url, config.store_timeout)?;
    check_backend(&backend, config)
        .await
        .with_context(|| format!("generation endpoint {} is unhealthy", config.generation_url))?;
    Ok(())
}

async fn check_backend(backend: &RemoteBackend, config: &WorkerConfig) -> anyhow::Result<()> {
    let health = backend.health().await?;
    match health.gpu.as_deref() {
        Some(gpu) if !gpu.eq_ignore_ascii_case(&config.gpu) => tracing::warn!(
            reported = gpu,
            expected = %config.gpu,
            "Generation endpoint reports a different GPU"
        ),
        gpu => tracing::info!(
            url = %config.generation_url,
            status = %health.status,
            gpu = gpu.unwrap_or("unknown"),
            "Generation endpoint healthy"
        ),
    }
    Ok(())
}

/// Pushes one id onto the work queue, as the job tracking API does on creation.
async fn run_enqueue_mode(config: &WorkerConfig, raw: &str) -> anyhow::Result<()> {
    let id = JobId::parse(raw)
        .ok_or_else(|| WorkerError::invalid_request("Job id cannot be blank"))?;
    let queue = RedisQueue::connect(&config.queue.redis_url, &config.queue.name).await?;
    queue.push(id.as_str()).await?;
    tracing::info!(job_id = %id, queue = queue.name(), "Enqueued job");
    Ok(())
}

/// Wires the components together and runs the consumption loop.
async fn run_worker_mode(config: &WorkerConfig, once: bool) -> anyhow::Result<()> {
    tracing::info!(
        api_url = %config.api_url,
        generation_url = %config.generation_url,
        queue = %config.queue.name,
        mode = %config.queue.mode,
        storage = %config.storage.backend,
        default_model = %config.default_model,
        "Starting sonicforge-worker"
    );

    let store = Arc::new(HttpJobStore::new(&config.api_url, config.store_timeout)?);
    let backend = Arc::new(RemoteBackend::new(
        &config.generation_url,
        config.generation_timeout,
    )?);
    // The endpoint may still be cold; jobs fail individually if it stays down.
    if let Err(e) = check_backend(&backend, config).await {
        let error = format!("{:#}", e);
        tracing::warn!(error = %error, "Generation endpoint health check failed");
    }

    let encoder = StandardEncoder::new(Transcoder::new(config.ffmpeg_path.clone()));
    if !encoder.transcoder().is_available().await {
        tracing::warn!(
            program = %config.ffmpeg_path.display(),
            "Transcoder not found, mp3 jobs will fail"
        );
    }

    let storage = build_storage(config).await?;
    let processor = Arc::new(JobProcessor::new(
        store.clone(),
        backend,
        Arc::new(encoder),
        storage,
        config.default_model.clone(),
    ));

    let consumer = QueueConsumer::connect(&config.queue, store).await?;
    let worker = Worker::new(consumer, processor, config.retry_backoff);

    if once {
        let outcomes = worker.run_cycle().await?;
        tracing::info!(
            mode = worker.consumer().mode(),
            jobs = outcomes.len(),
            "Single cycle complete"
        );
        for (id, outcome) in outcomes {
            tracing::info!(job_id = %id, outcome = %outcome, "Job handled");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, finishing current job");
                cancel.cancel();
            }
        }
    });

    worker.run(cancel).await;
    Ok(())
}

async fn build_storage(config: &WorkerConfig) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    let public_base_url = config.storage.public_base_url.as_deref();
    let storage: Arc<dyn ArtifactStore> = match config.storage.backend {
        StorageBackend::Local => {
            let dir = config.effective_storage_dir();
            ensure_dir(&dir).await?;
            tracing::info!(dir = %dir.display(), "Storing artifacts locally");
            let mut local = LocalStorage::new(dir);
            if let Some(base) = public_base_url {
                local = local.with_public_base_url(base);
            }
            Arc::new(local)
        }
        StorageBackend::S3 => {
            tracing::info!(bucket = %config.storage.s3_bucket, "Storing artifacts in S3");
            let mut s3 = S3Storage::from_env(config.storage.s3_bucket.clone()).await;
            if let Some(base) = public_base_url {
                s3 = s3.with_public_base_url(base);
            }
            Arc::new(s3)
        }
    };
    Ok(storage)
}

async fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create storage directory {}", dir.display()))
}
