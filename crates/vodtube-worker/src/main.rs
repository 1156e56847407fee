//! Upload worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vodtube_firestore::{FirestoreClient, FirestoreUploadStore};
use vodtube_queue::JobQueue;
use vodtube_worker::{metrics, JobExecutor, UploadContext, WorkerConfig};
use vodtube_youtube::{CredentialManager, OAuthConfig, YoutubeConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vodtube-worker");

    if let Err(e) = run().await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vodtube=info".parse().expect("valid directive"));

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
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port).context("failed to start metrics exporter")?;
        info!("Serving metrics on port {}", port);
    }

    let firestore = FirestoreClient::from_env()
        .await
        .context("failed to create Firestore client")?;
    let store = Arc::new(FirestoreUploadStore::new(firestore));

    let oauth = OAuthConfig::from_env().context("invalid YouTube OAuth config")?;
    let youtube = YoutubeConfig::from_env().context("invalid YouTube API config")?;
    let credentials = CredentialManager::new(store.clone(), oauth, youtube)
        .context("failed to create credential manager")?;

    let queue = JobQueue::from_env().context("failed to create job queue")?;
    let ctx = UploadContext::new(store, Arc::new(credentials));
    let executor = Arc::new(JobExecutor::new(config, queue, ctx));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;
    Ok(())
}
