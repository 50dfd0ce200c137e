//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use presently_api::{create_router, metrics, ApiConfig, AppState, JobReaper};
use presently_pipeline::PipelineConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Required by rustls 0.23+ before any TLS client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    init_tracing()?;

    info!("Starting presently-api");

    let config = ApiConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    info!(
        "API config: host={}, port={}, work_dir={}, max_concurrent_jobs={}",
        config.host,
        config.port,
        pipeline.work_dir.display(),
        pipeline.max_concurrent_jobs
    );

    tokio::fs::create_dir_all(&pipeline.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", pipeline.work_dir.display()))?;

    for (tool, check) in [
        ("ffmpeg", presently_media::check_ffmpeg()),
        ("soffice", presently_media::check_soffice()),
        ("pdftoppm", presently_media::check_pdftoppm()),
    ] {
        if let Err(e) = check {
            warn!("{} unavailable, video generation will fail: {}", tool, e);
        }
    }

    let work_dir = pipeline.work_dir.clone();
    let state = AppState::new(config.clone(), pipeline).context("creating application state")?;

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing Prometheus recorder")?)
    } else {
        None
    };

    let reaper = JobReaper::new(Arc::clone(&state.registry), work_dir);
    tokio::spawn(async move {
        reaper.run().await;
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    info!("Server shutdown complete");
    Ok(())
}

/// JSON logs when `LOG_FORMAT=json`, colored output otherwise.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("presently=info".parse()?);

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

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
