use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use grabber_core::{
    load_config, spawn_watcher, validate_config, CookieStore, FfmpegEngine, HttpFetcher,
    JobPipeline, LogFormat, Transcoder,
};
use grabber_core::config::LoggingConfig;
use grabber_server::api::create_router;
use grabber_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("GRABBER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Logging needs the config, so a load failure is reported after init
    let loaded = load_config(&config_path);
    init_logging(
        &loaded
            .as_ref()
            .map(|c| c.logging.clone())
            .unwrap_or_default(),
    );

    info!("Loading configuration from {:?}", config_path);
    let config =
        loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    // Cookie file must be usable before accepting any request
    let credentials = Arc::new(CookieStore::new(&config.credentials.cookies_path));
    let credential = credentials.load().await.with_context(|| {
        format!(
            "Failed to load cookie file {:?}",
            config.credentials.cookies_path
        )
    })?;
    info!(
        version = credential.version,
        cookies = credential.len(),
        "Cookie store initialized"
    );

    let fetcher = Arc::new(
        HttpFetcher::new(config.fetcher.clone()).context("Failed to create HTTP fetcher")?,
    );

    // A missing engine is not fatal; /health reports degraded until it appears
    let engine = Arc::new(FfmpegEngine::new(config.transcoder.clone()));
    let transcoder = Arc::new(Transcoder::new(engine, config.transcoder.clone()));
    match transcoder.check_available().await {
        Ok(()) => info!(
            ffmpeg = %config.transcoder.ffmpeg_path.display(),
            "Media engine available"
        ),
        Err(e) => warn!(
            ffmpeg = %config.transcoder.ffmpeg_path.display(),
            error = %e,
            "Media engine unavailable"
        ),
    }

    let pipeline = Arc::new(JobPipeline::new(
        config.pipeline.clone(),
        Arc::clone(&credentials),
        fetcher,
        transcoder,
    ));
    pipeline
        .start()
        .await
        .context("Failed to start job pipeline")?;

    // Optional cookie file watcher
    let (watcher_tx, watcher_rx) = watch::channel(false);
    let watcher = (config.credentials.watch_interval_secs > 0).then(|| {
        info!(
            interval_secs = config.credentials.watch_interval_secs,
            "Watching cookie file for changes"
        );
        spawn_watcher(
            Arc::clone(&credentials),
            Duration::from_secs(config.credentials.watch_interval_secs),
            watcher_rx,
        )
    });

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&pipeline)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");

    if let Some(handle) = watcher {
        let _ = watcher_tx.send(true);
        let _ = handle.await;
    }

    pipeline.stop().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
