// src/main.rs
use anyhow::Result;
use rust_health_check::{
    config::{self, TracerKind},
    metrics::MetricsRegistry,
    server::{HealthHandler, ServerBuilder},
    telemetry::{CountingAllocator, LogTracer, NoopTracer, OtelTracer},
    Health,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rust_health_check=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "health.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let metrics_registry = Arc::new(MetricsRegistry::new()?);

    let mut health = Health::new().with_collection(config.collection);
    health = match config.tracer {
        TracerKind::Log => health.with_tracer(LogTracer),
        TracerKind::Otel => health.with_tracer(OtelTracer::global("rust-health-check")),
        TracerKind::None => health.with_tracer(NoopTracer),
    };
    if config.metrics.enabled {
        health = health.with_metrics(metrics_registry.collector());
    }
    let health = Arc::new(health);

    for check in &config.checks {
        health.register(check.to_probe()?).await?;
        info!("Registered health check {} -> {}", check.name, check.target());
    }

    let shutdown = CancellationToken::new();
    let mut handler = HealthHandler::new(health).with_shutdown(shutdown.clone());
    if config.metrics.enabled {
        handler = handler.with_metrics(metrics_registry, config.metrics.path.clone());
    }

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    info!("Starting health server on {}", config.server.listen);
    if let Err(e) = ServerBuilder::new(config.server.listen)
        .with_handler(handler)
        .with_shutdown(shutdown)
        .serve()
        .await
    {
        error!("Health server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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

    info!("Shutdown signal received");
}
