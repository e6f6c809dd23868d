use std::net::SocketAddr;
use std::path::PathBuf;

use novus::config::Configuration;
use novus::{app, initialize_state, telemetry};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // export spans and logs when an OTLP collector is configured.
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let otlp_logs = otlp_endpoint
        .as_deref()
        .map(telemetry::setup_logging)
        .transpose()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(otlp_logs)
        .init();

    if let Some(endpoint) = otlp_endpoint.as_deref() {
        let provider = telemetry::setup_tracer(endpoint)?;
        opentelemetry::global::set_tracer_provider(provider);
    }

    // read configuration file. let it in memory.
    let path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_default();
    let config = Configuration::default().path(path).read()?;

    let mut state = initialize_state(config).await?;
    state.metrics = Some(telemetry::setup_metrics_recorder()?);

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
