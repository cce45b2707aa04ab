use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use rentbook::{
    api::{self, AppState},
    config::{CliArgs, Config, LoggingConfig},
    manager::RentalManager,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli)?;
    init_tracing(&config.logging);

    let storage = config.storage.open()?;
    tracing::info!(backend = ?config.storage.backend, "Storage opened");

    let manager = RentalManager::new(storage.clone()).with_import_mode(config.data.import_mode);
    let metrics = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::new(Arc::new(manager)).with_metrics(metrics);

    let app = api::router(state)
        .layer(config.cors.layer())
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr()?;
    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close()?;
    tracing::info!("Storage closed");
    Ok(())
}
