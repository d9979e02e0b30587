use clap::Parser;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod error;
mod lenient;
mod models;
mod projections;
mod results_log;
mod routes;


use config::Config;
use error::AppResult;
use routes::AppState;

/// Quiz results API
/// Never edits results.ndjson, only appends
/// Dashboard data is derived from the log on every request
#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::parse();
    let state = AppState::new(config.paths());
    let app = routes::router(state, config.cors);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        data_dir = %config.data_dir.display(),
        static_dir = %config.static_dir.display(),
        "server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
