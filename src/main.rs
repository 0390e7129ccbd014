use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use natours::app::{build_router, AppState};
use natours::config::AppConfig;
use natours::db::tour_repository::{MongoTourRepository, TourRepository};
use natours::supervisor::{install_panic_hook, termination_signal, Supervisor, DEFAULT_DRAIN_TIMEOUT};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = AppConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .init();
    install_panic_hook();

    tracing::info!(mode = ?config.error_mode(), "Starting Natours server...");

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(config.mongo_uri()?)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.database_name);
    let tour_repo: Arc<dyn TourRepository> = Arc::new(MongoTourRepository::new(&mongo_db));
    tour_repo
        .ensure_indexes()
        .await
        .context("Failed to create tour indexes")?;

    tracing::info!("Connected to MongoDB at {}", config.redacted_uri());

    let app_state = AppState {
        tour_repo,
        error_mode: config.error_mode(),
    };
    let app = build_router(app_state, &config.static_dir);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    let mut supervisor = Supervisor::new(DEFAULT_DRAIN_TIMEOUT);
    let shutdown = supervisor.shutdown_signal();
    supervisor.spawn("http-server", async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown.wait())
            .await
            .context("HTTP server failed")
    });

    let outcome = supervisor.run(termination_signal()).await;
    tracing::info!(?outcome, "Natours server stopped");
    Ok(outcome.exit_code())
}
