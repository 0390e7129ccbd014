use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use natours::config::AppConfig;
use natours::db::tour_repository::{MongoTourRepository, TourRepository};
use natours::seed::{delete_tours, import_tours, parse_tours};

/// Load the sample tours into MongoDB, or wipe them.
#[derive(Debug, Parser)]
#[command(name = "import-tours", version)]
struct Cli {
    /// JSON array of tours to validate and insert
    #[arg(long, value_name = "FILE", conflicts_with = "delete", required_unless_present = "delete")]
    import: Option<PathBuf>,

    /// Remove every tour from the collection
    #[arg(long)]
    delete: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natours=info".into()),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let client = mongodb::Client::with_uri_str(config.mongo_uri()?)
        .await
        .context("Failed to connect to MongoDB")?;
    let repo = MongoTourRepository::new(&client.database(&config.database_name));

    if cli.delete {
        delete_tours(&repo).await?;
        return Ok(());
    }

    if let Some(path) = cli.import {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let tours = parse_tours(&json, chrono::Utc::now())?;
        repo.ensure_indexes().await?;
        import_tours(&repo, tours).await?;
    }

    Ok(())
}
