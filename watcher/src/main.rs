use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::info;
use watcher::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let report = watcher::app::run(&cli, |key| std::env::var(key).ok(), Utc::now()).await?;
    info!(
        "Method {}, {} joined, {} left",
        report.observation.method,
        report.diff.joined.len(),
        report.diff.left.len()
    );
    Ok(())
}
