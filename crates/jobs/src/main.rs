use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use feedkit_jobs::{cli, Cli, JobsConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedkit_jobs=info,feedkit_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();
    let config = JobsConfig::from_env()?.with_entities(args.entities.clone());

    let pool = feedkit_db::create_pool(&config.db)
        .await
        .context("Failed to connect to database")?;
    feedkit_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    let job = args.command.name();
    tracing::info!(job, "Starting job");
    let started = Instant::now();

    let report = cli::run(&args.command, &pool, &config)
        .await
        .with_context(|| format!("Job {job} failed"))?;

    tracing::info!(
        job,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Job finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
