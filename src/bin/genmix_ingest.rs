//! genmix-ingest - windowed fetch + upsert into generation_mix
//!
//! Usage:
//!   genmix-ingest [--days 3] [--overlap-hours 48] [--start-date ISO] [--end-date ISO] [--no-incremental]
//!
//! Environment variables:
//!   DB_URL - warehouse location (required; `sqlite://path` or a file path)
//!   NESO_BASE_API - CKAN action base URL (default: NESO public API)
//!   NESO_RESOURCE_ID - Historic generation mix resource id
//!   RUST_LOG - log filter (default: info)

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use genmix::ingest::cli::IngestArgs;
use genmix::ingest::{
    run_ingestion, DatabaseConfig, IngestError, IngestionStats, NesoClient, SqliteStore,
    UpstreamConfig,
};
use log::{error, info};

async fn run(args: IngestArgs) -> Result<IngestionStats, IngestError> {
    // Config problems fail here, before any network or disk I/O
    let db_config = DatabaseConfig::from_env()?;
    let upstream = UpstreamConfig::from_env();
    let options = args.into_options()?;
    let now = Utc::now();
    // Only validates; run_ingestion rebuilds the window once stored data is known
    options.validate(now)?;

    info!("Generation mix ingestion");
    info!("   ├─ Upstream: {}", upstream.search_sql_url());
    info!("   ├─ Resource: {}", upstream.resource_id);
    info!("   ├─ Warehouse: {:?}", db_config.target);
    info!("   └─ Incremental: {}", options.incremental);

    let mut store = SqliteStore::open(&db_config)?;
    let client = NesoClient::from_config(&upstream)?;

    run_ingestion(&options, &client, &mut store, now).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = IngestArgs::parse();

    match run(args).await {
        Ok(stats) => {
            println!("Done. Stats: {stats}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Ingestion failed: {err}");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
