//! genmix-db - warehouse schema utility
//!
//! Usage:
//!   genmix-db --init-db
//!
//! Reads DB_URL from the environment (or .env). Exits 2 when it is unset.

use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use genmix::ingest::cli::DbArgs;
use genmix::ingest::{DatabaseConfig, IngestError, SqliteStore};
use log::info;

fn init_db(config: &DatabaseConfig) -> Result<(), IngestError> {
    let mut store = SqliteStore::open(config)?;
    store.init_schema()?;
    info!("Schema applied to {:?}", config.target);
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = DbArgs::parse();

    let config = match DatabaseConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if !args.init_db {
        println!("Nothing to do. Use --init-db to create the generation_mix table.");
        return ExitCode::SUCCESS;
    }

    match init_db(&config) {
        Ok(()) => {
            println!("DB initialised.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
