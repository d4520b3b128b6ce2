use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use repositories::documents::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

mod models;
mod repositories;
pub mod services;
pub mod settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    /// Keep every document in process memory instead of Postgres.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let config = settings::Settings::new(&args.config).context("Could not load config file.")?;
    init_logging(&args.log4rs)?;
    log::info!("Starting referral ledger.");

    let store: Arc<dyn DocumentStore> = if args.in_memory {
        log::warn!("Using the in-memory document store, data is lost on exit.");
        Arc::new(MemoryDocumentStore::new())
    } else {
        let conn = PgPoolOptions::new()
            .max_connections(config.postgres.max_connections)
            .connect(&config.postgres.url)
            .await
            .context("Could not connect to database.")?;
        sqlx::migrate!()
            .run(&conn)
            .await
            .context("Could not run migrations.")?;

        Arc::new(PgDocumentStore::new(conn))
    };

    services::start_services(store, config)
        .await
        .context("Could not start services.")
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
