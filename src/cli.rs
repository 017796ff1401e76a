//! CLI interface for knowledge-base

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::server;
use crate::store::Store;

#[derive(Parser)]
#[command(name = "knowledge-base")]
#[command(about = "Curriculum knowledge base for characters, phrases, and lesson tracking", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
        /// Path to the SQLite database file
        #[arg(long, env = "DATABASE_URL")]
        database: Option<PathBuf>,
    },
    /// Create the database file and schema without serving
    Init {
        /// Path to the SQLite database file
        #[arg(long, env = "DATABASE_URL")]
        database: Option<PathBuf>,
    },
    /// Show row counts for every table in the store
    Status {
        /// Path to the SQLite database file
        #[arg(long, env = "DATABASE_URL")]
        database: Option<PathBuf>,
    },
}

/// Parse arguments and dispatch
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        database: None,
    }) {
        Commands::Serve {
            host,
            port,
            database,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(database) = database {
                config.database.path = database;
            }
            server::start(&config).await
        }
        Commands::Init { database } => {
            if let Some(database) = database {
                config.database.path = database;
            }
            Store::open(&config.database.path, config.database.busy_timeout_ms).await?;
            println!("Database ready: {}", config.database.path.display());
            Ok(())
        }
        Commands::Status { database } => {
            if let Some(database) = database {
                config.database.path = database;
            }
            let store =
                Store::open(&config.database.path, config.database.busy_timeout_ms).await?;
            let counts = store.table_counts().await?;
            println!("Store: {}", config.database.path.display());
            println!();
            for (table, count) in counts {
                println!("  {:<20} {:>8}", table, count);
            }
            Ok(())
        }
    }
}
