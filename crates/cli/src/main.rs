//! DigitalHub CLI - Database migrations and order inspection.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! dh-cli migrate
//!
//! # List a customer's orders, newest first
//! dh-cli purchases <uid>
//!
//! # Same, as JSON
//! dh-cli purchases <uid> --json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `purchases` - List a customer's order records

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "dh-cli")]
#[command(author, version, about = "DigitalHub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// List a customer's order records, newest first
    Purchases {
        /// Customer uid
        uid: String,

        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Purchases { uid, json } => commands::purchases::list(&uid, json).await?,
    }
    Ok(())
}
