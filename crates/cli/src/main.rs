//! ri-shop CLI - Database migrations and bootstrap tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema migrations
//! ri-shop-cli migrate
//!
//! # Load the fixture catalog
//! ri-shop-cli seed
//!
//! # Create the first admin
//! ri-shop-cli admin create -e admin@rishop.dev -u admin -p 'S3cure-pass'
//!
//! # Mint an API key with the configured secret
//! ri-shop-cli apikey
//! ```
//!
//! Every command reads the same dotenv file as the server (`--env`, default
//! `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ri-shop-cli")]
#[command(author, version, about = "ri-shop CLI tools")]
struct Cli {
    /// Dotenv file to load
    #[arg(long, global = true, default_value = ".env")]
    env: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the fixture catalog
    Seed,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Mint an API key
    Apikey,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin username
        #[arg(short, long)]
        username: String,

        /// Admin password (at least 8 characters)
        #[arg(short, long)]
        password: String,
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
        Commands::Migrate => commands::migrate::run(&cli.env).await?,
        Commands::Seed => commands::seed::run(&cli.env).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                username,
                password,
            } => {
                commands::admin::create_user(&cli.env, &email, &username, &password).await?;
            }
        },
        Commands::Apikey => commands::apikey::mint(&cli.env)?,
    }
    Ok(())
}
