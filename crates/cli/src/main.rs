//! RecallChat CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Seed the passage index and start the HTTP gateway
//! - `ask`     — Run a single chat turn from the terminal
//! - `init`    — Write the default config file
//! - `status`  — Show the effective configuration and backend health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "recallchat",
    about = "RecallChat — selective-context RAG chat service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single message and print the reply
    Ask {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Session key (only meaningful within this process)
        #[arg(short, long, default_value = recallchat_memory::DEFAULT_SESSION)]
        session: String,
    },

    /// Write the default configuration file
    Init,

    /// Show effective configuration and backend health
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { message, session } => commands::ask::run(&message, &session).await?,
        Commands::Init => commands::init::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
