//! Ragway CLI: the main entry point.
//!
//! Commands:
//! - `gateway`  Start the HTTP API server
//! - `agent`    Run the retrieval agent on one message
//! - `extract`  Structured extraction from text
//! - `onboard`  Write a starter config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragway",
    about = "Ragway: retrieval-agent gateway",
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
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the retrieval agent a single question
    Agent {
        /// The user message
        #[arg(short, long)]
        message: String,

        /// Print the whole transcript as JSON instead of streaming the answer
        #[arg(long)]
        full: bool,
    },

    /// Extract tone, entity, and word count from a piece of text
    Extract {
        /// The text to analyse
        input: String,
    },

    /// Write a starter config file
    Onboard,
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
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Agent { message, full } => commands::agent::run(message, full).await?,
        Commands::Extract { input } => commands::extract::run(input).await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
