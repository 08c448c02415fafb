//! Helperbot CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway (webhook + chat API)
//! - `poll`: Run the Telegram bot with long polling
//! - `ask`: Ask one question from the terminal
//! - `check-config`: Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "helperbot",
    about = "Helperbot: hackathon helper bot over a retrieval corpus",
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

    /// Run the Telegram bot with long polling
    Poll,

    /// Ask a single question
    Ask {
        /// Conversation identifier; reuse it to keep history
        #[arg(short, long, default_value = "cli")]
        conversation: String,

        /// The question
        question: String,
    },

    /// Print the effective configuration and corpus size
    CheckConfig,
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
        Commands::Poll => commands::poll::run().await?,
        Commands::Ask {
            conversation,
            question,
        } => commands::ask::run(&conversation, &question).await?,
        Commands::CheckConfig => commands::check_config::run().await?,
    }

    Ok(())
}
