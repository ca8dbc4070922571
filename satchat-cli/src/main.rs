//! Main entry point for the SatChat terminal client.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{error::Error, path::PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;

/// SatChat CLI
#[derive(Parser)]
#[command(name = "satchat")]
#[command(about = "Terminal client for the Satoshi crypto-assistant chat service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the SatChat CLI
#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Room to open; omit to start from the room-less composer
        #[arg(
            long,
            help = "Identifier of the room to open. Omit to start from the room-less composer and let the first message create a room."
        )]
        room: Option<String>,

        /// REST base URL override
        #[arg(long, help = "REST base URL override (e.g. http://localhost:8080/)")]
        server: Option<Url>,

        /// Path to the configuration file (optional)
        #[arg(
            long,
            short,
            help = "Path to the configuration file (config.yaml or config.json). If not provided, defaults will be used."
        )]
        config: Option<PathBuf>,
    },

    /// Manage the room directory
    Rooms {
        #[command(subcommand)]
        action: commands::rooms::RoomsCommand,
    },

    /// Manage the authenticated session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionCommand,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SATCHAT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            room,
            server,
            config,
        } => {
            commands::chat::run_chat(room, server, config).await?;
        }
        Commands::Rooms { action } => {
            commands::rooms::run(action).await?;
        }
        Commands::Session { action } => {
            commands::session::run(action).await?;
        }
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format)?;
        }
        Commands::Completion { shell } => {
            let shell = shell
                .parse::<clap_complete::Shell>()
                .expect("Invalid shell type provided");
            commands::completion::generate_completion(shell);
        }
    }

    Ok(())
}
