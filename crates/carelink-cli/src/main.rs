use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "carelink")]
#[command(about = "CareLink assistant - remote assistant with a local fallback", long_about = None)]
struct Cli {
    /// Directory holding config.toml and secret.json (defaults to the user config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Overrides the remote timeout, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Enables debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// Caller id attached to every message
        #[arg(long)]
        caller: Option<String>,
        /// Portal location attached to every message
        #[arg(long)]
        location: Option<String>,
    },
    /// Sends one message and prints the response
    Ask {
        text: String,
        #[arg(long)]
        caller: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Prints the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Checks whether the remote assistant is reachable
    Probe {
        /// Creates and deletes a thread instead of looking up the assistant
        #[arg(long)]
        throwaway_thread: bool,
    },
    /// Creates the secret.json template
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = commands::utils::ServiceOptions {
        config_dir: cli.config_dir,
        timeout_secs: cli.timeout_secs,
    };

    match cli.command {
        Commands::Chat { caller, location } => commands::chat::run(&options, caller, location).await?,
        Commands::Ask {
            text,
            caller,
            location,
            json,
        } => commands::ask::run(&options, text, caller, location, json).await?,
        Commands::Probe { throwaway_thread } => {
            commands::probe::run(&options, throwaway_thread).await?
        }
        Commands::Init => commands::init::run(&options)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
