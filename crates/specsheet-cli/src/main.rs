mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::generate::GenerateArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specsheet",
    about = "Turn a product idea into a software specification",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file; environment variables override its values
    #[arg(long, global = true, env = "SPECSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and web UI
    Serve {
        /// Port to listen on (0 = OS-assigned; default from config)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default from config)
        #[arg(long)]
        bind: Option<String>,

        /// Open the UI in a browser once listening
        #[arg(long)]
        open: bool,
    },

    /// Generate one specification and print it (nothing is stored)
    Generate(GenerateArgs),

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve { port, bind, open } => cmd::serve::run(config_path, port, bind, open),
        Commands::Generate(args) => cmd::generate::run(config_path, args, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
