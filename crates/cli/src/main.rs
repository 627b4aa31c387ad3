use std::{path::PathBuf, process};

use clap::{Parser, Subcommand};
use tickstream_types::constants::DOTENV_FILE_NAME;
use tracing_subscriber::EnvFilter;

mod config;
mod countries;
mod serve;

use config::Config;

#[derive(Clone, Debug)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, config: Config) -> Self {
        Context {
            config_path,
            config,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Tickstream - resumable, clock-aligned event streams", long_about = None)]
struct Opts {
    /// Path to a TOML config file; command-line flags and environment variables take precedence
    #[arg(long = "config", short = 'c', global = true, env = "TICKSTREAM_CONFIG")]
    config_path: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the HTTP server
    Serve(serve::ServeCommand),
    /// Print the dataset snapshot as JSON
    Countries(countries::CountriesCommand),
}

#[tokio::main]
async fn main() {
    // Must run before parsing so that clap sees variables from the dotenv file
    load_env_file();

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    init_tracing();

    let config = match &opts.config_path {
        Some(path) => match Config::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let ctx = Context::new(opts.config_path.clone(), config);

    if let Err(e) = handle_command(opts.command, &ctx).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Load environment variables from a .env file in the working directory, if any
fn load_env_file() {
    match dotenvy::from_filename(DOTENV_FILE_NAME) {
        Ok(path) => {
            eprintln!("✓ Loaded environment from {}", path.display());
        }
        Err(e) if e.not_found() => {}
        Err(e) => {
            eprintln!("Warning: Failed to load {} file: {}", DOTENV_FILE_NAME, e);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_command(command: Command, ctx: &Context) -> Result<(), String> {
    match command {
        Command::Serve(cmd) => cmd.execute(ctx).await.map_err(|e| e.to_string()),
        Command::Countries(cmd) => cmd.execute(ctx).map_err(|e| e.to_string()),
    }
}
