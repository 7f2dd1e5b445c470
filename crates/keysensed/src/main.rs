//! keysensed - key and scale detection service and CLI
//!
//! Subcommands:
//! - `keysensed serve` - Run the HTTP analysis service
//! - `keysensed wav <file>` - Analyse a WAV file
//! - `keysensed progression <chords...>` - Analyse a chord progression
//! - `keysensed config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keysense_conf::KeysenseConfig;

use keysensed::{build_engine, commands, serve, telemetry};

#[derive(Parser)]
#[command(name = "keysensed")]
#[command(about = "Key and scale detection from audio and chord progressions")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./keysense.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP analysis service
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Analyse a WAV file
    Wav {
        /// Path to a PCM or float WAV file
        file: PathBuf,

        /// Chord progression used to re-rank the audio candidates
        #[arg(long)]
        chords: Option<String>,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyse a chord progression, e.g. `keysensed progression C G Am F`
    Progression {
        /// Chord symbols, separated by spaces, commas or bars
        #[arg(required = true, num_args = 1..)]
        chords: Vec<String>,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = KeysenseConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { port, host } => {
            telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

            let engine = build_engine(&config.analysis)?;
            let serve_config = serve::ServeConfig {
                host: host.unwrap_or_else(|| config.bind.host.clone()),
                port: port.unwrap_or(config.bind.http_port),
            };
            serve::run(serve_config, engine).await
        }
        Commands::Wav { file, chords, json } => {
            telemetry::init_console(&config.telemetry.log_level);
            let engine = build_engine(&config.analysis)?;
            commands::wav(&engine, &file, chords.as_deref(), json)
        }
        Commands::Progression { chords, json } => {
            telemetry::init_console(&config.telemetry.log_level);
            let engine = build_engine(&config.analysis)?;
            commands::progression(&engine, &chords, json)
        }
        Commands::Config => {
            commands::config(&config, &sources);
            Ok(())
        }
    }
}
