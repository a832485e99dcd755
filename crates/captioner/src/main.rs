//! Captioner CLI - Batch image captioning with interchangeable vision-model backends.
//!
//! Captioner walks a folder of images, sends each one to a configured
//! vision-language model, and writes the caption next to the image as a
//! `.txt` sidecar, the layout most fine-tuning tools expect.
//!
//! # Usage
//!
//! ```bash
//! # Caption a folder with the default backend
//! captioner caption ./photos/
//!
//! # Pick a backend and a trigger phrase, leave existing captions alone
//! captioner caption ./photos/ --backend pixtral --trigger "ohwx style" --skip-existing
//!
//! # See which backends are configured and usable
//! captioner backends
//!
//! # View configuration
//! captioner config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Captioner - Batch image captioning with interchangeable vision-model backends.
#[derive(Parser, Debug)]
#[command(name = "captioner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "CAPTIONER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate captions for an image or a folder of images
    Caption(cli::caption::CaptionArgs),

    /// List configured backends and whether they can be used
    Backends,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let source = cli::ConfigSource::new(cli.config.as_deref());
    let config = source.load()?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Captioner v{}", captioner_core::VERSION);

    match cli.command {
        Commands::Caption(args) => cli::caption::execute(args, config).await,
        Commands::Backends => cli::backends::execute(config),
        Commands::Config(args) => cli::config::execute(args, &source, &config),
    }
}
