// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use facecam::config::Config;
use facecam::i18n::Locale;
use i18n_embed::DesktopLanguageRequester;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "facecam")]
#[command(about = "Take a face photo with the front camera, or use an image file")]
#[command(version = facecam::constants::app_info::version())]
struct Cli {
    /// Interface language (en, es); overrides config and environment
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Camera device to use instead of automatic selection
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Open the camera and take a photo
    Capture {
        /// Output file path (default: ~/Pictures/facecam/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the photo as a data: URL instead of raw JPEG
        #[arg(long)]
        data_url: bool,

        /// Capture automatically this many seconds after the camera is ready
        #[arg(short, long)]
        auto: Option<u64>,
    },

    /// Use an existing image instead of the camera
    Upload {
        /// Image file to use
        file: PathBuf,

        /// Output file path (default: ~/Pictures/facecam/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the photo as a data: URL instead of raw JPEG
        #[arg(long)]
        data_url: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=facecam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // A pinned locale wins; otherwise get the system's preferred languages.
    let requested_languages = match config.locale {
        Some(locale) => vec![locale.language_id()],
        None => DesktopLanguageRequester::requested_languages(),
    };

    // Enable localizations to be applied.
    facecam::i18n::init(&requested_languages);

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Capture {
            output,
            data_url,
            auto,
        } => {
            let options = cli::OutputOptions::new(&config, output, data_url);
            cli::capture_photo(&config, options, auto)
        }
        Commands::Upload {
            file,
            output,
            data_url,
        } => {
            let options = cli::OutputOptions::new(&config, output, data_url);
            cli::upload_photo(&config, &file, options)
        }
    }
}

/// Config file, then command line overrides
///
/// Without `--lang` or a configured locale the desktop languages are used.
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;

    if let Some(tag) = &cli.lang {
        let locale =
            Locale::from_tag(tag).ok_or_else(|| format!("unsupported language: {}", tag))?;
        config.locale = Some(locale);
    }

    if let Some(device) = &cli.device {
        config.device_path = Some(device.clone());
    }

    Ok(config)
}
