//! Revoice - Video Speech Translation Pipeline
//!
//! Command line entry point: translates and dubs single videos or whole
//! directories, and exposes the codec operations on their own.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use revoice::cli::{Args, Commands};
use revoice::config::Config;
use revoice::job::VideoSource;
use revoice::media::MediaCodecFactory;
use revoice::progress::{ProgressEvent, ProgressObserver};
use revoice::workflow::Workflow;

const CONFIG_FILE: &str = "revoice.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Revoice - Video Speech Translation Pipeline");

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", CONFIG_FILE);
                Config::from_file(CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("Refusing to overwrite existing file {}", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Translate {
            input,
            source,
            target,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.storage.output_dir = dir;
            }
            let codec = MediaCodecFactory::create_shared(config.codec.clone());
            let workflow = Workflow::new(&config, codec)?;

            info!("Translating video: {}", input);
            let observer = BarObserver::new();
            let result = workflow
                .translate_source(VideoSource::from_location(&input), source, target, &observer)
                .await;
            observer.finish();
            let outcome = result?;

            println!("\nOriginal ({}):", outcome.detected_language.as_deref().unwrap_or(source.code()));
            println!("{}", outcome.original_text);
            println!("\nTranslated ({}):", target);
            println!("{}", outcome.translated_text);
            println!(
                "\nSaved {} in {}",
                outcome.artifact.location,
                format_duration(outcome.elapsed_secs.round() as u64)
            );
        }
        Commands::Batch {
            input_dir,
            source,
            target,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.storage.output_dir = dir;
            }
            let codec = MediaCodecFactory::create_shared(config.codec.clone());
            let workflow = Arc::new(Workflow::new(&config, codec)?);

            let summary = workflow.process_directory(&input_dir, source, target).await?;

            println!("\nCompleted: {}", summary.completed.len());
            for (path, outcome) in &summary.completed {
                println!("  {} -> {}", path.display(), outcome.artifact.location);
            }
            if !summary.failed.is_empty() {
                println!("Failed: {}", summary.failed.len());
                for (path, reason) in &summary.failed {
                    println!("  {}: {}", path.display(), reason);
                }
            }
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let codec = MediaCodecFactory::create_shared(config.codec.clone());
            info!("Using {}", codec.version().await?);
            let workflow = Workflow::new(&config, codec)?;

            let video = VideoSource::File(input).into_bytes().await?;
            let audio = workflow.extract_audio(&video).await?;
            tokio::fs::write(&output, &audio).await?;
            info!("Audio written to {}", output.display());
        }
        Commands::Remux { video, audio, output } => {
            info!("Replacing audio of: {}", video.display());
            let codec = MediaCodecFactory::create_shared(config.codec.clone());
            let workflow = Workflow::new(&config, codec)?;

            let video_bytes = VideoSource::File(video).into_bytes().await?;
            let audio_bytes = tokio::fs::read(&audio).await?;
            let remuxed = workflow.remux(&video_bytes, &audio_bytes).await?;
            tokio::fs::write(&output, &remuxed).await?;
            info!("Video written to {}", output.display());
        }
    }

    info!("Revoice finished successfully");
    Ok(())
}

/// Renders job progress as a terminal progress bar
struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("Invalid progress bar template: {}", e),
        }
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

impl ProgressObserver for BarObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        self.bar.set_position(event.percent as u64);
        let message = match event.eta_seconds {
            Some(eta) if event.percent < 100 => format!("{} (about {} left)", event.stage_label, format_duration(eta)),
            _ => event.stage_label.clone(),
        };
        self.bar.set_message(message);
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".revoice").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "revoice.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("revoice.log").display());

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
