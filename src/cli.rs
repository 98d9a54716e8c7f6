use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::language::{SourceLanguage, TargetLanguage};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate the speech of a single video and dub it
    Translate {
        /// Input video file
        #[arg(short, long)]
        input: String,

        /// Spoken language of the input
        #[arg(short, long, value_enum, default_value = "auto")]
        source: SourceLanguage,

        /// Language of the dubbed output
        #[arg(short, long, value_enum, default_value = "uk")]
        target: TargetLanguage,

        /// Output directory for translated videos
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Translate all video files in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Spoken language of the inputs
        #[arg(short, long, value_enum, default_value = "auto")]
        source: SourceLanguage,

        /// Language of the dubbed outputs
        #[arg(short, long, value_enum, default_value = "uk")]
        target: TargetLanguage,

        /// Output directory for translated videos
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Extract audio from video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the audio track of a video
    Remux {
        /// Input video file
        #[arg(long)]
        video: PathBuf,

        /// Replacement audio (MP3)
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "revoice.toml")]
        path: PathBuf,
    },
}
