// Media codec layer
//
// Wraps a single ffmpeg engine shared by every job in the process:
// - Commands: argument builders and progress-following execution
// - Scratch: the engine's private file namespace with scoped cleanup
// - Processor: the lazily loaded engine and the two codec operations

pub mod commands;
pub mod processor;
pub mod scratch;

use async_trait::async_trait;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::CodecConfig;
use crate::error::Result;

/// Callback receiving codec progress as an integer percentage.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Codec operations used by the pipeline
#[async_trait]
pub trait MediaCodec: Send + Sync {
    /// Extract the audio track as mono 16-bit PCM WAV.
    ///
    /// `scope` namespaces the scratch files of this call (normally the job id).
    async fn extract_audio(
        &self,
        scope: &str,
        video: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>>;

    /// Replace the audio track of `video` with `audio`, keeping the video stream as is.
    async fn remux(
        &self,
        scope: &str,
        video: &[u8],
        audio: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>>;

    /// Files currently present in the engine's scratch namespace
    fn list_files(&self) -> Result<Vec<String>>;

    /// Engine version information, loading the engine if needed
    async fn version(&self) -> Result<String>;
}

/// Factory for creating the shared codec handle
pub struct MediaCodecFactory;

impl MediaCodecFactory {
    /// Create the process-wide codec handle (FFmpeg-based). The engine
    /// itself is loaded on first use.
    pub fn create_shared(config: CodecConfig) -> Arc<dyn MediaCodec> {
        Arc::new(processor::FfmpegCodec::new(config))
    }
}
