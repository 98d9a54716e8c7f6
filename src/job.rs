use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, RevoiceError};
use crate::language::{SourceLanguage, TargetLanguage};
use crate::storage::ArtifactRef;

/// Unique identifier of a translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix used to namespace scratch files and artifact names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a job in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum JobStage {
    Idle,
    Extracting,
    Transcribing,
    Translating,
    Synthesizing,
    Remuxing,
    /// Handing the finished video to storage
    Finalizing,
    Completed,
    Failed,
}

impl JobStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Synthesizing => "synthesizing",
            Self::Remuxing => "remuxing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Human-readable label carried by progress events.
    pub fn description(self) -> &'static str {
        match self {
            Self::Idle => "Waiting",
            Self::Extracting => "Extracting audio",
            Self::Transcribing => "Transcribing audio",
            Self::Translating => "Translating transcript",
            Self::Synthesizing => "Synthesizing speech",
            Self::Remuxing => "Combining audio with video",
            Self::Finalizing => "Saving translated video",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Overall progress band `(start, end)` owned by the stage.
    pub fn band(self) -> (u8, u8) {
        match self {
            Self::Idle => (0, 0),
            Self::Extracting => (0, 20),
            Self::Transcribing => (25, 60),
            Self::Translating => (60, 70),
            Self::Synthesizing => (70, 80),
            Self::Remuxing => (80, 95),
            Self::Finalizing => (95, 100),
            Self::Completed => (100, 100),
            Self::Failed => (0, 0),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The stage that follows on success.
    pub fn next(self) -> Option<JobStage> {
        match self {
            Self::Idle => Some(Self::Extracting),
            Self::Extracting => Some(Self::Transcribing),
            Self::Transcribing => Some(Self::Translating),
            Self::Translating => Some(Self::Synthesizing),
            Self::Synthesizing => Some(Self::Remuxing),
            Self::Remuxing => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the input video comes from.
#[derive(Debug, Clone)]
pub enum VideoSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    Url(String),
}

impl VideoSource {
    /// Interpret a user-supplied location. Anything that looks like a URL is
    /// kept as such so it can be rejected with a useful message.
    pub fn from_location(location: &str) -> Self {
        if looks_like_url(location) {
            return Self::Url(location.to_string());
        }
        let trimmed = location.trim();
        match trimmed.get(..7) {
            Some(scheme) if scheme.eq_ignore_ascii_case("file://") => Self::File(PathBuf::from(&trimmed[7..])),
            _ => Self::File(PathBuf::from(location)),
        }
    }

    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::File(path) => read_video(&path).await,
            Self::Url(url) => Err(RevoiceError::UnsupportedOperation(format!(
                "Direct URL downloads are not supported ({}). Download the video first and supply it as a file.",
                url
            ))),
        }
    }
}

fn looks_like_url(location: &str) -> bool {
    let lower = location.trim().to_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("www.")
        || (lower.contains("://") && !lower.starts_with("file://"))
}

async fn read_video(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading input video {}", path.display());
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RevoiceError::Configuration(format!("Input video not found: {}", path.display()))
        } else {
            RevoiceError::Io(e)
        }
    })
}

/// A translation request as submitted by the caller.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub video: Vec<u8>,
    pub source_language: SourceLanguage,
    pub target_language: TargetLanguage,
}

/// Live state of one job while the orchestrator drives it.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub source_language: SourceLanguage,
    pub target_language: TargetLanguage,
    video: Option<Vec<u8>>,
    stage: JobStage,
    started: Instant,
    percent: u8,
    eta_seconds: Option<u64>,
}

impl Job {
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: JobId::new(),
            source_language: request.source_language,
            target_language: request.target_language,
            video: Some(request.video),
            stage: JobStage::Idle,
            started: Instant::now(),
            percent: 0,
            eta_seconds: None,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn eta_seconds(&self) -> Option<u64> {
        self.eta_seconds
    }

    /// Hand the source video over; the job keeps no copy afterwards.
    pub fn take_video(&mut self) -> Option<Vec<u8>> {
        self.video.take()
    }

    /// Move to the next stage. Only forward transitions are accepted.
    pub fn advance(&mut self, to: JobStage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(RevoiceError::Configuration(format!(
                "Invalid job transition {} -> {}",
                self.stage, to
            )));
        }
        self.stage = to;
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = JobStage::Failed;
        }
        self.video = None;
    }

    pub fn record_progress(&mut self, percent: u8, eta_seconds: Option<u64>) {
        self.percent = self.percent.max(percent.min(100));
        self.eta_seconds = eta_seconds;
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationOutcome {
    pub job_id: JobId,
    pub original_text: String,
    pub translated_text: String,
    /// Language reported by the transcriber, when it detected one
    pub detected_language: Option<String>,
    pub artifact: ArtifactRef,
    pub elapsed_secs: f64,
}
