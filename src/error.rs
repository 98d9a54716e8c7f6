use thiserror::Error;

use crate::job::JobStage;

#[derive(Error, Debug)]
pub enum RevoiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Codec engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Codec execution failed: {0}")]
    CodecExecution(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Transcription service returned {status}: {body}")]
    TranscriptionService { status: u16, body: String },

    #[error("Translation service returned {status}: {body}")]
    TranslationService { status: u16, body: String },

    #[error("Synthesis service returned {status}: {body}")]
    SynthesisService { status: u16, body: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: JobStage,
        #[source]
        source: Box<RevoiceError>,
    },
}

/// Coarse failure category reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Serialization,
    Transport,
    Configuration,
    EngineUnavailable,
    CodecExecution,
    Timeout,
    TranscriptionService,
    TranslationService,
    SynthesisService,
    UnsupportedOperation,
}

impl RevoiceError {
    /// Wrap an error with the identity of the stage it escaped from.
    pub fn in_stage(self, stage: JobStage) -> Self {
        match self {
            // Already annotated further down; keep the innermost stage.
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage the error was raised in, if it has been annotated.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Toml(_) => ErrorKind::Serialization,
            Self::Http(_) => ErrorKind::Transport,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::CodecExecution(_) => ErrorKind::CodecExecution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::TranscriptionService { .. } => ErrorKind::TranscriptionService,
            Self::TranslationService { .. } => ErrorKind::TranslationService,
            Self::SynthesisService { .. } => ErrorKind::SynthesisService,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::Stage { source, .. } => source.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RevoiceError>;
