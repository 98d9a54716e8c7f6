// Speech-to-text
//
// The pipeline only depends on the SpeechTranscriber trait; the gateway
// implementation talks to an OpenAI-compatible transcription endpoint.

pub mod gateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TranscriberConfig;
use crate::error::Result;
use crate::language::SourceLanguage;

/// Plain-text transcript of the extracted audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Language detected by the service, when it reports one
    pub language: Option<String>,
}

/// Main trait for transcription operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Fail fast with `Configuration` if the service cannot be called
    fn check_availability(&self) -> Result<()>;

    /// Transcribe WAV audio; `SourceLanguage::Auto` lets the service detect the language
    async fn transcribe(&self, audio: &[u8], source_language: SourceLanguage) -> Result<Transcript>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(config: TranscriberConfig) -> Result<Box<dyn SpeechTranscriber>> {
        Ok(Box::new(gateway::GatewayTranscriber::new(config)?))
    }
}
