use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{TranscriberConfig, resolve_api_key};
use crate::error::Result;
use crate::language::SourceLanguage;
use crate::remote::{AuthScheme, Json, RemoteEndpoint, ServiceKind};
use super::{SpeechTranscriber, Transcript};

#[derive(Debug, Serialize)]
struct TranscriptionRequest<'a> {
    audio: String,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Transcriber backed by a JSON transcription endpoint taking base64 audio
pub struct GatewayTranscriber {
    endpoint: RemoteEndpoint,
    model: String,
}

impl GatewayTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), &config.api_key_env);
        let endpoint = RemoteEndpoint::new(
            ServiceKind::Transcription,
            config.endpoint,
            api_key,
            AuthScheme::Bearer,
            config.timeout_secs,
        )?;

        Ok(Self {
            endpoint,
            model: config.model,
        })
    }
}

#[async_trait]
impl SpeechTranscriber for GatewayTranscriber {
    fn check_availability(&self) -> Result<()> {
        self.endpoint.require_api_key().map(|_| ())
    }

    async fn transcribe(&self, audio: &[u8], source_language: SourceLanguage) -> Result<Transcript> {
        self.check_availability()?;
        info!("Transcribing {} bytes of audio (language: {})", audio.len(), source_language);

        let request = TranscriptionRequest {
            audio: STANDARD.encode(audio),
            model: &self.model,
            language: source_language.hint(),
        };

        let Json(response): Json<TranscriptionResponse> = self.endpoint.post(&[], &request).await?;

        info!("Transcription completed ({} characters)", response.text.len());
        Ok(Transcript {
            text: response.text.trim().to_string(),
            language: response.language,
        })
    }
}
