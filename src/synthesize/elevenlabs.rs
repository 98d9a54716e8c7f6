use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::{SynthesisConfig, resolve_api_key};
use crate::error::Result;
use crate::remote::{AuthScheme, RemoteEndpoint, ServiceKind};
use super::{SpeechSynthesizer, voice_for};

const STABILITY: f32 = 0.5;
const SIMILARITY_BOOST: f32 = 0.5;

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs text-to-speech client; the voice id is the last URL segment
pub struct ElevenLabsSynthesizer {
    endpoint: RemoteEndpoint,
    model_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), &config.api_key_env);
        let endpoint = RemoteEndpoint::new(
            ServiceKind::Synthesis,
            config.endpoint,
            api_key,
            AuthScheme::Header("xi-api-key"),
            config.timeout_secs,
        )?
        .accept("audio/mpeg");

        Ok(Self {
            endpoint,
            model_id: config.model_id,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn check_availability(&self) -> Result<()> {
        self.endpoint.require_api_key().map(|_| ())
    }

    async fn synthesize(&self, text: &str, target_language: &str) -> Result<Vec<u8>> {
        self.check_availability()?;

        let voice = voice_for(target_language);
        info!("Synthesizing {} characters for language {} with voice {}", text.len(), target_language, voice);

        let request = SynthesisRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: STABILITY,
                similarity_boost: SIMILARITY_BOOST,
            },
        };

        let audio: Vec<u8> = self.endpoint.post(&[voice], &request).await?;
        if audio.is_empty() {
            return Err(self.endpoint.kind().error(200, "empty audio payload".to_string()));
        }

        info!("Speech synthesis completed ({} bytes)", audio.len());
        Ok(audio)
    }
}
