// Text-to-speech
//
// Voices are chosen per target language from a fixed table.

pub mod elevenlabs;

use async_trait::async_trait;

use crate::config::SynthesisConfig;
use crate::error::Result;

/// Main trait for speech synthesis operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Fail fast with `Configuration` if the service cannot be called
    fn check_availability(&self) -> Result<()>;

    /// Synthesize `text` in `target_language`; returns compressed audio (MP3)
    async fn synthesize(&self, text: &str, target_language: &str) -> Result<Vec<u8>>;
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create_synthesizer(config: SynthesisConfig) -> Result<Box<dyn SpeechSynthesizer>> {
        Ok(Box::new(elevenlabs::ElevenLabsSynthesizer::new(config)?))
    }
}

const VOICE_EN: &str = "9BWtsMINqrJLrRacOk9x";
const VOICE_UK: &str = "EXAVITQu4vr4xnSDxMaL";
const VOICE_RU: &str = "pFZP5JQG7iQjIQuC4Bku";

/// Voice identifier for a language code; unknown codes use the English voice.
pub fn voice_for(language: &str) -> &'static str {
    match language {
        "uk" => VOICE_UK,
        "ru" => VOICE_RU,
        _ => VOICE_EN,
    }
}
