// Transcript translation
//
// A single-turn prompt is sent to a chat-completions model; the reply is
// taken as the translation without further validation.

pub mod chat;

use async_trait::async_trait;

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::language::display_name;

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextTranslator: Send + Sync {
    /// Fail fast with `Configuration` if the service cannot be called
    fn check_availability(&self) -> Result<()>;

    /// Translate `text` between two language codes
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Box<dyn TextTranslator>> {
        Ok(Box::new(chat::ChatTranslator::new(config)?))
    }
}

/// Build the translation instruction naming both languages in full.
pub fn build_translation_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "Translate the following text from {} to {}. \
         Only return the translation, without any additional commentary or explanation:\n\n{}",
        display_name(source_language),
        display_name(target_language),
        text
    )
}
