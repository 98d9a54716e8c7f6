use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{TranslateConfig, resolve_api_key};
use crate::error::Result;
use crate::remote::{AuthScheme, Json, RemoteEndpoint, ServiceKind};
use super::{TextTranslator, build_translation_prompt};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// Translator backed by an OpenAI-compatible chat completions endpoint
pub struct ChatTranslator {
    endpoint: RemoteEndpoint,
    model: String,
    system_prompt: String,
}

impl ChatTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), &config.api_key_env);
        let endpoint = RemoteEndpoint::new(
            ServiceKind::Translation,
            config.endpoint,
            api_key,
            AuthScheme::Bearer,
            config.timeout_secs,
        )?;

        Ok(Self {
            endpoint,
            model: config.model,
            system_prompt: config.system_prompt,
        })
    }
}

#[async_trait]
impl TextTranslator for ChatTranslator {
    fn check_availability(&self) -> Result<()> {
        self.endpoint.require_api_key().map(|_| ())
    }

    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String> {
        self.check_availability()?;
        info!("Translating {} characters from {} to {}", text.len(), source_language, target_language);

        let prompt = build_translation_prompt(text, source_language, target_language);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &self.system_prompt },
                ChatMessage { role: "user", content: &prompt },
            ],
        };

        let Json(response): Json<ChatResponse> = self.endpoint.post(&[], &request).await?;

        let translation = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| self.endpoint.kind().error(200, "response contained no choices".to_string()))?;

        debug!("Translation: {}", translation);
        info!("Translation completed ({} characters)", translation.len());
        Ok(translation)
    }
}
