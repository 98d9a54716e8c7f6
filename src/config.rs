use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, RevoiceError};

fn default_gateway_key_env() -> String {
    "AI_GATEWAY_API_KEY".to_string()
}

fn default_synthesis_key_env() -> String {
    "ELEVENLABS_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub codec: CodecConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub synthesis: SynthesisConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Wall-clock bound on the audio extraction transcode, in seconds
    pub extraction_timeout_secs: u64,
    /// Sample rate of the extracted WAV
    pub sample_rate: u32,
    /// Parent directory for the engine's scratch namespace (system temp dir if unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Speech-to-text endpoint URL
    pub endpoint: String,
    /// Transcription model name
    pub model: String,
    /// API key; falls back to the environment variable named by `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_gateway_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// System message sent ahead of the translation prompt
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_gateway_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Text-to-speech base URL; the voice id is appended as the last path segment
    pub endpoint: String,
    /// Multilingual synthesis model id
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_synthesis_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving finished videos
    pub output_dir: PathBuf,
    /// Public URL prefix under which `output_dir` is served, if any
    #[serde(default)]
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Jobs allowed to run at once in batch mode
    pub max_concurrent_jobs: usize,
    /// Inputs larger than this are processed with a warning
    pub large_input_warning_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            codec: CodecConfig {
                binary_path: "ffmpeg".to_string(),
                extraction_timeout_secs: 300,
                sample_rate: 24_000,
                scratch_dir: None,
            },
            transcriber: TranscriberConfig {
                endpoint: "https://ai.gateway.lovable.dev/v1/audio/transcriptions".to_string(),
                model: "whisper-1".to_string(),
                api_key: None,
                api_key_env: default_gateway_key_env(),
                timeout_secs: default_request_timeout_secs(),
            },
            translate: TranslateConfig {
                endpoint: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
                model: "google/gemini-2.5-flash".to_string(),
                system_prompt: "You are a professional translator. Translate text accurately while preserving the tone and meaning.".to_string(),
                api_key: None,
                api_key_env: default_gateway_key_env(),
                timeout_secs: default_request_timeout_secs(),
            },
            synthesis: SynthesisConfig {
                endpoint: "https://api.elevenlabs.io/v1/text-to-speech".to_string(),
                model_id: "eleven_multilingual_v2".to_string(),
                api_key: None,
                api_key_env: default_synthesis_key_env(),
                timeout_secs: default_request_timeout_secs(),
            },
            storage: StorageConfig {
                output_dir: PathBuf::from("output"),
                public_base_url: None,
            },
            pipeline: PipelineConfig {
                max_concurrent_jobs: 2,
                large_input_warning_mb: 50,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RevoiceError::Configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RevoiceError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RevoiceError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RevoiceError::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Resolve a credential from an explicit value or the named environment variable.
/// Blank values count as absent.
pub fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revoice.toml");

        let mut config = Config::default();
        config.codec.extraction_timeout_secs = 42;
        config.storage.public_base_url = Some("https://cdn.example.com/videos".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.codec.extraction_timeout_secs, 42);
        assert_eq!(loaded.codec.sample_rate, 24_000);
        assert_eq!(
            loaded.storage.public_base_url.as_deref(),
            Some("https://cdn.example.com/videos")
        );
        assert!(loaded.transcriber.api_key.is_none());
    }

    #[test]
    fn test_synthesis_section_defaults_key_variable() {
        let synthesis: SynthesisConfig = toml::from_str(
            r#"
            endpoint = "https://api.elevenlabs.io/v1/text-to-speech"
            model_id = "eleven_multilingual_v2"
            "#,
        )
        .unwrap();
        assert_eq!(synthesis.api_key_env, "ELEVENLABS_API_KEY");
        assert_eq!(synthesis.timeout_secs, 300);
        assert!(synthesis.api_key.is_none());
    }

    #[test]
    fn test_malformed_config_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[codec\nbinary_path = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, RevoiceError::Configuration(_)));
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit_value() {
        let key = resolve_api_key(Some(" secret "), "REVOICE_TEST_UNSET_VARIABLE_A");
        assert_eq!(key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_resolve_api_key_treats_blank_as_missing() {
        assert_eq!(resolve_api_key(Some("   "), "REVOICE_TEST_UNSET_VARIABLE_B"), None);
        assert_eq!(resolve_api_key(None, "REVOICE_TEST_UNSET_VARIABLE_C"), None);
    }
}
