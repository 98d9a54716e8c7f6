use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RevoiceError};

/// Language spoken in the input video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Ru,
    En,
    Uk,
    /// Let the transcription service detect the language
    Auto,
}

/// Language of the dubbed audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Uk,
    En,
}

impl SourceLanguage {
    pub const ALL: [SourceLanguage; 4] = [Self::Ru, Self::En, Self::Uk, Self::Auto];

    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
            Self::Uk => "uk",
            Self::Auto => "auto",
        }
    }

    /// Language hint for the transcriber; `None` asks for detection.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            other => Some(other.code()),
        }
    }
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 2] = [Self::Uk, Self::En];

    pub fn code(self) -> &'static str {
        match self {
            Self::Uk => "uk",
            Self::En => "en",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SourceLanguage {
    type Err = RevoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            "uk" => Ok(Self::Uk),
            "auto" => Ok(Self::Auto),
            other => Err(RevoiceError::Configuration(format!(
                "Unsupported source language '{}'. Valid options: ru, en, uk, auto",
                other
            ))),
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = RevoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "uk" => Ok(Self::Uk),
            "en" => Ok(Self::En),
            other => Err(RevoiceError::Configuration(format!(
                "Unsupported target language '{}'. Valid options: uk, en",
                other
            ))),
        }
    }
}

/// Full English name of a language code, used in translation prompts.
/// Unknown codes are returned verbatim.
pub fn display_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "en" => "English",
        "uk" => "Ukrainian",
        "auto" => "detected language",
        other => other,
    }
}
