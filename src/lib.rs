//! Revoice - Video Speech Translation Pipeline
//!
//! Extracts the speech of a video, transcribes and translates it, synthesizes
//! a dubbed voice track and muxes it back over the original picture using
//! ffmpeg and remote speech/translation services.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod language;
pub mod media;
pub mod progress;
pub mod remote;
pub mod storage;
pub mod synthesize;
pub mod transcribe;
pub mod translate;
pub mod workflow;
