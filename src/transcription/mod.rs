//! Audio to diarized transcript, behind a provider-neutral trait

pub mod client;

pub use client::*;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TranscriptionError;
use crate::models::Transcript;

/// Options sent with every transcription job
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionConfig {
    /// Language of the call audio ("es", "en", ...)
    pub language_code: String,
    /// Hint for the diarizer; customer plus agent by default
    pub speakers_expected: u32,
    /// One speaker per stereo channel instead of diarization
    pub dual_channel: bool,
    pub punctuate: bool,
    pub format_text: bool,
    /// Delay between status checks
    pub poll_interval: Duration,
    /// Status checks before giving up
    pub max_polls: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language_code: "es".to_string(),
            speakers_expected: 2,
            dual_channel: false,
            punctuate: true,
            format_text: true,
            poll_interval: Duration::from_secs(3),
            max_polls: 60,
        }
    }
}

/// External speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        config: &TranscriptionConfig,
    ) -> Result<Transcript, TranscriptionError>;
}
