use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, TranscriptionError};
use crate::models::{AssemblyAiTranscript, Transcript};
use crate::transcription::{Transcriber, TranscriptionConfig};

pub const ASSEMBLYAI_API_KEY_VAR: &str = "ASSEMBLYAI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

/// Configuration for the AssemblyAI client
#[derive(Debug, Clone)]
pub struct AssemblyAiConfig {
    /// API key (from ASSEMBLYAI_API_KEY env var)
    pub api_key: String,
    pub base_url: String,
}

impl AssemblyAiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(ASSEMBLYAI_API_KEY_VAR).unwrap_or_default();
        Self::new(api_key)
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(ASSEMBLYAI_API_KEY_VAR));
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }
}

/// AssemblyAI upload-then-poll transcription client
pub struct AssemblyAiClient {
    client: Client,
    config: AssemblyAiConfig,
}

impl AssemblyAiClient {
    pub fn new(config: AssemblyAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Upload raw audio bytes, returning the private URL to transcribe
    async fn upload(&self, audio: Vec<u8>) -> Result<String, TranscriptionError> {
        let response = self
            .client
            .post(self.url("/v2/upload"))
            .header("authorization", &self.config.api_key)
            .header("content-type", "application/octet-stream")
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_error(status, body));
        }

        let upload: UploadResponse = response.json().await?;
        debug!("Uploaded audio to {}", upload.upload_url);
        Ok(upload.upload_url)
    }

    async fn submit(
        &self,
        audio_url: &str,
        config: &TranscriptionConfig,
    ) -> Result<AssemblyAiTranscript, TranscriptionError> {
        let request = TranscriptRequest::new(audio_url, config);
        let response = self
            .client
            .post(self.url("/v2/transcript"))
            .header("authorization", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_error(status, body));
        }
        Ok(response.json().await?)
    }

    async fn fetch(&self, id: &str) -> Result<AssemblyAiTranscript, TranscriptionError> {
        let response = self
            .client
            .get(self.url(&format!("/v2/transcript/{}", id)))
            .header("authorization", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_error(status, body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Transcriber for AssemblyAiClient {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        config: &TranscriptionConfig,
    ) -> Result<Transcript, TranscriptionError> {
        info!(
            "Transcribing {} bytes of audio (language {}, {} speakers expected)",
            audio.len(),
            config.language_code,
            config.speakers_expected
        );

        let audio_url = self.upload(audio).await?;
        let mut job = self.submit(&audio_url, config).await?;
        info!("Transcription job {} submitted", job.id);

        for poll in 0..config.max_polls {
            if let Some(result) = finished(job.clone())? {
                info!(
                    "Transcription {} completed after {} status checks ({} utterances)",
                    job.id,
                    poll,
                    result.utterances.len()
                );
                return Ok(result);
            }
            debug!("Transcription {} status: {}", job.id, job.status);
            tokio::time::sleep(config.poll_interval).await;
            job = self.fetch(&job.id).await?;
        }

        match finished(job)? {
            Some(result) => Ok(result),
            None => Err(TranscriptionError::TimedOut {
                polls: config.max_polls,
            }),
        }
    }
}

/// `Some` once the job is completed, `None` while queued or processing
fn finished(job: AssemblyAiTranscript) -> Result<Option<Transcript>, TranscriptionError> {
    match job.status.as_str() {
        "completed" => {
            let transcript = Transcript::from(job);
            if transcript.utterances.iter().all(|u| u.text.is_empty()) {
                return Err(TranscriptionError::NoSpeech);
            }
            Ok(Some(transcript))
        }
        "error" => {
            let message = job.error.unwrap_or_else(|| "unknown error".to_string());
            Err(job_error(message))
        }
        _ => Ok(None),
    }
}

fn job_error(message: String) -> TranscriptionError {
    let lower = message.to_lowercase();
    if lower.contains("does not appear to contain audio")
        || lower.contains("unsupported")
        || lower.contains("format")
    {
        TranscriptionError::UnsupportedFormat(message)
    } else if lower.contains("no spoken audio") || lower.contains("no speech") {
        TranscriptionError::NoSpeech
    } else {
        TranscriptionError::Failed(message)
    }
}

fn upload_error(status: StatusCode, body: String) -> TranscriptionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscriptionError::Unauthorized,
        StatusCode::UNSUPPORTED_MEDIA_TYPE => TranscriptionError::UnsupportedFormat(body),
        s => TranscriptionError::UploadRejected(format!("{} - {}", s, body)),
    }
}

fn request_error(status: StatusCode, body: String) -> TranscriptionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscriptionError::Unauthorized,
        s => TranscriptionError::Failed(format!("{} - {}", s, body)),
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    language_code: &'a str,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    speakers_expected: Option<u32>,
    dual_channel: bool,
    punctuate: bool,
    format_text: bool,
}

impl<'a> TranscriptRequest<'a> {
    fn new(audio_url: &'a str, config: &'a TranscriptionConfig) -> Self {
        // Dual-channel audio is already separated; diarization only applies to mono
        let diarize = !config.dual_channel;
        Self {
            audio_url,
            language_code: &config.language_code,
            speaker_labels: diarize,
            speakers_expected: diarize.then_some(config.speakers_expected),
            dual_channel: config.dual_channel,
            punctuate: config.punctuate,
            format_text: config.format_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: &str) -> AssemblyAiTranscript {
        AssemblyAiTranscript {
            id: "tx_1".to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_blank_key_is_missing_credential() {
        let err = AssemblyAiConfig::new("").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ASSEMBLYAI_API_KEY_VAR)));
    }

    #[test]
    fn test_request_enables_diarization_for_mono() {
        let config = TranscriptionConfig::default();
        let request = TranscriptRequest::new("https://cdn/a.wav", &config);
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["speaker_labels"], true);
        assert_eq!(json["speakers_expected"], 2);
        assert_eq!(json["language_code"], "es");
        assert_eq!(json["dual_channel"], false);
    }

    #[test]
    fn test_request_dual_channel_skips_diarization() {
        let config = TranscriptionConfig {
            dual_channel: true,
            ..Default::default()
        };
        let request = TranscriptRequest::new("https://cdn/a.wav", &config);
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["speaker_labels"], false);
        assert!(json.get("speakers_expected").is_none());
    }

    #[test]
    fn test_pending_job_is_not_finished() {
        assert!(finished(job("queued")).unwrap().is_none());
        assert!(finished(job("processing")).unwrap().is_none());
    }

    #[test]
    fn test_completed_without_utterances_is_no_speech() {
        let err = finished(job("completed")).unwrap_err();
        assert!(matches!(err, TranscriptionError::NoSpeech));
    }

    #[test]
    fn test_job_error_classification() {
        let mut failed = job("error");
        failed.error = Some("File does not appear to contain audio".to_string());
        assert!(matches!(
            finished(failed).unwrap_err(),
            TranscriptionError::UnsupportedFormat(_)
        ));

        let mut failed = job("error");
        failed.error = Some("internal server error".to_string());
        assert!(matches!(finished(failed).unwrap_err(), TranscriptionError::Failed(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            upload_error(StatusCode::UNAUTHORIZED, String::new()),
            TranscriptionError::Unauthorized
        ));
        assert!(matches!(
            upload_error(StatusCode::PAYLOAD_TOO_LARGE, "too big".into()),
            TranscriptionError::UploadRejected(_)
        ));
        assert!(matches!(
            request_error(StatusCode::BAD_REQUEST, "bad".into()),
            TranscriptionError::Failed(_)
        ));
    }
}
