//! Error taxonomy for the conversation pipeline

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for callers that drive the whole pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Raw input could not be reduced to a non-empty segment sequence
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no valid segments found")]
    NoSegments,

    #[error("invalid structured input: {0}")]
    InvalidStructured(String),

    #[error("could not read conversation input: {0}")]
    Read(#[from] std::io::Error),

    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),
}

/// Failure of a single classification call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("classifier call timed out after {0:?}")]
    Timeout(Duration),

    #[error("classifier rate limit hit")]
    RateLimited { retry_after: Option<Duration> },

    #[error("classifier server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("classifier unreachable: {0}")]
    Unreachable(String),

    #[error("classifier rejected credentials: {0}")]
    Unauthorized(String),

    #[error("classifier rejected request: {0}")]
    Rejected(String),

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl ClassificationError {
    /// Timeouts, rate limits, 5xx and network failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Server { .. } | Self::Unreachable(_)
        )
    }

    /// Whether the failure says the service itself was not usable, as opposed
    /// to the service answering with something we could not interpret
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }

    /// The configuration problem behind a rejected credential, if that is what this is
    pub fn credential_error(&self, var: &'static str) -> Option<ConfigError> {
        match self {
            Self::Unauthorized(reason) => Some(ConfigError::InvalidCredential {
                var,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    /// Minimum delay the server asked for before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Whole-conversation analysis failure
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(
        "sentiment service unavailable for all {segments} segments (last error: {last_error}); retry later"
    )]
    Unavailable { segments: usize, last_error: String },

    #[error("sentiment service rejected the credentials ({0}); check the API key")]
    Credentials(String),
}

/// Missing or invalid configuration for a collaborator
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set the {0} environment variable")]
    MissingCredential(&'static str),

    #[error("credential in {var} was rejected: {reason}")]
    InvalidCredential { var: &'static str, reason: String },

    #[error("invalid prompt template: {0}")]
    InvalidTemplate(String),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reported by the transcription provider
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("audio upload rejected: {0}")]
    UploadRejected(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no speech detected in audio")]
    NoSpeech,

    #[error("transcription provider rejected credentials")]
    Unauthorized,

    #[error("transcription did not complete after {polls} status checks")]
    TimedOut { polls: u32 },

    #[error("transcription failed: {0}")]
    Failed(String),

    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert!(ClassificationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ClassificationError::RateLimited { retry_after: None }.is_transient());
        assert!(
            ClassificationError::Server {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(ClassificationError::Unreachable("dns".into()).is_transient());
        assert!(!ClassificationError::Malformed("??".into()).is_transient());
        assert!(!ClassificationError::Unauthorized("401".into()).is_transient());
    }

    #[test]
    fn test_malformed_is_not_service_failure() {
        assert!(!ClassificationError::Malformed("??".into()).is_service_failure());
        assert!(ClassificationError::Rejected("400".into()).is_service_failure());
    }

    #[test]
    fn test_transcription_error_maps_to_parse_error() {
        let err: ParseError = TranscriptionError::NoSpeech.into();
        assert!(matches!(err, ParseError::Transcription(_)));
        assert_eq!(err.to_string(), "transcription failed: no speech detected in audio");
    }

    #[test]
    fn test_unauthorized_maps_to_invalid_credential() {
        let err = ClassificationError::Unauthorized("401 - invalid api token".into());
        let config = err.credential_error("COHERE_API_KEY").unwrap();
        assert_eq!(
            config.to_string(),
            "credential in COHERE_API_KEY was rejected: 401 - invalid api token"
        );
        assert!(
            ClassificationError::Unreachable("dns".into())
                .credential_error("COHERE_API_KEY")
                .is_none()
        );
    }

    #[test]
    fn test_no_segments_message() {
        assert_eq!(ParseError::NoSegments.to_string(), "no valid segments found");
    }
}
