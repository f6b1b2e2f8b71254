use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClassificationError, ConfigError};
use crate::llm::{
    build_resolution_prompt, parse_resolution_reply, parse_sentiment_reply,
    ClassificationContext, SentimentClassifier,
};
use crate::models::Sentiment;

pub const COHERE_API_KEY_VAR: &str = "COHERE_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";

/// Configuration for the Cohere chat client
#[derive(Debug, Clone)]
pub struct CohereConfig {
    /// API key (from COHERE_API_KEY env var)
    pub api_key: String,
    /// API root, overridable for proxies and tests
    pub base_url: String,
    /// Model to use (e.g., "command-r")
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for calls made outside the analyzer (resolution check)
    pub request_timeout: Duration,
}

impl CohereConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(COHERE_API_KEY_VAR).unwrap_or_default();
        Self::new(api_key)
    }

    /// Create with default model settings; rejects a blank key
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(COHERE_API_KEY_VAR));
        }

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "command-r".to_string(),
            temperature: 0.1,
            max_tokens: 200,
            request_timeout: Duration::from_secs(30),
        })
    }
}

/// Cohere chat API client
pub struct CohereClient {
    client: Client,
    config: CohereConfig,
}

impl CohereClient {
    pub fn new(config: CohereConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &CohereConfig {
        &self.config
    }

    /// Send a single-turn chat message and return the reply text
    pub async fn send_message(&self, message: &str) -> Result<String, ClassificationError> {
        let request = ChatRequest {
            model: &self.config.model,
            message,
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, retry_after));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Malformed(format!("chat response body: {}", e)))?;

        debug!("Cohere reply: {:?}", response.text);
        Ok(response.text)
    }

    /// Send a one-word message to check the key and the endpoint
    pub async fn test_connection(&self) -> Result<(), ClassificationError> {
        tokio::time::timeout(self.config.request_timeout, self.send_message("ping"))
            .await
            .map_err(|_| ClassificationError::Timeout(self.config.request_timeout))??;
        Ok(())
    }

    /// Ask whether the customer's issue was resolved during the call
    pub async fn assess_resolution(&self, transcript: &str) -> Result<bool, ClassificationError> {
        let prompt = build_resolution_prompt(transcript);
        let reply = tokio::time::timeout(self.config.request_timeout, self.send_message(&prompt))
            .await
            .map_err(|_| ClassificationError::Timeout(self.config.request_timeout))??;
        parse_resolution_reply(&reply)
    }
}

#[async_trait]
impl SentimentClassifier for CohereClient {
    async fn classify(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> Result<Sentiment, ClassificationError> {
        let prompt = context.render(text);
        let reply = self.send_message(&prompt).await?;
        parse_sentiment_reply(&reply)
    }
}

/// Map a non-2xx status to a classification error
fn status_error(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
) -> ClassificationError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ClassificationError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ClassificationError::Unauthorized(format!("{} - {}", status, body))
        }
        StatusCode::REQUEST_TIMEOUT => ClassificationError::Server {
            status: status.as_u16(),
            body,
        },
        s if s.is_server_error() => ClassificationError::Server {
            status: s.as_u16(),
            body,
        },
        s => ClassificationError::Rejected(format!("{} - {}", s, body)),
    }
}

fn transport_error(err: reqwest::Error) -> ClassificationError {
    if err.is_timeout() {
        ClassificationError::Timeout(Duration::ZERO)
    } else {
        ClassificationError::Unreachable(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> CohereClient {
        let mut config = CohereConfig::new("stale-key").unwrap();
        config.base_url = base_url;
        config.request_timeout = Duration::from_secs(5);
        CohereClient::new(config)
    }

    #[test]
    fn test_blank_key_is_missing_credential() {
        let err = CohereConfig::new("  ").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(COHERE_API_KEY_VAR)));
    }

    #[test]
    fn test_config_defaults() {
        let config = CohereConfig::new("key").unwrap();
        assert_eq!(config.model, "command-r");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 200);
    }

    #[test]
    fn test_status_mapping() {
        let retry_after = Some(Duration::from_secs(2));
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, String::new(), retry_after);
        assert_eq!(
            err,
            ClassificationError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
        );
        assert!(err.is_transient());

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream".into(), None);
        assert!(err.is_transient());

        let err = status_error(StatusCode::UNAUTHORIZED, "bad key".into(), None);
        assert!(matches!(err, ClassificationError::Unauthorized(_)));
        assert!(!err.is_transient());

        let err = status_error(StatusCode::BAD_REQUEST, "bad".into(), None);
        assert!(matches!(err, ClassificationError::Rejected(_)));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "command-r",
            message: "hola",
            temperature: Some(0.1),
            max_tokens: 200,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "command-r");
        assert_eq!(json["message"], "hola");
        assert_eq!(json["max_tokens"], 200);
    }

    #[tokio::test]
    async fn test_connection_reports_rejected_key() {
        let base_url = serve_once(concat!(
            "HTTP/1.1 401 Unauthorized\r\n",
            "content-length: 13\r\nconnection: close\r\n\r\n",
            "invalid token",
        ))
        .await;

        let err = client_for(base_url).test_connection().await.unwrap_err();

        let ClassificationError::Unauthorized(reason) = &err else {
            panic!("expected Unauthorized, got {:?}", err);
        };
        assert!(reason.contains("invalid token"));
        assert!(matches!(
            err.credential_error(COHERE_API_KEY_VAR),
            Some(ConfigError::InvalidCredential { var: COHERE_API_KEY_VAR, .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_accepts_chat_reply() {
        let base_url = serve_once(concat!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n",
            "content-length: 15\r\nconnection: close\r\n\r\n",
            "{\"text\":\"pong\"}",
        ))
        .await;

        client_for(base_url).test_connection().await.unwrap();
    }
}
