//! Agent collaborator client.
//!
//! The agent is an external HTTP service: request `{ text, uid }`,
//! success response `{ response, references?, reasoning? }`. Everything
//! it can do wrong at runtime (timeout, non-2xx status, malformed shape)
//! is a recoverable `AgentError`; the caller converts those into a
//! failed run outcome instead of aborting the batch.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// A reply from the agent, with wall-clock latency attached.
#[derive(Debug, Clone)]
pub struct AgentReply {
    /// The agent's response text.
    pub text: String,
    /// Optional supporting references.
    pub references: Vec<String>,
    /// Optional reasoning trace.
    pub reasoning: Option<String>,
    /// Wall-clock latency of the call.
    pub latency: Duration,
}

/// Trait for the agent collaborator, mockable in tests.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Sends `text` under the correlation id `uid` and returns the reply.
    async fn ask(&self, text: &str, uid: &str) -> Result<AgentReply, AgentError>;
}

/// HTTP-backed agent client.
pub struct HttpAgent {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    http_client: Client,
}

impl HttpAgent {
    /// Creates a new agent client for the given endpoint.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout,
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Sets a bearer token for authentication.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Wire request shape.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    text: &'a str,
    uid: &'a str,
}

/// Wire response shape.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    response: String,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[async_trait]
impl Agent for HttpAgent {
    async fn ask(&self, text: &str, uid: &str) -> Result<AgentReply, AgentError> {
        let start = Instant::now();

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&ApiRequest { text, uid })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    AgentError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(AgentError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        if api_response.response.trim().is_empty() {
            return Err(AgentError::EmptyResponse);
        }

        Ok(AgentReply {
            text: api_response.response,
            references: api_response.references,
            reasoning: api_response.reasoning,
            latency: start.elapsed(),
        })
    }
}
