//! Mentor collaborator: turns a failed submission into mentoring text.
//!
//! The mentor is a black-box text generator; the only contract is that
//! it returns text. The shipped implementation calls an OpenAI-compatible
//! chat endpoint. Failures are the same recoverable class as agent call
//! failures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AgentError;
use crate::executor::TestResult;

/// Prompt for generating mentoring feedback on a scored submission.
const MENTOR_PROMPT: &str = r#"
You are a programming mentor reviewing a student's submission.

Algorithm:
{statement}

Student submission:
{code}

Test results:
{results}

Reference implementation (do not reveal it verbatim):
{reference}

Explain what the submission gets wrong and how to think about fixing it.
Be specific about the failing cases, encouraging in tone, and do not
write the corrected code for the student.
"#;

/// Trait for the mentoring-text generator, mockable in tests.
#[async_trait]
pub trait Mentor: Send + Sync {
    /// Produces free-text mentoring content for a scored submission.
    async fn mentor(
        &self,
        statement: &str,
        code: &str,
        results: &[TestResult],
        reference: &str,
    ) -> Result<String, AgentError>;
}

/// Mentor backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatMentor {
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl ChatMentor {
    /// Creates a new mentor client.
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: None,
            model: model.into(),
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
}

/// Renders test results into the prompt's plain-text block.
fn render_results(results: &[TestResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "- input: {} | expected: {} | actual: {} | {}",
                r.input,
                r.expected,
                r.actual,
                if r.passed { "passed" } else { "FAILED" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[async_trait]
impl Mentor for ChatMentor {
    async fn mentor(
        &self,
        statement: &str,
        code: &str,
        results: &[TestResult],
        reference: &str,
    ) -> Result<String, AgentError> {
        let prompt = MENTOR_PROMPT
            .replace("{statement}", statement)
            .replace("{code}", code)
            .replace("{results}", &render_results(results))
            .replace("{reference}", reference);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = http_request.json(&request).send().await.map_err(|e| {
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

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AgentError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_results_marks_failures() {
        let results = vec![
            TestResult {
                passed: true,
                input: "1".to_string(),
                expected: "2".to_string(),
                actual: "2".to_string(),
            },
            TestResult {
                passed: false,
                input: "3".to_string(),
                expected: "6".to_string(),
                actual: "5".to_string(),
            },
        ];

        let rendered = render_results(&results);

        assert!(rendered.contains("input: 1"));
        assert!(rendered.contains("passed"));
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("actual: 5"));
    }

    #[test]
    fn test_chat_response_parsing() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "try again"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "try again");
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_recoverable_error() {
        // Port unlikely to have a listener.
        let mentor = ChatMentor::new("http://localhost:65535/v1", "m", Duration::from_secs(2));

        let result = mentor.mentor("statement", "code", &[], "reference").await;

        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            AgentError::RequestFailed(_) | AgentError::Timeout { .. }
        ));
    }

    #[test]
    fn test_mentor_prompt_substitution() {
        let prompt = MENTOR_PROMPT
            .replace("{statement}", "sum a list")
            .replace("{code}", "def f(): pass")
            .replace("{results}", "- none")
            .replace("{reference}", "def f(): return 0");

        assert!(prompt.contains("sum a list"));
        assert!(!prompt.contains("{statement}"));
        assert!(!prompt.contains("{code}"));
    }
}
