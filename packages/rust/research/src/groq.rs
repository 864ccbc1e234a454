//! Groq chat completion client (OpenAI-compatible API).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tradescout_shared::{ChatRole, GroqConfig, Result, TradeScoutError};

use crate::{RetryPolicy, build_client, check_status};

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmMessage {
    pub role: ChatRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GroqClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            retry,
        })
    }

    pub fn from_config(config: &GroqConfig, api_key: String, retry: RetryPolicy) -> Result<Self> {
        Self::new(&config.base_url, api_key, config.model.clone(), retry)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a completion and return the first choice's text, trimmed.
    #[instrument(skip_all, fields(service = "groq", model = %self.model, messages = messages.len()))]
    pub async fn chat(
        &self,
        messages: &[LlmMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
        };

        let (url, body) = (&url, &body);
        let text = self
            .retry
            .run("groq", || async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| TradeScoutError::Network(format!("groq: {e}")))?;
                let response = check_status("groq", response).await?;
                let parsed: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| TradeScoutError::parse(format!("groq response: {e}")))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| TradeScoutError::parse("groq response has no choices"))
            })
            .await?;

        debug!(chars = text.len(), "completion received");
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> GroqClient {
        GroqClient::new(
            uri,
            "gsk-test",
            "llama-3.3-70b-versatile",
            RetryPolicy {
                max_retries: 1,
                backoff: Duration::from_millis(1),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn chat_sends_bearer_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 200
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "  hello  "}}]
            })))
            .mount(&server)
            .await;

        let text = client(&server.uri())
            .chat(&[LlmMessage::user("hi")], 0.1, 200)
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn empty_choices_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .chat(&[LlmMessage::user("hi")], 0.1, 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn server_error_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .chat(&[LlmMessage::user("hi")], 0.1, 10)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
