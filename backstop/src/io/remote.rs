//! Chat-completion client for the remote model.
//!
//! The [`Completion`] trait decouples the orchestrator from the HTTP backend.
//! Tests use scripted completions that return predetermined replies.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::RemoteConfig;
use crate::io::credentials::Credential;

/// A fallible `prompt -> text` call to the remote model.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, credential: &Credential, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body: `{ model, messages: [{ role: "user", content }] }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn user(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a response body.
///
/// Exactly one choice with string content is accepted.
pub fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("parse chat completion response")?;
    let choice = match response.choices.as_slice() {
        [only] => only,
        [] => bail!("chat completion response has no choices"),
        many => bail!("chat completion response has {} choices, expected 1", many.len()),
    };
    choice
        .message
        .content
        .clone()
        .ok_or_else(|| anyhow!("chat completion choice has no message content"))
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: Client,
    endpoint: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_request(&self, credential: &Credential, prompt: &str) -> reqwest::RequestBuilder {
        self.http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .json(&ChatRequest::user(&self.model, prompt))
    }
}

#[async_trait]
impl Completion for ChatCompletionClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    async fn complete(&self, credential: &Credential, prompt: &str) -> Result<String> {
        debug!(endpoint = %self.endpoint, "sending chat completion request");
        let response = self
            .build_request(credential, prompt)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = response.status();
        let body = response.text().await.context("read chat completion body")?;
        if !status.is_success() {
            warn!(status = %status, "chat completion request failed");
            return Err(anyhow!(
                "chat completion failed with status {status}: {}",
                body.trim()
            ));
        }
        let content = parse_completion(&body)?;
        debug!(content_bytes = content.len(), "chat completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_choice_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"rename foo"}}]}"#;
        assert_eq!(parse_completion(body).expect("parse"), "rename foo");
    }

    #[test]
    fn rejects_empty_choices() {
        let err = parse_completion(r#"{"choices":[]}"#).expect_err("no choices");
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn rejects_multiple_choices() {
        let body = r#"{"choices":[{"message":{"content":"a"}},{"message":{"content":"b"}}]}"#;
        let err = parse_completion(body).expect_err("two choices");
        assert!(err.to_string().contains("2 choices"));
    }

    #[test]
    fn rejects_missing_or_null_content() {
        assert!(parse_completion(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).is_err());
        assert!(parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    }

    #[test]
    fn rejects_non_json_body() {
        let err = parse_completion("<html>bad gateway</html>").expect_err("not json");
        assert!(err.to_string().contains("parse chat completion response"));
    }

    #[test]
    fn request_body_has_model_and_single_user_message() {
        let value = serde_json::to_value(ChatRequest::user("mistral-large-latest", "do X"))
            .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "model": "mistral-large-latest",
                "messages": [{ "role": "user", "content": "do X" }],
            })
        );
    }

    #[test]
    fn http_request_targets_endpoint_with_bearer_auth() {
        let config = RemoteConfig {
            endpoint: "https://example.invalid/v1/chat/completions".to_string(),
            ..RemoteConfig::default()
        };
        let client = ChatCompletionClient::new(&config).expect("client");

        let request = client
            .build_request(&Credential::new("sk-1"), "hello")
            .build()
            .expect("request");

        assert_eq!(request.method(), "POST");
        assert_eq!(
            request.url().as_str(),
            "https://example.invalid/v1/chat/completions"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer sk-1");
        assert_eq!(request.headers()[ACCEPT], "application/json");
        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .expect("buffered body");
        let sent: ChatRequest = serde_json::from_slice(body).expect("json body");
        assert_eq!(sent, ChatRequest::user(client.model(), "hello"));
    }
}
