//! Minimal OpenAI-compatible chat-completions client.

use brokerchain_providers::http;
use brokerchain_providers::{ProviderError, RetryPolicy, retry_with_backoff};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// API root including the version segment, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, retry: RetryPolicy) -> Self {
        Self {
            client: http::client(),
            config,
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Run one chat completion and return the first choice's text.
    ///
    /// With `json_output` the model is asked for a JSON object.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        json_output: bool,
    ) -> Result<String, ProviderError> {
        let Some(key) = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        else {
            return Err(ProviderError::configuration("OPENAI_API_KEY missing"));
        };
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            max_completion_tokens: max_tokens,
            response_format: json_output.then_some(ResponseFormat { kind: "json_object" }),
        };

        let resp: ChatResponse = retry_with_backoff(&self.retry, "openai.chat", || {
            let request = self.client.post(&url).bearer_auth(key).json(&body);
            http::send_json::<ChatResponse>("openai", request)
        })
        .await?;

        let content = resp
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::permanent("completion had no content"))?;
        debug!(model = %self.config.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerchain_providers::FailureClass;
    use brokerchain_providers::http::test_server;
    use std::time::Duration;

    fn client(base: &str) -> OpenAiClient {
        OpenAiClient::new(
            OpenAiConfig {
                api_key: Some("sk-test".into()),
                base_url: format!("{base}/v1"),
                ..Default::default()
            },
            RetryPolicy::new(3, Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn completion_text_is_returned() {
        let (base, server) = test_server::serve(vec![(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"Crew can be on site by noon."}}]}"#,
        )])
        .await;
        let text = client(&base)
            .chat(&[ChatMessage::user("status?")], 50, true)
            .await
            .unwrap();
        assert_eq!(text, "Crew can be on site by noon.");

        let requests = server.await.unwrap();
        let request = &requests[0];
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""model":"gpt-4o-mini""#));
        assert!(request.contains(r#""type":"json_object""#));
    }

    #[tokio::test]
    async fn unavailable_model_is_retried() {
        let (base, server) = test_server::serve(vec![
            (503, r#"{"error":{"message":"overloaded"}}"#),
            (200, r#"{"choices":[{"message":{"content":"ok"}}]}"#),
        ])
        .await;
        let text = client(&base)
            .chat(&[ChatMessage::user("hi")], 10, false)
            .await
            .unwrap();
        assert_eq!(text, "ok");
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_completion_is_permanent() {
        let (base, server) = test_server::serve(vec![(
            200,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
        )])
        .await;
        let err = client(&base)
            .chat(&[ChatMessage::user("hi")], 10, false)
            .await
            .unwrap_err();
        assert_eq!(err.class, FailureClass::Permanent);
        assert_eq!(err.message, "completion had no content");
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let client = OpenAiClient::new(OpenAiConfig::default(), RetryPolicy::default());
        let err = client
            .chat(&[ChatMessage::user("hi")], 10, false)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.message, "OPENAI_API_KEY missing");
    }

    #[test]
    fn request_shape() {
        let messages = [ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_completion_tokens: 200,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["response_format"]["type"], "json_object");
        assert_eq!(v["max_completion_tokens"], 200);
    }
}
