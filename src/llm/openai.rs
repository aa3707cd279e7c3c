//! OpenAI-compatible chat completions client.

use crate::conversation::{ChatMessage, Role};
use crate::error::{LlmError, Result};
use crate::llm::{CompletionRequest, CompletionResponse, CompletionService, Usage};

use anyhow::Context as _;
use std::time::Duration;

/// Calls `POST {base_url}/chat/completions` with a bearer token.
pub struct OpenAiClient {
    base_url: String,
    api_token: String,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// `timeout` bounds connecting, the whole request, and each read.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build completion HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            http_client,
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
        });

        let response = self
            .http_client
            .post(self.chat_completions_url())
            .header("authorization", format!("Bearer {}", self.api_token))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::ProviderRequest(error.to_string()))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|error| {
            LlmError::ProviderRequest(format!("failed to read response body: {error}"))
        })?;

        let response_body: serde_json::Value = serde_json::from_str(&response_text).map_err(|error| {
            LlmError::MalformedResponse(format!(
                "response ({status}) is not valid JSON: {error}\nBody: {}",
                truncate_body(&response_text)
            ))
        })?;

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(LlmError::ProviderStatus {
                status: status.as_u16(),
                message: message.to_string(),
            }
            .into());
        }

        parse_openai_response(response_body)
    }
}

fn truncate_body(body: &str) -> &str {
    let limit = 500;
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn parse_role(value: &serde_json::Value) -> Role {
    match value.as_str() {
        Some("system") => Role::System,
        Some("user") => Role::User,
        _ => Role::Assistant,
    }
}

fn parse_openai_response(body: serde_json::Value) -> Result<CompletionResponse> {
    let choices = body["choices"]
        .as_array()
        .ok_or_else(|| LlmError::MalformedResponse("missing choices array".into()))?;

    let choices: Vec<ChatMessage> = choices
        .iter()
        .map(|choice| {
            let message = &choice["message"];
            let mut content = message["content"].as_str().unwrap_or("").to_string();

            // Some reasoning models put the answer in a separate field.
            if content.is_empty()
                && let Some(reasoning) = message["reasoning_content"].as_str()
            {
                content = reasoning.to_string();
            }

            ChatMessage::new(parse_role(&message["role"]), content)
        })
        .collect();

    if choices.is_empty() {
        return Err(LlmError::EmptyResponse.into());
    }

    let usage = body.get("usage").filter(|u| u.is_object()).map(|usage| {
        let prompt_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = usage["completion_tokens"].as_u64().unwrap_or(0);
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: usage["total_tokens"]
                .as_u64()
                .unwrap_or(prompt_tokens + completion_tokens),
        }
    });

    Ok(CompletionResponse { choices, usage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".into(),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        }
    }

    #[tokio::test]
    async fn posts_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}],
                "usage": {"prompt_tokens": 4, "completion_tokens": 1, "total_tokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(format!("{}/v1", server.uri()), "sk-test", Duration::from_secs(2))
            .expect("client should build");
        let response = client.complete(request()).await.expect("completion succeeds");

        assert_eq!(response.first_choice(), Some(&ChatMessage::assistant("hello")));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(5));
    }

    #[tokio::test]
    async fn error_status_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(server.uri(), "sk-bad", Duration::from_secs(2))
            .expect("client should build");
        let error = client.complete(request()).await.expect_err("401 must fail");

        assert!(matches!(
            error,
            crate::Error::Llm(LlmError::ProviderStatus { status: 401, ref message })
                if message == "Incorrect API key provided"
        ));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new(server.uri(), "sk-test", Duration::from_millis(100))
            .expect("client should build");
        let error = client.complete(request()).await.expect_err("request must time out");

        assert!(matches!(error, crate::Error::Llm(LlmError::ProviderRequest(_))));
    }

    #[test]
    fn parses_first_choice_and_usage() {
        let response = parse_openai_response(serde_json::json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hello!"}},
                {"index": 1, "message": {"role": "assistant", "content": "Hi!"}}
            ],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }))
        .expect("valid response");

        assert_eq!(response.first_choice(), Some(&ChatMessage::assistant("Hello!")));
        assert_eq!(response.choices.len(), 2);
        assert_eq!(
            response.usage,
            Some(Usage {
                prompt_tokens: 9,
                completion_tokens: 3,
                total_tokens: 12
            })
        );
    }

    #[test]
    fn null_content_becomes_empty() {
        let response = parse_openai_response(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .expect("valid response");

        assert_eq!(response.first_choice(), Some(&ChatMessage::assistant("")));
        assert_eq!(response.usage, None);
    }

    #[test]
    fn falls_back_to_reasoning_content() {
        let response = parse_openai_response(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "", "reasoning_content": "42"}}]
        }))
        .expect("valid response");

        assert_eq!(response.first_choice(), Some(&ChatMessage::assistant("42")));
    }

    #[test]
    fn empty_choices_is_an_error() {
        let error = parse_openai_response(serde_json::json!({"choices": []}))
            .expect_err("no choices");
        assert!(matches!(error, crate::Error::Llm(LlmError::EmptyResponse)));
    }

    #[test]
    fn missing_choices_is_malformed() {
        let error = parse_openai_response(serde_json::json!({"object": "error"}))
            .expect_err("no choices array");
        assert!(matches!(error, crate::Error::Llm(LlmError::MalformedResponse(_))));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = OpenAiClient::new("https://api.example/v1/", "sk", Duration::from_secs(1))
            .expect("client should build");
        assert_eq!(client.chat_completions_url(), "https://api.example/v1/chat/completions");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.len() <= 500);
        assert!(body.starts_with(truncated));
    }
}
