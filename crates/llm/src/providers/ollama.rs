//! Ollama chat provider (`POST /api/chat`, non-streaming).

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::providers::send_json;
use docent_core::AppResult;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    options: SamplingOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize, Default)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    message: ReplyMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Client for a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn chat_body<'a>(request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            options: SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatResponse {
    fn into_response(self) -> LlmResponse {
        LlmResponse {
            usage: LlmUsage::new(self.prompt_eval_count, self.eval_count),
            content: self.message.content,
            model: self.model,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            model = %request.model,
            prompt_chars = request.prompt_chars(),
            "Ollama chat request"
        );

        let builder = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&Self::chat_body(request));
        let reply: ChatResponse = send_json("ollama", builder, request.timeout).await?;

        tracing::debug!(completion_tokens = reply.eval_count, "Ollama chat reply");
        Ok(reply.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        assert_eq!(OllamaClient::new().base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(
            OllamaClient::with_base_url("http://gpu-box:11434/").base_url,
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn test_chat_body_puts_system_first() {
        let request = LlmRequest::new("Which cable section?", "llama3.2")
            .with_system("Answer only from context")
            .with_temperature(0.1)
            .with_max_tokens(256);

        let body = serde_json::to_value(OllamaClient::chat_body(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Which cable section?");
        assert_eq!(body["options"]["num_predict"], 256);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_chat_body_without_system_has_one_message() {
        let request = LlmRequest::new("q", "llama3.2");
        let body = serde_json::to_value(OllamaClient::chat_body(&request)).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body["options"].get("temperature").is_none());
    }

    #[test]
    fn test_reply_conversion() {
        let reply: ChatResponse = serde_json::from_str(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":"16 mm2"},"done":true,"prompt_eval_count":40,"eval_count":4}"#,
        )
        .unwrap();

        let response = reply.into_response();
        assert_eq!(response.content, "16 mm2");
        assert_eq!(response.usage.total_tokens, 44);
    }
}
