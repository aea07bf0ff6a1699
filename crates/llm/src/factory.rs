//! Builds an [`LlmClient`] from configured provider settings.

use crate::client::LlmClient;
use crate::providers::{gemini, ollama, GeminiClient, OllamaClient};
use docent_core::{AppError, AppResult};
use std::str::FromStr;
use std::sync::Arc;

/// Supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Ollama => ollama::DEFAULT_OLLAMA_URL,
            Self::Gemini => gemini::DEFAULT_GEMINI_URL,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(AppError::Config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

/// Create a client for `provider`.
///
/// `endpoint` overrides the provider's default base URL. Gemini needs
/// `api_key`; a missing key is `AppError::Config`.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider: LlmProvider = provider.parse()?;
    let base_url = endpoint.unwrap_or_else(|| provider.default_endpoint());
    tracing::debug!(provider = provider.as_str(), base_url, "Creating LLM client");

    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::Ollama => Arc::new(OllamaClient::with_base_url(base_url)),
        LlmProvider::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(
                    "Gemini provider requires an API key (set GOOGLE_API_KEY)".to_string(),
                )
            })?;
            Arc::new(GeminiClient::with_base_url(base_url, api_key))
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!(" google ".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
        assert!(matches!(
            "openai".parse::<LlmProvider>(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", Some("http://localhost:8080"), None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client("gemini", None, None) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires an API key")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
        let client = create_client("gemini", None, Some("secret")).unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_unknown_provider() {
        assert!(matches!(
            create_client("unknown", None, None),
            Err(AppError::Config(_))
        ));
    }
}
