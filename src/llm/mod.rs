//! Chat completion providers.
//!
//! Every provider maps upstream failures onto the same two error kinds so the
//! query pipeline can classify them without knowing which backend is active:
//! HTTP 429 becomes [`Error::RateLimited`], every other API or transport
//! failure becomes [`Error::UpstreamUnavailable`].

pub mod bedrock;
pub mod openai;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::ChatMessage;

pub use bedrock::BedrockChatClient;
pub use openai::{AzureChatClient, OllamaChatClient, OpenAIChatClient};

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the text of the first choice; an empty string when the model
    /// produced no content.
    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

/// Append path segments to a configured base URL, tolerating a trailing slash.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::config(format!("Invalid endpoint URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::config(format!("Endpoint URL '{}' cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Classify a completion API response and decode its JSON body.
pub(crate) async fn read_completion<T: DeserializeOwned>(
    provider: &str,
    sent: reqwest::Result<reqwest::Response>,
) -> Result<T> {
    let response = sent.map_err(|e| {
        Error::UpstreamUnavailable(format!("{} request failed: {}", provider, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("{} completion failed: {} - {}", provider, status, body);
        let message = format!("{} request failed: {} - {}", provider, status, body);
        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
            Error::RateLimited(message)
        } else {
            Error::UpstreamUnavailable(message)
        });
    }

    response.json::<T>().await.map_err(|e| {
        Error::UpstreamUnavailable(format!("{} returned an unreadable response: {}", provider, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let url = endpoint("https://api.openai.com/v1", &["chat", "completions"]).unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let url = endpoint("https://example.com/base/", &["model", "anthropic.claude-v2", "converse"]).unwrap();
        assert_eq!(url.path(), "/base/model/anthropic.claude-v2/converse");
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(matches!(
            endpoint("not a url", &["x"]),
            Err(Error::Configuration(_))
        ));
    }
}
