//! OpenAI-compatible chat completion clients: OpenAI, Azure OpenAI and Ollama.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{endpoint, read_completion, ChatClient};
use crate::config::EnvVars;
use crate::error::Result;
use crate::models::ChatMessage;

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

pub struct OpenAIChatClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAIChatClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            env.get_or("OPENAI_API_BASE", OPENAI_DEFAULT_BASE),
            env.require("OPENAI_API_KEY")?,
        ))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(&self.base_url, &["chat", "completions"])?;
        let request = CompletionRequest {
            model: Some(model),
            messages,
        };
        let sent = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await;
        let response: CompletionResponse = read_completion(self.provider_name(), sent).await?;
        Ok(response.into_text())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Azure routes by deployment name, which is the configured model name here.
pub struct AzureChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl AzureChatClient {
    pub fn new(endpoint: String, api_key: String, api_version: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            api_version,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            env.require("OPENAI_API_BASE")?,
            env.require("OPENAI_API_KEY")?,
            env.require("OPENAI_API_VERSION")?,
        ))
    }
}

#[async_trait]
impl ChatClient for AzureChatClient {
    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(
            &self.endpoint,
            &["openai", "deployments", model, "chat", "completions"],
        )?;
        let request = CompletionRequest {
            model: None,
            messages,
        };
        let sent = self
            .client
            .post(url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await;
        let response: CompletionResponse = read_completion(self.provider_name(), sent).await?;
        Ok(response.into_text())
    }

    fn provider_name(&self) -> &'static str {
        "azure"
    }
}

/// Talks to Ollama through its OpenAI-compatible `/v1` surface.
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
}

impl OllamaChatClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(env.get_or("OLLAMA_BASE_URL", OLLAMA_DEFAULT_BASE)))
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(&self.base_url, &["v1", "chat", "completions"])?;
        let request = CompletionRequest {
            model: Some(model),
            messages,
        };
        let sent = self.client.post(url).json(&request).send().await;
        let response: CompletionResponse = read_completion(self.provider_name(), sent).await?;
        Ok(response.into_text())
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::serve;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value as JsonValue};
    use std::collections::HashMap;

    fn completion(content: &str) -> JsonValue {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_openai_sends_bearer_and_model() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let reply = format!(
                    "{}|{}|{}",
                    auth,
                    body["model"].as_str().unwrap_or_default(),
                    body["messages"][1]["content"].as_str().unwrap_or_default()
                );
                Json(completion(&reply))
            }),
        );
        let base = serve(app).await;
        let client = OpenAIChatClient::new(format!("{}/v1", base), "sk-test".to_string());

        let text = client
            .chat_completion(
                "gpt-4o",
                &[ChatMessage::system("rules"), ChatMessage::user("hello")],
            )
            .await
            .unwrap();
        assert_eq!(text, "Bearer sk-test|gpt-4o|hello");
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(app).await;
        let client = OpenAIChatClient::new(format!("{}/v1", base), "k".to_string());

        let err = client
            .chat_completion("m", &[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = serve(app).await;
        let client = OllamaChatClient::new(base);

        let err = client
            .chat_completion("llama3", &[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let client = OllamaChatClient::new("http://127.0.0.1:1".to_string());
        let err = client
            .chat_completion("llama3", &[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_null_content_is_empty_string() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(json!({"choices": [{"message": {"role": "assistant", "content": null}}]}))
            }),
        );
        let base = serve(app).await;
        let client = OllamaChatClient::new(base);
        let text = client
            .chat_completion("m", &[ChatMessage::user("q")])
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_azure_routes_by_deployment() {
        let app = Router::new().route(
            "/openai/deployments/:deployment/chat/completions",
            post(
                |axum::extract::Path(deployment): axum::extract::Path<String>,
                 Query(query): Query<HashMap<String, String>>,
                 headers: HeaderMap| async move {
                    let key = headers
                        .get("api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let version = query.get("api-version").cloned().unwrap_or_default();
                    Json(completion(&format!("{}|{}|{}", deployment, version, key)))
                },
            ),
        );
        let base = serve(app).await;
        let client = AzureChatClient::new(base, "az-key".to_string(), "2024-02-01".to_string());

        let text = client
            .chat_completion("gpt-35", &[ChatMessage::user("q")])
            .await
            .unwrap();
        assert_eq!(text, "gpt-35|2024-02-01|az-key");
    }

    #[test]
    fn test_from_env_requirements() {
        let env = EnvVars::from_pairs([("OPENAI_API_BASE", "https://x.openai.azure.com")]);
        assert!(matches!(
            AzureChatClient::from_env(&env),
            Err(Error::Configuration(_))
        ));
        assert!(OpenAIChatClient::from_env(&env).is_err());
        assert!(OllamaChatClient::from_env(&EnvVars::default()).is_ok());
    }
}
