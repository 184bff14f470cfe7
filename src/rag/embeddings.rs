use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingSettings;
use crate::error::{Error, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-style `/embeddings` endpoint.
pub struct EmbeddingGenerator {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl EmbeddingGenerator {
    pub fn new(settings: EmbeddingSettings) -> Self {
        tracing::info!("Embedding endpoint {} with model {}", settings.url, settings.model);
        Self {
            client: Client::new(),
            url: settings.url,
            model: settings.model,
            api_key: settings.api_key,
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            input: text,
            model: &self.model,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("{} - {}", status, body)));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("Empty response from embedding endpoint".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value as JsonValue};

    fn settings(url: String, api_key: Option<&str>) -> EmbeddingSettings {
        EmbeddingSettings {
            url,
            model: "text-embedding-3-small".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_uses_first_embedding() {
        let app = Router::new().route(
            "/embeddings",
            post(|headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                let authorized = headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer secret");
                let well_formed = body["input"] == "hello" && body["model"] == "text-embedding-3-small";
                if !(authorized && well_formed) {
                    return (StatusCode::BAD_REQUEST, Json(json!({})));
                }
                (
                    StatusCode::OK,
                    Json(json!({"data": [{"embedding": [0.1, 0.2]}, {"embedding": [9.0]}]})),
                )
            }),
        );
        let base = serve(app).await;
        let embedder = EmbeddingGenerator::new(settings(format!("{}/embeddings", base), Some("secret")));
        assert_eq!(embedder.embed("hello").await.unwrap(), vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_http_failure_is_embedding_error() {
        let app = Router::new().route(
            "/embeddings",
            post(|| async { (StatusCode::UNAUTHORIZED, "no key") }),
        );
        let base = serve(app).await;
        let embedder = EmbeddingGenerator::new(settings(format!("{}/embeddings", base), None));
        assert!(matches!(embedder.embed("x").await, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_data_is_error() {
        let app = Router::new().route("/embeddings", post(|| async { Json(json!({"data": []})) }));
        let base = serve(app).await;
        let embedder = EmbeddingGenerator::new(settings(format!("{}/embeddings", base), None));
        assert!(embedder.embed("x").await.is_err());
    }
}
