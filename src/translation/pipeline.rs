//! ULCA-style inference pipelines used by Bhashini and Dhruva.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{read_translation, Translator};
use crate::config::EnvVars;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineRequest<'a> {
    pipeline_tasks: Vec<PipelineTask<'a>>,
    input_data: InputData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineTask<'a> {
    task_type: &'static str,
    config: TaskConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskConfig<'a> {
    language: LanguagePair<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LanguagePair<'a> {
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Serialize)]
struct InputData<'a> {
    input: Vec<SourceText<'a>>,
}

#[derive(Debug, Serialize)]
struct SourceText<'a> {
    source: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineResponse {
    pipeline_response: Vec<TaskOutput>,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    output: Vec<TargetText>,
}

#[derive(Debug, Deserialize)]
struct TargetText {
    target: String,
}

/// Shared transport for both pipeline providers.
struct PipelineEndpoint {
    client: Client,
    url: String,
    api_key: String,
    service_id: Option<String>,
}

impl PipelineEndpoint {
    async fn translate(
        &self,
        provider: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        if source_lang == target_lang {
            return Ok(text.to_string());
        }

        let request = PipelineRequest {
            pipeline_tasks: vec![PipelineTask {
                task_type: "translation",
                config: TaskConfig {
                    language: LanguagePair {
                        source_language: source_lang,
                        target_language: target_lang,
                    },
                    service_id: self.service_id.as_deref(),
                },
            }],
            input_data: InputData {
                input: vec![SourceText { source: text }],
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let parsed: PipelineResponse = read_translation(provider, response).await?;

        parsed
            .pipeline_response
            .into_iter()
            .next()
            .and_then(|task| task.output.into_iter().next())
            .map(|out| out.target)
            .ok_or_else(|| Error::Translation(format!("{} returned no translation", provider)))
    }
}

pub struct BhashiniTranslationClient {
    endpoint: PipelineEndpoint,
}

impl BhashiniTranslationClient {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            endpoint: PipelineEndpoint {
                client: Client::new(),
                url,
                api_key,
                service_id: None,
            },
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            env.require("BHASHINI_ENDPOINT_URL")?,
            env.require("BHASHINI_API_KEY")?,
        ))
    }
}

#[async_trait]
impl Translator for BhashiniTranslationClient {
    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self.endpoint
            .translate(self.provider_name(), text, source_lang, target_lang)
            .await
    }

    fn provider_name(&self) -> &'static str {
        "bhashini"
    }
}

pub struct DhruvaTranslationClient {
    endpoint: PipelineEndpoint,
}

impl DhruvaTranslationClient {
    pub fn new(url: String, api_key: String, service_id: Option<String>) -> Self {
        Self {
            endpoint: PipelineEndpoint {
                client: Client::new(),
                url,
                api_key,
                service_id,
            },
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            env.require("DHRUVA_ENDPOINT_URL")?,
            env.require("DHRUVA_API_KEY")?,
            env.get("DHRUVA_SERVICE_ID").map(str::to_string),
        ))
    }
}

#[async_trait]
impl Translator for DhruvaTranslationClient {
    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self.endpoint
            .translate(self.provider_name(), text, source_lang, target_lang)
            .await
    }

    fn provider_name(&self) -> &'static str {
        "dhruva"
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

    fn pipeline_app() -> Router {
        Router::new().route(
            "/compute",
            post(|headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                let task = &body["pipelineTasks"][0];
                let target = format!(
                    "{}>{}:{}:{}:{}",
                    task["config"]["language"]["sourceLanguage"].as_str().unwrap_or_default(),
                    task["config"]["language"]["targetLanguage"].as_str().unwrap_or_default(),
                    task["config"]["serviceId"].as_str().unwrap_or("-"),
                    headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default(),
                    body["inputData"]["input"][0]["source"].as_str().unwrap_or_default(),
                );
                Json(json!({
                    "pipelineResponse": [{"taskType": "translation", "output": [{"source": "", "target": target}]}]
                }))
            }),
        )
    }

    #[tokio::test]
    async fn test_bhashini_request_shape() {
        let base = serve(pipeline_app()).await;
        let client = BhashiniTranslationClient::new(format!("{}/compute", base), "key-1".to_string());
        let out = client.translate_text("hello", "en", "hi").await.unwrap();
        assert_eq!(out, "en>hi:-:key-1:hello");
    }

    #[tokio::test]
    async fn test_dhruva_passes_service_id() {
        let base = serve(pipeline_app()).await;
        let client = DhruvaTranslationClient::new(
            format!("{}/compute", base),
            "key-2".to_string(),
            Some("ai4bharat/indictrans".to_string()),
        );
        let out = client.translate_text("hello", "en", "ta").await.unwrap();
        assert_eq!(out, "en>ta:ai4bharat/indictrans:key-2:hello");
    }

    #[tokio::test]
    async fn test_same_language_skips_network() {
        let client = BhashiniTranslationClient::new("http://127.0.0.1:1/compute".to_string(), "k".to_string());
        assert_eq!(client.translate_text("as is", "en", "en").await.unwrap(), "as is");
    }

    #[tokio::test]
    async fn test_upstream_error_is_translation_error() {
        let app = Router::new().route("/compute", post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }));
        let base = serve(app).await;
        let client = BhashiniTranslationClient::new(format!("{}/compute", base), "k".to_string());
        let err = client.translate_text("x", "en", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }
}
