//! Google Cloud Translation (v2 REST, API key auth).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{read_translation, Translator};
use crate::config::EnvVars;
use crate::error::{Error, Result};

const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

pub struct GoogleTranslationClient {
    client: Client,
    url: String,
    api_key: String,
}

impl GoogleTranslationClient {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            GOOGLE_TRANSLATE_URL.to_string(),
            env.require("GOOGLE_TRANSLATE_API_KEY")?,
        ))
    }
}

#[async_trait]
impl Translator for GoogleTranslationClient {
    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if source_lang == target_lang {
            return Ok(text.to_string());
        }

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&TranslateRequest {
                q: text,
                source: source_lang,
                target: target_lang,
                format: "text",
            })
            .send()
            .await?;
        let parsed: TranslateResponse = read_translation(self.provider_name(), response).await?;

        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| Error::Translation("google returned no translation".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "google"
    }
}
