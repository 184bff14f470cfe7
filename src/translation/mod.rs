pub mod google;
pub mod pipeline;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub use google::GoogleTranslationClient;
pub use pipeline::{BhashiniTranslationClient, DhruvaTranslationClient};

#[async_trait]
pub trait Translator: Send + Sync {
    /// Language codes are ISO-639 ("en", "hi", ...). Identical source and
    /// target languages return the text untouched.
    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

pub(crate) async fn read_translation<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Translation(format!(
            "{} request failed: {} - {}",
            provider, status, body
        )));
    }
    Ok(response.json::<T>().await?)
}
