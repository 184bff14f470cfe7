//! Configuration sources.
//!
//! Two layers feed the service. [`Settings`] holds the sectioned application
//! configuration (`llm.*`, `database.*`, `data_embedding.*`) merged from an
//! optional `config.toml` and `APP__SECTION__KEY` environment overrides.
//! [`EnvVars`] is a snapshot of plain environment variables used for provider
//! selection and provider credentials.

use std::collections::HashMap;
use std::str::FromStr;

use config::{Config, Environment, File, FileFormat};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config";
const DEFAULT_QDRANT_HOST: &str = "0.0.0.0";
const DEFAULT_QDRANT_PORT: &str = "6334";

#[derive(Debug, Clone)]
pub struct Settings {
    inner: Config,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Settings {
    /// Load `config.toml` (or the file named by `RAG_CONFIG`) plus `APP__` overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("RAG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let inner = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(env_overrides())
            .build()?;
        Ok(Self { inner })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let inner = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;
        Ok(Self { inner })
    }

    /// Raw string lookup. Keys are tried verbatim and lowercased since
    /// environment overrides always arrive lowercased.
    pub fn value(&self, section: &str, key: &str) -> Option<String> {
        let path = format!("{}.{}", section, key);
        self.inner
            .get_string(&path)
            .or_else(|_| self.inner.get_string(&path.to_lowercase()))
            .ok()
    }

    fn non_blank(&self, section: &str, key: &str) -> Option<String> {
        self.value(section, key).filter(|v| !v.trim().is_empty())
    }

    pub fn gpt_model(&self) -> Option<String> {
        self.non_blank("llm", "gpt_model")
    }

    pub fn bot_intent_enabled(&self) -> bool {
        self.value("llm", "enable_bot_intent")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn intent_prompt(&self) -> Option<String> {
        self.non_blank("llm", "intent_prompt")
    }

    pub fn bot_prompts(&self) -> Result<HashMap<String, String>> {
        self.prompt_mapping("llm", "bot_prompt")
    }

    pub fn activity_prompts(&self) -> Result<HashMap<String, String>> {
        self.prompt_mapping("llm", "activity_prompt")
    }

    /// Bot prompt for `audience_type`, matched case-insensitively.
    pub fn bot_prompt(&self, audience_type: &str) -> Result<Option<String>> {
        Ok(self.bot_prompts()?.remove(&audience_type.to_lowercase()))
    }

    /// Activity prompt for `audience_type`, matched case-insensitively.
    pub fn activity_prompt(&self, audience_type: &str) -> Result<Option<String>> {
        Ok(self.activity_prompts()?.remove(&audience_type.to_lowercase()))
    }

    /// Audience-keyed prompt tables are accepted either as a config table or as
    /// a string holding a JSON object. An unset key yields an empty mapping.
    /// Audience keys are lowercased in both forms since the config crate
    /// lowercases table keys.
    fn prompt_mapping(&self, section: &str, key: &str) -> Result<HashMap<String, String>> {
        let path = format!("{}.{}", section, key);
        let mut mapping = None;
        for candidate in [path.clone(), path.to_lowercase()] {
            if let Ok(table) = self.inner.get::<HashMap<String, String>>(&candidate) {
                mapping = Some(table);
                break;
            }
        }
        let mapping = match mapping {
            Some(table) => table,
            None => match self.non_blank(section, key) {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                    Error::config(format!("{} is not a valid audience mapping: {}", path, e))
                })?,
                None => HashMap::new(),
            },
        };
        Ok(mapping
            .into_iter()
            .map(|(audience, prompt)| (audience.to_lowercase(), prompt))
            .collect())
    }

    pub fn top_docs_to_fetch(&self) -> Result<usize> {
        self.parsed("database", "top_docs_to_fetch")
    }

    pub fn docs_min_score(&self) -> Result<f64> {
        self.parsed("database", "docs_min_score")
    }

    fn parsed<T>(&self, section: &str, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self
            .non_blank(section, key)
            .ok_or_else(|| Error::config(format!("{}.{} is not configured", section, key)))?;
        raw.trim().parse::<T>().map_err(|e| {
            Error::config(format!("{}.{} has invalid value '{}': {}", section, key, raw, e))
        })
    }

    /// gRPC endpoint of the Qdrant server. A bare host is combined with
    /// `QDRANT_PORT`; a value that already carries a scheme is used as is.
    pub fn qdrant_url(&self) -> String {
        let host = self
            .non_blank("database", "QDRANT_URL")
            .unwrap_or_else(|| DEFAULT_QDRANT_HOST.to_string());
        if host.starts_with("http://") || host.starts_with("https://") {
            return host;
        }
        let port = self
            .non_blank("database", "QDRANT_PORT")
            .unwrap_or_else(|| DEFAULT_QDRANT_PORT.to_string());
        format!("http://{}:{}", host, port)
    }

    pub fn embedding(&self) -> Result<EmbeddingSettings> {
        let url = self
            .non_blank("data_embedding", "EMBED_URL")
            .ok_or_else(|| Error::config("data_embedding.EMBED_URL is not configured"))?;
        let model = self
            .non_blank("data_embedding", "EMBED_MODEL")
            .ok_or_else(|| Error::config("data_embedding.EMBED_MODEL is not configured"))?;
        Ok(EmbeddingSettings {
            url,
            model,
            api_key: self.non_blank("data_embedding", "EMBED_API_KEY"),
        })
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("__")
        .separator("__")
}

/// Snapshot of environment variables. Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| Error::missing_env(key))
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse::<T>().map_err(|e| {
                Error::config(format!("Environment variable {} is invalid: {}", key, e))
            }),
            None => Ok(default),
        }
    }
}
