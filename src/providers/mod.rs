//! Environment-driven provider selection.
//!
//! Each capability family has a selection variable naming one entry of a
//! static constructor table. Resolution happens once at startup and the
//! instances are carried in [`Providers`].

use std::fmt;
use std::sync::Arc;

use crate::config::EnvVars;
use crate::error::{Error, Result};
use crate::llm::{AzureChatClient, BedrockChatClient, ChatClient, OllamaChatClient, OpenAIChatClient};
use crate::storage::{AwsS3BucketClient, GcpBucketClient, ObjectStorage, OciBucketClient};
use crate::translation::{BhashiniTranslationClient, DhruvaTranslationClient, GoogleTranslationClient, Translator};
use crate::vectorstores::{MarqoVectorStore, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Llm,
    Translate,
    Storage,
    VectorStore,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::Llm => "llm",
            Capability::Translate => "translate",
            Capability::Storage => "storage",
            Capability::VectorStore => "vectorstore",
        }
    }

    pub fn env_key(self) -> &'static str {
        match self {
            Capability::Llm => "LLM_TYPE",
            Capability::Translate => "TRANSLATION_TYPE",
            Capability::Storage => "BUCKET_TYPE",
            Capability::VectorStore => "VECTOR_STORE_TYPE",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Constructor<T> = fn(&EnvVars) -> Result<Arc<T>>;

const LLM_PROVIDERS: &[(&str, Constructor<dyn ChatClient>)] = &[
    ("openai", |env| Ok(Arc::new(OpenAIChatClient::from_env(env)?))),
    ("azure", |env| Ok(Arc::new(AzureChatClient::from_env(env)?))),
    ("ollama", |env| Ok(Arc::new(OllamaChatClient::from_env(env)?))),
    ("bedrock", |env| Ok(Arc::new(BedrockChatClient::from_env(env)?))),
];

const TRANSLATION_PROVIDERS: &[(&str, Constructor<dyn Translator>)] = &[
    ("bhashini", |env| Ok(Arc::new(BhashiniTranslationClient::from_env(env)?))),
    ("google", |env| Ok(Arc::new(GoogleTranslationClient::from_env(env)?))),
    ("dhruva", |env| Ok(Arc::new(DhruvaTranslationClient::from_env(env)?))),
];

const STORAGE_PROVIDERS: &[(&str, Constructor<dyn ObjectStorage>)] = &[
    ("oci", |env| Ok(Arc::new(OciBucketClient::from_env(env)?))),
    ("gcp", |env| Ok(Arc::new(GcpBucketClient::from_env(env)?))),
    ("aws", |env| Ok(Arc::new(AwsS3BucketClient::from_env(env)?))),
];

const VECTOR_STORE_PROVIDERS: &[(&str, Constructor<dyn VectorStore>)] = &[
    ("marqo", |env| Ok(Arc::new(MarqoVectorStore::from_env(env)?))),
];

/// Name of the provider selected for `capability`.
pub fn selected_name(env: &EnvVars, capability: Capability) -> Result<String> {
    env.get(capability.env_key())
        .map(|name| name.trim().to_string())
        .ok_or_else(|| {
            Error::config(format!(
                "Missing credentials. Please pass the `{}` environment variable",
                capability.env_key()
            ))
        })
}

fn resolve<T: ?Sized>(
    env: &EnvVars,
    capability: Capability,
    table: &[(&str, Constructor<T>)],
) -> Result<Arc<T>> {
    let name = selected_name(env, capability)?;
    let constructor = table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, constructor)| constructor)
        .ok_or_else(|| {
            Error::config(format!(
                "unknown provider name '{}' for {} (expected one of: {})",
                name,
                capability,
                table.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", ")
            ))
        })?;

    let instance = constructor(env)?;
    tracing::info!("Init {} class for: {}", capability, name);
    Ok(instance)
}

pub fn resolve_llm(env: &EnvVars) -> Result<Arc<dyn ChatClient>> {
    resolve(env, Capability::Llm, LLM_PROVIDERS)
}

pub fn resolve_translator(env: &EnvVars) -> Result<Arc<dyn Translator>> {
    resolve(env, Capability::Translate, TRANSLATION_PROVIDERS)
}

pub fn resolve_storage(env: &EnvVars) -> Result<Arc<dyn ObjectStorage>> {
    resolve(env, Capability::Storage, STORAGE_PROVIDERS)
}

pub fn resolve_vector_store(env: &EnvVars) -> Result<Arc<dyn VectorStore>> {
    resolve(env, Capability::VectorStore, VECTOR_STORE_PROVIDERS)
}

/// One instance per capability family, built at startup.
#[derive(Clone)]
pub struct Providers {
    pub llm: Arc<dyn ChatClient>,
    pub translate: Arc<dyn Translator>,
    pub storage: Arc<dyn ObjectStorage>,
    pub vector_store: Arc<dyn VectorStore>,
}

impl Providers {
    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self {
            llm: resolve_llm(env)?,
            translate: resolve_translator(env)?,
            storage: resolve_storage(env)?,
            vector_store: resolve_vector_store(env)?,
        })
    }

    /// `(capability, provider)` pairs for health reporting.
    pub fn summary(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            (Capability::Llm.name(), self.llm.provider_name()),
            (Capability::Translate.name(), self.translate.provider_name()),
            (Capability::Storage.name(), self.storage.provider_name()),
            (Capability::VectorStore.name(), self.vector_store.provider_name()),
        ]
    }
}
