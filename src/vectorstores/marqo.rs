use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::{SearchOutcome, VectorStore};
use crate::config::EnvVars;
use crate::error::{Error, Result};
use crate::models::{Document, ScoredDocument};

const TENSOR_FIELDS: [&str; 1] = ["text"];
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_SPLIT_LENGTH: u32 = 2;
const DEFAULT_SPLIT_OVERLAP: u32 = 0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    treat_urls_and_pointers_as_images: bool,
    model: String,
    normalize_embeddings: bool,
    text_preprocessing: TextPreprocessing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextPreprocessing {
    split_length: u32,
    split_overlap: u32,
    split_method: &'static str,
}

impl IndexSettings {
    pub fn new(model: String, split_length: u32, split_overlap: u32) -> Self {
        Self {
            treat_urls_and_pointers_as_images: false,
            model,
            normalize_embeddings: true,
            text_preprocessing: TextPreprocessing {
                split_length,
                split_overlap,
                split_method: "passage",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct MarqoDocument {
    text: String,
    metadata: String,
}

impl MarqoDocument {
    fn from_document(document: &Document) -> Result<Self> {
        Ok(Self {
            text: document.page_content.clone(),
            metadata: serde_json::to_string(&document.metadata)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddDocumentsBody<'a> {
    documents: &'a [MarqoDocument],
    tensor_fields: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct AddDocumentsResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<ItemResult>,
}

#[derive(Debug, Deserialize)]
struct ItemResult {
    #[serde(rename = "_id", default)]
    id: String,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    q: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Option<String>,
    #[serde(rename = "_score")]
    score: f32,
}

impl SearchHit {
    fn into_scored(self) -> Result<ScoredDocument> {
        let metadata: JsonMap<String, JsonValue> = match self.metadata.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
            _ => JsonMap::new(),
        };
        Ok(ScoredDocument::new(
            Document {
                page_content: self.text,
                metadata,
            },
            self.score,
        ))
    }
}

/// Marqo tensor search over its REST API.
pub struct MarqoVectorStore {
    client: Client,
    url: String,
    collection_name: String,
    settings: IndexSettings,
    batch_size: usize,
}

impl MarqoVectorStore {
    pub fn new(url: String, collection_name: String, settings: IndexSettings, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("Vector store batch size must be greater than zero."));
        }
        Ok(Self {
            client: Client::new(),
            url,
            collection_name,
            settings,
            batch_size,
        })
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        let url = env.require("VECTOR_STORE_ENDPOINT")?;
        let collection_name = env.require("VECTOR_COLLECTION_NAME")?;
        let model = env.require("EMBEDDING_MODEL")?;
        let settings = IndexSettings::new(
            model,
            env.parse_or("VECTOR_SPLIT_LENGTH", DEFAULT_SPLIT_LENGTH)?,
            env.parse_or("VECTOR_SPLIT_OVERLAP", DEFAULT_SPLIT_OVERLAP)?,
        );
        Self::new(
            url,
            collection_name,
            settings,
            env.parse_or("VECTOR_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        )
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{}", self.url.trim_end_matches('/'), name)
    }

    async fn create_index(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.index_url(name))
            .json(&self.settings)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ingestion(format!(
                "Could not create index {}: {} - {}",
                name, status, body
            )));
        }
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self.client.delete(self.index_url(name)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ingestion(format!(
                "Could not delete index {}: {} - {}",
                name, status, body
            )));
        }
        Ok(())
    }

    async fn submit(&self, name: &str, documents: &[MarqoDocument]) -> Result<AddDocumentsResponse> {
        let response = self
            .client
            .post(format!("{}/documents", self.index_url(name)))
            .json(&AddDocumentsBody {
                documents,
                tensor_fields: &TENSOR_FIELDS,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ingestion(format!(
                "Upload to index {} failed: {} - {}",
                name, status, body
            )));
        }
        Ok(response.json().await?)
    }

    async fn search(&self, query: &str, collection_name: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let response = self
            .client
            .post(format!("{}/search", self.index_url(collection_name)))
            .json(&SearchBody { q: query, limit: k })
            .send()
            .await?
            .error_for_status()?;
        let parsed: SearchResponse = response.json().await?;
        parsed
            .hits
            .into_iter()
            .take(k)
            .map(SearchHit::into_scored)
            .collect()
    }
}

#[async_trait]
impl VectorStore for MarqoVectorStore {
    async fn add_documents(&self, documents: &[Document], fresh_collection: bool) -> Result<Vec<String>> {
        let name = self.collection_name.as_str();

        if fresh_collection {
            match self.delete_index(name).await {
                Ok(()) => tracing::info!("Existing index {} deleted", name),
                Err(e) => tracing::warn!("Index {} not deleted ({}), creating a new one", name, e),
            }
            self.create_index(name).await?;
            tracing::info!("Index {} created", name);
        }

        let docs = documents
            .iter()
            .map(MarqoDocument::from_document)
            .collect::<Result<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(docs.len());
        for (batch_no, batch) in docs.chunks(self.batch_size).enumerate() {
            let response = self.submit(name, batch).await?;
            if response.errors {
                // Earlier batches remain in the index.
                return Err(Error::Ingestion(format!(
                    "Error in upload for documents in batch {} of index {} ({} documents already committed), check Marqo logs.",
                    batch_no,
                    name,
                    ids.len()
                )));
            }
            ids.extend(response.items.into_iter().map(|item| item.id));
            tracing::debug!("Uploaded batch {} ({} documents) to {}", batch_no, batch.len(), name);
        }

        tracing::info!("Added {} documents to index {}", ids.len(), name);
        Ok(ids)
    }

    async fn similarity_search_with_score(
        &self,
        query: &str,
        collection_name: &str,
        k: usize,
    ) -> SearchOutcome {
        match self.search(query, collection_name, k).await {
            Ok(hits) => SearchOutcome::from_hits(hits),
            Err(e) => {
                tracing::warn!("Similarity search on {} failed: {}", collection_name, e);
                SearchOutcome::Failed(e.to_string())
            }
        }
    }

    async fn cache_documents(&self, documents: &[Document], collection_name: &str) -> Result<Vec<String>> {
        if let Err(e) = self.create_index(collection_name).await {
            tracing::debug!("Cache index {} not created: {}", collection_name, e);
        }

        let docs = documents
            .iter()
            .map(MarqoDocument::from_document)
            .collect::<Result<Vec<_>>>()?;
        let response = self.submit(collection_name, &docs).await?;
        if response.errors {
            return Err(Error::Ingestion(format!(
                "Error in uploading cache in index {}, check Marqo logs.",
                collection_name
            )));
        }
        Ok(response.items.into_iter().map(|item| item.id).collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn provider_name(&self) -> &'static str {
        "marqo"
    }
}
