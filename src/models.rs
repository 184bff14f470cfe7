use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// A chunk of source text with free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: JsonMap<String, JsonValue>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: JsonMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A search hit. Order is whatever the backend returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Result of one pipeline invocation: answer, optional error message, HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub answer: String,
    pub error: Option<String>,
    pub status: u16,
}

impl QueryOutcome {
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            error: None,
            status: 200,
        }
    }

    pub fn failed(error: impl Into<String>, status: u16) -> Self {
        Self {
            answer: String::new(),
            error: Some(error.into()),
            status,
        }
    }
}

// HTTP API types

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub index_id: String,
    pub query: String,
    pub audience_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub fresh_collection: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheDocumentsRequest {
    pub documents: Vec<Document>,
    pub collection_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdsResponse {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub collection_name: String,
    #[serde(default = "default_search_k")]
    pub k: usize,
}

fn default_search_k() -> usize {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub documents: Vec<ScoredDocument>,
    pub failed: bool,
}
