use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{SearchPointsBuilder, Value as QdrantValue};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::{Error, Result};
use crate::models::{Document, ScoredDocument};

/// Nearest-neighbour search over a named collection by query vector.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, collection_name: &str, vector: Vec<f32>, limit: u64) -> Result<Vec<ScoredDocument>>;
}

pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    pub fn new(url: &str) -> Result<Self> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = match Qdrant::from_url(url).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Qdrant client build failed: {:?}", e);
                return Err(e.into());
            }
        };
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, collection_name: &str, vector: Vec<f32>, limit: u64) -> Result<Vec<ScoredDocument>> {
        let search_result = self
            .client
            .search_points(SearchPointsBuilder::new(collection_name, vector, limit).with_payload(true))
            .await?;

        search_result
            .result
            .into_iter()
            .map(|point| payload_to_document(point.payload).map(|doc| ScoredDocument::new(doc, point.score)))
            .collect()
    }
}

/// The `text` payload field becomes the document body, everything else is metadata.
pub fn payload_to_document(payload: HashMap<String, QdrantValue>) -> Result<Document> {
    let mut metadata: JsonMap<String, JsonValue> = payload
        .into_iter()
        .map(|(key, value)| (key, to_json(value)))
        .collect();

    let page_content = match metadata.remove("text") {
        Some(JsonValue::String(text)) => text,
        Some(other) => other.to_string(),
        None => return Err(Error::VectorSearch("search hit has no 'text' payload".to_string())),
    };

    Ok(Document {
        page_content,
        metadata,
    })
}

fn to_json(value: QdrantValue) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => JsonValue::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(st)) => JsonValue::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect(),
        ),
    }
}
