use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use anyhow::Result;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use chrono::Utc;

use rag_backend::config::{EnvVars, Settings};
use rag_backend::models::{
    AddDocumentsRequest, CacheDocumentsRequest, IdsResponse, QueryRequest, QueryResponse,
    SearchRequest, SearchResponse,
};
use rag_backend::providers::Providers;
use rag_backend::rag::embeddings::EmbeddingGenerator;
use rag_backend::rag::vector_store::QdrantIndex;
use rag_backend::rag::RAGEngine;

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

struct AppState {
    rag_engine: RAGEngine,
    providers: Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Arc::new(Settings::load()?);
    let env = EnvVars::from_process();
    let server_addr = env.get_or("SERVER_ADDR", DEFAULT_SERVER_ADDR);

    let providers = Providers::from_env(&env)?;
    let embeddings = EmbeddingGenerator::new(settings.embedding()?);

    let qdrant_url = settings.qdrant_url();
    tracing::info!("Connecting to Qdrant: {}", qdrant_url);
    let index = QdrantIndex::new(&qdrant_url)?;

    let rag_engine = RAGEngine::new(
        settings.clone(),
        providers.llm.clone(),
        Arc::new(embeddings),
        Arc::new(index),
    );

    let state = Arc::new(AppState {
        rag_engine,
        providers,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/v1/query", post(query_handler))
        .route("/v1/documents", post(add_documents_handler))
        .route("/v1/cache", post(cache_documents_handler))
        .route("/v1/search", post(search_handler))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server_addr).await?;
    tracing::info!("Backend server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let request_id = Uuid::new_v4();
    tracing::info!(
        "Query {} on index {} for audience {}",
        request_id,
        request.index_id,
        request.audience_type
    );

    let result = state
        .rag_engine
        .query(&request.index_id, &request.query, &request.audience_type)
        .await;

    match result {
        Ok(outcome) => {
            if let Some(ref error) = outcome.error {
                tracing::warn!("Query {} failed with {}: {}", request_id, outcome.status, error);
            }
            (
                status(outcome.status),
                Json(QueryResponse {
                    answer: outcome.answer,
                    error: outcome.error,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Query {} error: {}", request_id, e);
            (
                status(e.status_code()),
                Json(QueryResponse {
                    answer: String::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn add_documents_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddDocumentsRequest>,
) -> Result<Json<IdsResponse>, (StatusCode, String)> {
    let ids = state
        .providers
        .vector_store
        .add_documents(&payload.documents, payload.fresh_collection)
        .await
        .map_err(|e| {
            tracing::error!("Document ingestion error: {}", e);
            (status(e.status_code()), format!("Ingestion error: {}", e))
        })?;

    tracing::info!(
        "Ingested {} documents into {}",
        ids.len(),
        state.providers.vector_store.collection_name()
    );
    Ok(Json(IdsResponse { ids }))
}

async fn cache_documents_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CacheDocumentsRequest>,
) -> Result<Json<IdsResponse>, (StatusCode, String)> {
    let ids = state
        .providers
        .vector_store
        .cache_documents(&payload.documents, &payload.collection_name)
        .await
        .map_err(|e| {
            tracing::error!("Cache ingestion error: {}", e);
            (status(e.status_code()), format!("Ingestion error: {}", e))
        })?;

    Ok(Json(IdsResponse { ids }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let outcome = state
        .providers
        .vector_store
        .similarity_search_with_score(&request.query, &request.collection_name, request.k)
        .await;

    let failed = outcome.is_failure();
    Json(SearchResponse {
        documents: outcome.into_documents(),
        failed,
    })
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let providers: serde_json::Map<String, serde_json::Value> = state
        .providers
        .summary()
        .into_iter()
        .map(|(capability, provider)| (capability.to_string(), provider.into()))
        .collect();

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "providers": providers,
    }))
}
