use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required setting or environment variable is missing or invalid.
    #[error("{0}")]
    Configuration(String),

    /// The completion API throttled the request.
    #[error("{0}")]
    RateLimited(String),

    /// The completion API failed, is overloaded, or is unreachable.
    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector search error: {0}")]
    VectorSearch(String),

    /// A vector store rejected part of an ingestion request.
    #[error("{0}")]
    Ingestion(String),

    #[error("Prompt template error: {0}")]
    Template(String),

    #[error("Document metadata is missing required key '{0}'")]
    MissingMetadata(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(e: qdrant_client::QdrantError) -> Self {
        Error::VectorSearch(e.to_string())
    }
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn missing_env(name: &str) -> Self {
        Error::Configuration(format!("Missing environment variable {}.", name))
    }

    /// HTTP status used when this error escapes the query pipeline unconverted.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Configuration(_) => 422,
            Error::RateLimited(_) => 500,
            Error::UpstreamUnavailable(_) => 503,
            _ => 500,
        }
    }
}
