pub mod documents;
pub mod embeddings;
pub mod vector_store;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::llm::ChatClient;
use crate::models::{ChatMessage, QueryOutcome};
use self::documents::{filter_by_score, format_sources, render_prompt, truncate};
use self::embeddings::Embedder;
use self::vector_store::VectorIndex;

/// Nearest neighbours fetched before score filtering.
pub const SEARCH_LIMIT: u64 = 20;

pub const NOT_TRAINED_MESSAGE: &str = "I'm sorry, but I am not currently trained with relevant documents to provide a specific answer for your question.";

pub const SERVER_OVERLOADED_MESSAGE: &str =
    "Server is overloaded or unable to answer your request at the moment. Please try again later";

const DEFAULT_INTENT: &str = "No";

pub struct RAGEngine {
    settings: Arc<Settings>,
    llm: Arc<dyn ChatClient>,
    embeddings: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl RAGEngine {
    pub fn new(
        settings: Arc<Settings>,
        llm: Arc<dyn ChatClient>,
        embeddings: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            settings,
            llm,
            embeddings,
            index,
        }
    }

    /// Answer `query` for `audience_type`, retrieving context from `index_id`.
    ///
    /// Failures of the retrieval branch are folded into the returned
    /// [`QueryOutcome`]. A missing `gpt_model` and failures while classifying
    /// intent or answering from the bot prompt are returned as `Err`.
    pub async fn query(&self, index_id: &str, query: &str, audience_type: &str) -> Result<QueryOutcome> {
        tracing::debug!("Query: {}", query);

        let gpt_model = self.settings.gpt_model().ok_or_else(|| {
            Error::config("Please configure gpt_model under llm section in config file!")
        })?;

        let intent = self.classify_intent(&gpt_model, query).await?;
        if intent.eq_ignore_ascii_case("yes") {
            return self.answer_from_bot_prompt(&gpt_model, query, audience_type).await;
        }

        match self.answer_from_documents(&gpt_model, index_id, query, audience_type).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("Query against {} failed: {}", index_id, e);
                Ok(failure_outcome(&e))
            }
        }
    }

    async fn classify_intent(&self, model: &str, query: &str) -> Result<String> {
        if !self.settings.bot_intent_enabled() {
            return Ok(DEFAULT_INTENT.to_string());
        }
        let Some(intent_prompt) = self.settings.intent_prompt() else {
            return Ok(DEFAULT_INTENT.to_string());
        };

        let verdict = self
            .llm
            .chat_completion(model, &[ChatMessage::system(intent_prompt), ChatMessage::user(query)])
            .await?;
        tracing::info!(intent_response = %verdict, "llm intent response");
        Ok(verdict)
    }

    async fn answer_from_bot_prompt(&self, model: &str, query: &str, audience_type: &str) -> Result<QueryOutcome> {
        let system_rules = self
            .settings
            .bot_prompt(audience_type)?
            .ok_or_else(|| {
                Error::config(format!("No bot_prompt configured for audience '{}'", audience_type))
            })?;
        tracing::debug!("System rules: {}", system_rules);

        let response = self
            .llm
            .chat_completion(model, &[ChatMessage::system(system_rules), ChatMessage::user(query)])
            .await?;
        tracing::info!(bot_response = %response, "llm bot response");
        Ok(QueryOutcome::answered(response))
    }

    async fn answer_from_documents(
        &self,
        model: &str,
        index_id: &str,
        query: &str,
        audience_type: &str,
    ) -> Result<QueryOutcome> {
        let system_template = self
            .settings
            .activity_prompt(audience_type)?
            .unwrap_or_default();
        let top_docs_to_fetch = self.settings.top_docs_to_fetch()?;
        let min_score = self.settings.docs_min_score()?;

        let vector = self.embeddings.embed(query).await?;
        let results = self.index.search(index_id, vector, SEARCH_LIMIT).await?;
        tracing::debug!("Search on {} returned {} documents", index_id, results.len());
        if results.is_empty() {
            return Ok(QueryOutcome::answered(NOT_TRAINED_MESSAGE));
        }

        let selected = truncate(filter_by_score(results, min_score), top_docs_to_fetch);
        tracing::debug!(
            "{} documents kept after filtering (min score {}, top {})",
            selected.len(),
            min_score,
            top_docs_to_fetch
        );
        if selected.is_empty() {
            return Ok(QueryOutcome::answered(NOT_TRAINED_MESSAGE));
        }

        let contexts = format_sources(&selected)?;
        let system_rules = render_prompt(&system_template, &contexts)?;
        tracing::debug!("System rules: {}", system_rules);

        let response = self
            .llm
            .chat_completion(model, &[ChatMessage::system(system_rules), ChatMessage::user(query)])
            .await?;
        tracing::info!(activity_response = %response, "llm activity response");

        Ok(QueryOutcome::answered(response.trim_end_matches(';')))
    }
}

/// Map a retrieval-branch failure onto the client-visible outcome.
pub fn failure_outcome(error: &Error) -> QueryOutcome {
    match error {
        Error::RateLimited(message) => QueryOutcome::failed(
            format!("LLM API request exceeded rate limit: {}", message),
            500,
        ),
        Error::UpstreamUnavailable(_) => QueryOutcome::failed(SERVER_OVERLOADED_MESSAGE, 503),
        other => QueryOutcome::failed(describe_failure(other), 500),
    }
}

fn describe_failure(error: &Error) -> String {
    match std::error::Error::source(error) {
        Some(cause) => format!("{} and {}", cause, error),
        None => error.to_string(),
    }
}
