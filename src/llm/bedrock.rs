//! Amazon Bedrock via the Converse API with bearer-token (API key) auth.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{endpoint, read_completion, ChatClient};
use crate::config::EnvVars;
use crate::error::Result;
use crate::models::ChatMessage;

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

impl ConverseRequest {
    /// Bedrock takes system prompts out of band; everything else keeps its order.
    fn from_messages(messages: &[ChatMessage]) -> Self {
        let mut system = Vec::new();
        let mut turns = Vec::new();
        for message in messages {
            let block = ContentBlock {
                text: Some(message.content.clone()),
            };
            if message.role == "system" {
                system.push(block);
            } else {
                turns.push(ConverseMessage {
                    role: message.role.clone(),
                    content: vec![block],
                });
            }
        }
        Self {
            messages: turns,
            system,
        }
    }
}

pub struct BedrockChatClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BedrockChatClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        let region = env.require("AWS_REGION")?;
        Ok(Self::new(
            format!("https://bedrock-runtime.{}.amazonaws.com", region),
            env.require("AWS_BEARER_TOKEN_BEDROCK")?,
        ))
    }
}

#[async_trait]
impl ChatClient for BedrockChatClient {
    async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(&self.base_url, &["model", model, "converse"])?;
        let sent = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ConverseRequest::from_messages(messages))
            .send()
            .await;
        let response: ConverseResponse = read_completion(self.provider_name(), sent).await?;
        Ok(response
            .output
            .message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    fn provider_name(&self) -> &'static str {
        "bedrock"
    }
}
