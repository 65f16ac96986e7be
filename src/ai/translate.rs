use std::sync::Arc;

use async_trait::async_trait;

use super::client::ChatClient;
use super::prompts;
use crate::error::Result;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, language: &str) -> Result<String>;
}

/// Translation through the same chat endpoint used for summaries.
pub struct LlmTranslator {
    client: Arc<ChatClient>,
    model: String,
}

impl LlmTranslator {
    pub fn new(client: Arc<ChatClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, language: &str) -> Result<String> {
        let reply = self
            .client
            .complete(&self.model, &prompts::translate(language), text)
            .await?;
        Ok(reply.trim().to_string())
    }
}
