use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::client::ChatClient;
use super::prompts::SUMMARIZE_ONE;
use crate::error::{AppError, Result};

const MAX_INPUT_CHARS: usize = 10_000;
const PREAMBLE: &str = "Here is a summary";

#[async_trait]
pub trait GenerativeSummarizer: Send + Sync {
    /// Summarize `text` under `title`. A reply without the requested JSON
    /// object is `Err(AppError::NoStructuredContent)`.
    async fn summarize(&self, title: &str, text: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
}

pub struct LlmSummarizer {
    client: Arc<ChatClient>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(client: Arc<ChatClient>, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeSummarizer for LlmSummarizer {
    async fn summarize(&self, title: &str, text: &str) -> Result<String> {
        let content = truncate_chars(text, MAX_INPUT_CHARS);
        let user_message = format!("Title: {title}\n\nContent:\n{content}");

        let reply = self
            .client
            .complete(&self.model, SUMMARIZE_ONE, &user_message)
            .await?;

        let summary = extract_summary(&reply)?;
        Ok(strip_preamble(&summary).to_string())
    }
}

/// Pull `summary` out of the first `{...}` object in a reply.
pub fn extract_summary(reply: &str) -> Result<String> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(AppError::NoStructuredContent);
    };
    if end < start {
        return Err(AppError::NoStructuredContent);
    }

    let payload: SummaryPayload =
        serde_json::from_str(&reply[start..=end]).map_err(|_| AppError::NoStructuredContent)?;
    let summary = payload.summary.trim();
    if summary.is_empty() {
        return Err(AppError::NoStructuredContent);
    }
    Ok(summary.to_string())
}

/// Drop a leading "Here is a summary ...:" line the models like to add.
pub fn strip_preamble(summary: &str) -> &str {
    if summary.starts_with(PREAMBLE) {
        if let Some((_, rest)) = summary.split_once(':') {
            return rest.trim();
        }
    }
    summary
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_summary_from_wrapped_json() {
        let reply = "Sure!\n{\"summary\": \"Rates rose again.\"}\nThanks";
        assert_eq!(extract_summary(reply).unwrap(), "Rates rose again.");
    }

    #[test]
    fn reply_without_json_is_sentinel() {
        assert!(matches!(
            extract_summary("Rates rose again."),
            Err(AppError::NoStructuredContent)
        ));
        assert!(matches!(
            extract_summary("} backwards {"),
            Err(AppError::NoStructuredContent)
        ));
        assert!(matches!(
            extract_summary("{\"other\": 1}"),
            Err(AppError::NoStructuredContent)
        ));
    }

    #[test]
    fn strips_preamble() {
        assert_eq!(
            strip_preamble("Here is a summary of the article: Rates rose."),
            "Rates rose."
        );
        assert_eq!(strip_preamble("Rates rose: again."), "Rates rose: again.");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(20);
        assert_eq!(truncate_chars(&text, 5).chars().count(), 5);
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
