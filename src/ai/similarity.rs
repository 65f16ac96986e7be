use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::client::ChatClient;
use super::prompts::COMPARE_TITLES;
use crate::error::{AppError, Result};

/// Answer of a similarity comparison over indexed texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimilarityVerdict {
    NoMatch,
    /// Groups of indices judged to discuss the same subject. Groups may
    /// overlap; callers merge them.
    Groups(Vec<Vec<usize>>),
}

impl SimilarityVerdict {
    pub fn into_groups(self) -> Vec<Vec<usize>> {
        match self {
            SimilarityVerdict::NoMatch => Vec::new(),
            SimilarityVerdict::Groups(groups) => groups,
        }
    }
}

#[async_trait]
pub trait SimilarityService: Send + Sync {
    /// Compare the texts keyed by small integer index. A reply that cannot
    /// be read as index groups is `Err(AppError::MalformedResponse)`.
    async fn compare(&self, texts: &BTreeMap<usize, String>) -> Result<SimilarityVerdict>;
}

/// Similarity comparison through a chat model.
pub struct LlmSimilarity {
    client: Arc<ChatClient>,
    model: String,
}

impl LlmSimilarity {
    pub fn new(client: Arc<ChatClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl SimilarityService for LlmSimilarity {
    async fn compare(&self, texts: &BTreeMap<usize, String>) -> Result<SimilarityVerdict> {
        let listing = texts
            .iter()
            .map(|(index, text)| format!("{index}: {}", text.replace('\n', " ")))
            .collect::<Vec<_>>()
            .join("\n");

        let reply = self
            .client
            .complete(&self.model, COMPARE_TITLES, &listing)
            .await?;
        parse_verdict(&reply)
    }
}

/// Read a reply such as `([0, 2], [3, 4])` or `None`. Index lists are
/// picked out wherever they appear, so surrounding prose is tolerated.
pub fn parse_verdict(reply: &str) -> Result<SimilarityVerdict> {
    let text = strip_code_fence(reply.trim());

    let bare = text.trim_end_matches('.').trim();
    if bare.eq_ignore_ascii_case("none") || bare.eq_ignore_ascii_case("(none)") {
        return Ok(SimilarityVerdict::NoMatch);
    }
    // An explicit empty tuple.
    if matches!(bare, "()" | "[]") {
        return Ok(SimilarityVerdict::NoMatch);
    }
    if !text.contains('[') {
        return Err(AppError::MalformedResponse(format!(
            "no index lists in: {}",
            truncate(reply, 200)
        )));
    }

    let group_re = Regex::new(r"\[([^\[\]]+)\]").map_err(anyhow::Error::from)?;
    let mut groups = Vec::new();
    for captures in group_re.captures_iter(text) {
        let inner = captures.get(1).map_or("", |m| m.as_str());
        let group = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::MalformedResponse(format!("bad index in [{inner}]: {e}")))?;
        if !group.is_empty() {
            groups.push(group);
        }
    }

    if groups.is_empty() {
        return Ok(SimilarityVerdict::NoMatch);
    }
    Ok(SimilarityVerdict::Groups(groups))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
