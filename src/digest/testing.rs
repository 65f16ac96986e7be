//! Deterministic stand-ins for the external services.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::ai::{GenerativeSummarizer, SimilarityService, SimilarityVerdict, Translator};
use crate::error::{AppError, Result};
use crate::models::SourceItem;
use crate::services::{FetchedArticle, FullTextFetcher};

pub(crate) fn items(n: usize) -> Vec<SourceItem> {
    let now = Utc::now();
    (0..n)
        .map(|i| SourceItem {
            id: i as i64 + 1,
            source_id: 1,
            title: format!("Story {i}"),
            link: format!("https://news.example.com/{i}"),
            body: Some(format!("<p>Stored body {i}</p>")),
            published_at: Some(now - Duration::minutes(i as i64)),
            is_read: false,
            is_favorite: false,
        })
        .collect()
}

/// Replays queued replies, then answers `NoMatch`.
pub(crate) struct StubSimilarity {
    replies: Mutex<VecDeque<Result<SimilarityVerdict>>>,
    requests: Mutex<Vec<BTreeMap<usize, String>>>,
}

impl StubSimilarity {
    pub(crate) fn new(replies: Vec<Result<SimilarityVerdict>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<BTreeMap<usize, String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimilarityService for StubSimilarity {
    async fn compare(&self, texts: &BTreeMap<usize, String>) -> Result<SimilarityVerdict> {
        self.requests.lock().unwrap().push(texts.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SimilarityVerdict::NoMatch))
    }
}

/// Serves long deterministic pages, except for links marked as failing.
pub(crate) struct StubFetcher {
    fail_all: bool,
    failing: HashSet<String>,
}

impl StubFetcher {
    pub(crate) fn working() -> Self {
        Self {
            fail_all: false,
            failing: HashSet::new(),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_all: true,
            failing: HashSet::new(),
        }
    }

    pub(crate) fn failing_for(links: &[&str]) -> Self {
        Self {
            fail_all: false,
            failing: links.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[async_trait]
impl FullTextFetcher for StubFetcher {
    async fn fetch(&self, link: &str) -> Result<FetchedArticle> {
        if self.fail_all || self.failing.contains(link) {
            return Err(AppError::Extraction(format!("unreachable: {link}")));
        }
        Ok(FetchedArticle {
            title: Some(format!("Page {link}")),
            text: format!("Full report from {link}. The details were confirmed on Monday."),
            image: Some(format!("{link}/og.jpg")),
        })
    }
}

type SummaryFn = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Summarizer driven by a closure over `(title, text)`.
pub(crate) struct StubSummarizer {
    respond: SummaryFn,
    calls: AtomicUsize,
}

impl StubSummarizer {
    pub(crate) fn new(respond: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    /// Echoes the first title line back as the synopsis.
    pub(crate) fn echo() -> Self {
        Self::new(|title, _| Ok(format!("Synopsis of {}", title.lines().next().unwrap_or(""))))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeSummarizer for StubSummarizer {
    async fn summarize(&self, title: &str, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(title, text)
    }
}

pub(crate) struct StubTranslator {
    pub(crate) fail: bool,
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, text: &str, language: &str) -> Result<String> {
        if self.fail {
            return Err(AppError::LlmApi("translation unavailable".into()));
        }
        Ok(format!("[{language}] {text}"))
    }
}
