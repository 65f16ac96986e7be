use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const MIN_TEXT_CHARS: usize = 200;
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const NO_WRAP_WIDTH: usize = 10_000;

/// Readable content of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArticle {
    pub title: Option<String>,
    pub text: String,
    /// `og:image` of the page, if declared.
    pub image: Option<String>,
}

/// Full-text fetch collaborator. Always fallible.
#[async_trait]
pub trait FullTextFetcher: Send + Sync {
    async fn fetch(&self, link: &str) -> Result<FetchedArticle>;
}

pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FullTextFetcher for ContentFetcher {
    async fn fetch(&self, link: &str) -> Result<FetchedArticle> {
        let url = Url::parse(link)
            .map_err(|e| AppError::Extraction(format!("invalid link {link}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Extraction(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Extraction(format!(
                "fetching {link} returned HTTP {}",
                response.status()
            )));
        }

        let too_large = || AppError::Extraction(format!("{link} is larger than {MAX_BODY_BYTES} bytes"));
        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_BYTES as u64)
        {
            return Err(too_large());
        }

        // The declared length can be missing or wrong, so bound the read too.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        let html = String::from_utf8_lossy(&body);

        extract_article(&html)
    }
}

/// Convert a page to readable text and pick out its title and `og:image`.
pub fn extract_article(html: &str) -> Result<FetchedArticle> {
    let text = html_to_text(html)
        .ok_or_else(|| AppError::Extraction("could not convert HTML to text".to_string()))?;

    let length = text.chars().count();
    if length <= MIN_TEXT_CHARS {
        return Err(AppError::Extraction(format!(
            "extracted content too short ({length} chars)"
        )));
    }

    Ok(FetchedArticle {
        title: page_title(html),
        text,
        image: og_image(html),
    })
}

/// Render HTML as plain text, one block per paragraph with a blank line
/// between blocks. Lines are not wrapped, so a sentence never spans lines.
pub fn html_to_text(html: &str) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), NO_WRAP_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    // Rules and other decoration carry no words.
    let cleaned = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| l.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(cleaned)
}

fn page_title(html: &str) -> Option<String> {
    let title_re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    title_re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn og_image(html: &str) -> Option<String> {
    // Either attribute order is common.
    let content_after = Regex::new(
        r#"(?i)<meta[^>]*property=["']og:image["'][^>]*content=["']([^"']+)["']"#,
    )
    .ok()?;
    let content_before = Regex::new(
        r#"(?i)<meta[^>]*content=["']([^"']+)["'][^>]*property=["']og:image["']"#,
    )
    .ok()?;

    content_after
        .captures(html)
        .or_else(|| content_before.captures(html))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(paragraphs: usize) -> String {
        let body = "<p>The council approved the new budget after a long debate about transit.</p>"
            .repeat(paragraphs);
        format!(
            r#"<html><head><title> Budget approved </title>
            <meta property="og:image" content="https://cdn.example.com/lead.jpg">
            </head><body>{body}</body></html>"#
        )
    }

    #[test]
    fn extracts_title_text_and_image() {
        let article = extract_article(&page(5)).unwrap();
        assert_eq!(article.title.as_deref(), Some("Budget approved"));
        assert_eq!(
            article.image.as_deref(),
            Some("https://cdn.example.com/lead.jpg")
        );
        assert!(article.text.contains("council approved"));
    }

    #[test]
    fn og_image_with_content_first() {
        let html = r#"<meta content="https://img/x.png" property="og:image">"#;
        assert_eq!(og_image(html).as_deref(), Some("https://img/x.png"));
    }

    #[test]
    fn short_pages_are_rejected() {
        assert!(matches!(
            extract_article(&page(1)),
            Err(AppError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn fetches_and_reports_http_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(5)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(Duration::from_secs(5)).unwrap();

        let article = fetcher
            .fetch(&format!("{}/story", server.uri()))
            .await
            .unwrap();
        assert!(article.text.contains("transit"));

        let missing = fetcher.fetch(&format!("{}/missing", server.uri())).await;
        assert!(matches!(missing, Err(AppError::Extraction(_))));
    }

    #[tokio::test]
    async fn oversized_pages_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(MAX_BODY_BYTES + 1)))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(Duration::from_secs(5)).unwrap();
        let result = fetcher.fetch(&format!("{}/huge", server.uri())).await;

        assert!(matches!(result, Err(AppError::Extraction(message)) if message.contains("larger than")));
    }

    #[tokio::test]
    async fn rejects_non_http_links() {
        let fetcher = ContentFetcher::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            fetcher.fetch("file:///etc/passwd").await,
            Err(AppError::Extraction(_))
        ));
    }
}
