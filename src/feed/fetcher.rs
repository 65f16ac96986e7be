use std::time::Duration;

use feed_rs::parser;
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{NewSource, NewSourceItem, Source};

const MAX_CONCURRENT_FETCHES: usize = 5;

/// Fetches registered sources for the sync job.
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("speedy-digest/1.0")
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, source_id: i64, url: &str) -> Result<Vec<NewSourceItem>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_items(source_id, &bytes)
    }

    /// Fetch every source, at most five at a time. Sources that fail are
    /// logged and left out.
    pub async fn refresh_all(&self, sources: Vec<Source>) -> Vec<(i64, Vec<NewSourceItem>)> {
        stream::iter(sources)
            .map(|source| async move {
                match self.fetch_feed(source.id, &source.url).await {
                    Ok(items) => {
                        tracing::debug!("Fetched {} items from {}", items.len(), source.title);
                        Some((source.id, items))
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch {}: {}", source.url, e);
                        None
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .filter_map(|r| async { r })
            .collect()
            .await
    }

    /// Resolve a URL to a source. Direct RSS/Atom feeds are used as is; for
    /// HTML pages the first advertised feed link is followed.
    pub async fn discover_source(&self, url: &str, digest_enabled: bool) -> Result<NewSource> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch URL: HTTP {}", response.status()).into());
        }

        let final_url = response.url().to_string();
        let bytes = response.bytes().await?;

        if let Ok(feed) = parser::parse(&bytes[..]) {
            return Ok(NewSource {
                title: feed_title(feed.title),
                url: final_url,
                digest_enabled,
            });
        }

        let html = String::from_utf8_lossy(&bytes);
        let feed_url = find_feed_link(&html, &final_url)
            .ok_or_else(|| AppError::Config(format!("no RSS/Atom feed found at {url}")))?;

        let feed_response = self.client.get(&feed_url).send().await?;
        if !feed_response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch discovered feed: HTTP {}",
                feed_response.status()
            )
            .into());
        }
        let feed = parser::parse(&feed_response.bytes().await?[..])?;

        Ok(NewSource {
            title: feed_title(feed.title),
            url: feed_url,
            digest_enabled,
        })
    }
}

fn feed_title(title: Option<feed_rs::model::Text>) -> String {
    title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled Feed".to_string())
}

/// Turn a feed document into items. Entries without a link are dropped
/// since the link is the item's identity.
pub fn parse_items(source_id: i64, bytes: &[u8]) -> Result<Vec<NewSourceItem>> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone())?;
            // Content first, then the summary. Kept as HTML for image lookup.
            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));

            Some(NewSourceItem {
                source_id,
                title: entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string()),
                link,
                body,
                published_at: entry.published.or(entry.updated),
            })
        })
        .collect();

    Ok(items)
}

/// Search HTML for an RSS/Atom `<link rel="alternate">`.
fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    let link_re = Regex::new(
        r#"<link[^>]*rel=["']alternate["'][^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
    )
    .ok()?;
    // Type before rel.
    let link_re2 = Regex::new(
        r#"<link[^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
    )
    .ok()?;

    let href = link_re
        .captures(html)
        .or_else(|| link_re2.captures(html))
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().to_string())?;

    Some(resolve_url(&href, base_url))
}

fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>City News</title>
  <link>https://news.example.com</link>
  <description>d</description>
  <item>
    <title>Budget approved</title>
    <link>https://news.example.com/budget</link>
    <description>&lt;p&gt;&lt;img src="https://img/1.jpg"&gt;Council votes.&lt;/p&gt;</description>
    <pubDate>Mon, 02 Mar 2026 08:00:00 GMT</pubDate>
  </item>
  <item>
    <title>No link here</title>
    <description>orphan</description>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_items_and_drops_linkless_entries() {
        let items = parse_items(7, RSS.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.source_id, 7);
        assert_eq!(item.title, "Budget approved");
        assert_eq!(item.link, "https://news.example.com/budget");
        assert!(item.body.as_deref().unwrap().contains("<img"));
        assert!(item.published_at.is_some());
    }

    #[test]
    fn finds_and_resolves_relative_feed_link() {
        let html = r#"<head><link rel="alternate" type="application/rss+xml" href="/feed.xml"></head>"#;
        assert_eq!(
            find_feed_link(html, "https://news.example.com/section/").as_deref(),
            Some("https://news.example.com/feed.xml")
        );
    }

    #[tokio::test]
    async fn discovers_feed_through_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><link type="application/rss+xml" href="/rss"></head></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(Duration::from_secs(5)).unwrap();
        let source = fetcher
            .discover_source(&format!("{}/", server.uri()), false)
            .await
            .unwrap();

        assert_eq!(source.title, "City News");
        assert_eq!(source.url, format!("{}/rss", server.uri()));
        assert!(!source.digest_enabled);
    }
}
