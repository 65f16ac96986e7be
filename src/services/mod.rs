mod content_fetcher;

pub use content_fetcher::{extract_article, html_to_text, ContentFetcher, FetchedArticle, FullTextFetcher};
