mod fetcher;

pub use fetcher::{parse_items, FeedFetcher};
