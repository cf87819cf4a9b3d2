mod fetcher;

pub use fetcher::FeedFetcher;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ArticleRecord;

/// Anything that can turn a feed URL into normalized article records.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<ArticleRecord>>;
}
