use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::{Link, Text};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{format_timestamp, ArticleRecord};

use super::FeedSource;

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        // No request timeout: a hung feed stalls the run rather than being
        // silently retried or cut short.
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(url).map_err(|e| fetch_error(url, format!("invalid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(fetch_error(url, format!("unsupported URL scheme: {}", parsed.scheme())));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(url, format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<ArticleRecord>> {
        let bytes = self.download(url).await?;
        let articles = parse_feed(&bytes, Utc::now()).map_err(|e| fetch_error(url, e.to_string()))?;
        tracing::debug!("Fetched {} articles from {}", articles.len(), url);
        Ok(articles)
    }
}

fn fetch_error(url: &str, message: impl Into<String>) -> AppError {
    AppError::FeedFetch {
        url: url.to_string(),
        message: message.into(),
    }
}

/// Parse RSS/Atom bytes into normalized records.
///
/// `fetched_at` stands in for items that carry no usable date.
pub fn parse_feed(bytes: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<ArticleRecord>> {
    // Entries without a guid/id are identified by their link
    let feed = parser::Builder::new()
        .id_generator(link_identity)
        .build()
        .parse(bytes)?;

    let articles = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let id = if entry.id.is_empty() { link.clone() } else { entry.id };

            if id.is_empty() {
                tracing::debug!("Dropping feed item with neither id nor link");
                return None;
            }

            // Try summary first, then fall back to content
            let snippet_html = entry
                .summary
                .as_ref()
                .map(|s| s.content.as_str())
                .filter(|s| !s.trim().is_empty())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()));

            let published_at = entry.published.or(entry.updated).unwrap_or(fetched_at);

            Some(ArticleRecord {
                id,
                title: entry
                    .title
                    .map(|t| t.content)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "Untitled".to_string()),
                link,
                pub_date: format_timestamp(published_at),
                content_snippet: snippet_html.map(plain_text).unwrap_or_default(),
                site_name: String::new(),
            })
        })
        .collect();

    Ok(articles)
}

fn link_identity(links: &[Link], _title: &Option<Text>, _uri: Option<&str>) -> String {
    links.first().map(|l| l.href.clone()).unwrap_or_default()
}

fn plain_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000).unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
