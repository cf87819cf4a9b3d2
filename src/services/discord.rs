use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{format_timestamp, ArticleRecord};

use super::Notifier;

const EMBED_COLOR: u32 = 0x0099ff;
const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Embed {
    title: String,
    url: String,
    color: u32,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

/// Build the Discord embed announcing `article`.
pub fn build_embed(article: &ArticleRecord, category_name: &str) -> Embed {
    let published = article.published_at();

    let published_display = published
        .map(|dt| dt.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S").to_string())
        .unwrap_or_else(|| article.pub_date.clone());

    Embed {
        title: article.title.clone(),
        url: article.link.clone(),
        color: EMBED_COLOR,
        fields: vec![
            EmbedField {
                name: "Category".to_string(),
                value: category_name.to_string(),
                inline: true,
            },
            EmbedField {
                name: "Published".to_string(),
                value: published_display,
                inline: true,
            },
        ],
        timestamp: published.map(format_timestamp),
        description: truncate_snippet(&article.content_snippet),
    }
}

fn truncate_snippet(snippet: &str) -> Option<String> {
    if snippet.is_empty() {
        return None;
    }
    if snippet.chars().count() <= SNIPPET_MAX_CHARS {
        return Some(snippet.to_string());
    }
    let mut truncated: String = snippet.chars().take(SNIPPET_MAX_CHARS).collect();
    truncated.push_str("...");
    Some(truncated)
}

pub struct DiscordNotifier {
    client: Client,
}

impl DiscordNotifier {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, webhook_url: &str, article: &ArticleRecord, category_name: &str) -> Result<()> {
        if webhook_url.trim().is_empty() {
            return Err(AppError::Notification("no webhook URL given".to_string()));
        }
        if article.title.is_empty() || article.link.is_empty() {
            return Err(AppError::Notification(format!(
                "article {} is missing a title or link",
                article.id
            )));
        }

        let payload = WebhookPayload {
            embeds: vec![build_embed(article, category_name)],
        };

        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("Posted to Discord: {}", article.title);
        Ok(())
    }
}
