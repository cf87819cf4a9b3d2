use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArticleRecord;

/// One category's persisted document, `<data_dir>/<categoryId>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryState {
    pub category_id: String,
    pub category_name: String,
    pub articles: Vec<ArticleRecord>,
    pub last_updated: DateTime<Utc>,
}

/// Identities that have already been announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub posted_ids: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub name: String,
    pub article_count: usize,
    pub data_file: String,
}

/// Summary of every category for the browsing frontend. Rebuilt each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexState {
    pub categories: Vec<IndexEntry>,
    pub generated_at: DateTime<Utc>,
}
