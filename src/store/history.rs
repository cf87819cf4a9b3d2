use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, HistoryState};

use super::write_json_atomic;

/// The cross-run ledger of identities that have already been announced.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    path: PathBuf,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the posted ids. Missing or malformed history is an empty set.
    pub async fn load(&self) -> HashSet<String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No history at {}; this is a first run", self.path.display());
                return HashSet::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read history {}: {}", self.path.display(), e);
                return HashSet::new();
            }
        };

        let doc: Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Invalid history JSON in {}: {}", self.path.display(), e);
                return HashSet::new();
            }
        };

        match doc.get("postedIds").and_then(Value::as_array) {
            Some(ids) => ids
                .iter()
                .filter_map(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                tracing::warn!(
                    "History {} has no postedIds array; starting empty",
                    self.path.display()
                );
                HashSet::new()
            }
        }
    }

    /// Persist `posted ∩ valid`. Returns the number of ids written.
    pub async fn save(
        &self,
        posted: &HashSet<String>,
        valid: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut kept: Vec<String> = posted.intersection(valid).cloned().collect();
        kept.sort();

        let dropped = posted.len() - kept.len();
        let count = kept.len();
        let state = HistoryState {
            posted_ids: kept,
            last_updated: now,
        };

        write_json_atomic(&self.path, &state)
            .await
            .map_err(|e| AppError::HistoryPersistence(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!("Saved history with {} ids ({} pruned)", count, dropped);
        Ok(count)
    }
}

/// Records whose id is not yet in `posted`, in input order.
pub fn filter_unnotified(articles: &[ArticleRecord], posted: &HashSet<String>) -> Vec<ArticleRecord> {
    articles
        .iter()
        .filter(|a| !a.id.is_empty() && !posted.contains(&a.id))
        .cloned()
        .collect()
}

pub fn mark_notified(posted: &mut HashSet<String>, articles: &[ArticleRecord]) {
    posted.extend(
        articles
            .iter()
            .filter(|a| !a.id.is_empty())
            .map(|a| a.id.clone()),
    );
}
