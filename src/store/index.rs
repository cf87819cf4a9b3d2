use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Category, IndexEntry, IndexState};

use super::{validate_category_id, write_json_atomic, CategoryStore};

pub const INDEX_FILE_NAME: &str = "index.json";

/// Builds the consolidated index the frontend reads, and sweeps data files
/// left behind by categories that are no longer configured.
pub struct IndexPublisher {
    store: CategoryStore,
}

impl IndexPublisher {
    pub fn new(store: CategoryStore) -> Self {
        Self { store }
    }

    fn index_path(&self) -> PathBuf {
        self.store.data_dir().join(INDEX_FILE_NAME)
    }

    /// Rebuild the index from the current category documents and write it
    /// in one piece.
    pub async fn publish(&self, categories: &[Category], now: DateTime<Utc>) -> Result<IndexState> {
        let mut entries = Vec::with_capacity(categories.len());

        for category in categories {
            if !category.is_described() {
                tracing::warn!(
                    "Skipping category without id or name in index (feed {})",
                    category.feed_url
                );
                continue;
            }
            if let Err(e) = validate_category_id(&category.id) {
                tracing::warn!("Skipping category in index: {}", e);
                continue;
            }

            let articles = self.store.load(&category.id).await;
            entries.push(IndexEntry {
                id: category.id.clone(),
                name: category.name.clone(),
                article_count: articles.len(),
                data_file: category.data_file(),
            });
        }

        let index = IndexState {
            categories: entries,
            generated_at: now,
        };

        let path = self.index_path();
        write_json_atomic(&path, &index)
            .await
            .map_err(|e| AppError::IndexPersistence(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            "Published index with {} categories to {}",
            index.categories.len(),
            path.display()
        );
        Ok(index)
    }

    /// Delete `.json` files in the data directory that belong to no
    /// configured category. Returns how many were removed.
    pub async fn cleanup_orphans(&self, categories: &[Category]) -> usize {
        let mut allowed: HashSet<String> = categories.iter().map(Category::data_file).collect();
        allowed.insert(INDEX_FILE_NAME.to_string());

        let data_dir = self.store.data_dir();
        let mut entries = match tokio::fs::read_dir(data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::error!("Failed to list {}: {}", data_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to list {}: {}", data_dir.display(), e);
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".json") || allowed.contains(&name) {
                continue;
            }

            let path = entry.path();
            tracing::info!("Removing orphaned data file {}", path.display());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::error!("Failed to remove {}: {}", path.display(), e),
            }
        }

        removed
    }
}
