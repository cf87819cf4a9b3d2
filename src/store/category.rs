use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, Category, CategoryState};

use super::index::INDEX_FILE_NAME;
use super::write_json_atomic;

/// Owns the per-category article documents under one data directory.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    data_dir: PathBuf,
}

impl CategoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn data_file_path(&self, category_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", category_id))
    }

    /// Read a category's stored articles.
    ///
    /// A missing document is a first run; an unreadable or malformed one is
    /// logged and treated the same way. Never fails.
    pub async fn load(&self, category_id: &str) -> Vec<ArticleRecord> {
        let path = self.data_file_path(category_id);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No stored data for {} at {}", category_id, path.display());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}; starting empty", path.display(), e);
                return Vec::new();
            }
        };

        let doc: Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Invalid JSON in {}: {}; starting empty", path.display(), e);
                return Vec::new();
            }
        };

        let Some(items) = doc.get("articles").and_then(Value::as_array) else {
            tracing::warn!(
                "{} has no articles array; starting empty",
                path.display()
            );
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match serde_json::from_value::<ArticleRecord>(item.clone()) {
                Ok(record) if !record.id.is_empty() => Some(record),
                Ok(_) => {
                    tracing::warn!("Skipping stored article without id in {}", path.display());
                    None
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed article in {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Write the full category document with a fresh `lastUpdated`.
    pub async fn save(
        &self,
        category_id: &str,
        category_name: &str,
        articles: &[ArticleRecord],
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_category_id(category_id)?;
        if category_name.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "category {} has an empty name",
                category_id
            )));
        }

        let state = CategoryState {
            category_id: category_id.to_string(),
            category_name: category_name.to_string(),
            articles: articles.to_vec(),
            last_updated: now,
        };

        let path = self.data_file_path(category_id);
        write_json_atomic(&path, &state)
            .await
            .map_err(|e| AppError::Persistence(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Saved {} articles to {}", articles.len(), path.display());
        Ok(())
    }

    /// Merge `incoming` into the stored articles, drop everything older than
    /// `retention_cutoff`, and persist. Returns what was written.
    pub async fn merge(
        &self,
        category_id: &str,
        category_name: &str,
        incoming: Vec<ArticleRecord>,
        site_name_fallback: &str,
        retention_cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArticleRecord>> {
        let existing = self.load(category_id).await;
        let before = existing.len();

        let merged = merge_by_identity(existing, incoming, site_name_fallback);
        let merged_len = merged.len();
        let retained = retain_recent(merged, retention_cutoff);

        tracing::debug!(
            "{}: {} stored, {} after merge, {} within retention",
            category_id,
            before,
            merged_len,
            retained.len()
        );

        self.save(category_id, category_name, &retained, now).await?;
        Ok(retained)
    }

    /// Union of the ids currently stored across `categories`.
    pub async fn live_ids(&self, categories: &[Category]) -> HashSet<String> {
        let mut ids = HashSet::new();
        for category in categories {
            if category.id.trim().is_empty() {
                continue;
            }
            ids.extend(self.load(&category.id).await.into_iter().map(|a| a.id));
        }
        ids
    }
}

/// A category id must name its own file in the data directory.
pub fn validate_category_id(category_id: &str) -> Result<()> {
    if category_id.trim().is_empty() {
        return Err(AppError::Validation("category id is empty".to_string()));
    }
    if category_id.contains(['/', '\\']) || category_id.contains("..") {
        return Err(AppError::Validation(format!(
            "category id {:?} is not a plain file name",
            category_id
        )));
    }
    if format!("{}.json", category_id).eq_ignore_ascii_case(INDEX_FILE_NAME) {
        return Err(AppError::Validation(format!(
            "category id {:?} is reserved for the index",
            category_id
        )));
    }
    Ok(())
}

/// Upsert `incoming` over `existing` by id, then order newest first.
///
/// Incoming records replace stored ones on collision regardless of date. A
/// record keeps its own `siteName` and only takes `site_name_fallback` when it
/// has none. Ordering before the sort is stored order followed by first
/// appearance in `incoming`; the sort is stable, so equal dates keep it.
pub fn merge_by_identity(
    existing: Vec<ArticleRecord>,
    incoming: Vec<ArticleRecord>,
    site_name_fallback: &str,
) -> Vec<ArticleRecord> {
    let mut merged: Vec<ArticleRecord> = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in existing {
        upsert(&mut merged, &mut positions, record);
    }

    for mut record in incoming {
        if record.site_name.is_empty() {
            record.site_name = site_name_fallback.to_string();
        }
        upsert(&mut merged, &mut positions, record);
    }

    sort_newest_first(&mut merged);
    merged
}

fn upsert(
    merged: &mut Vec<ArticleRecord>,
    positions: &mut HashMap<String, usize>,
    record: ArticleRecord,
) {
    match positions.get(&record.id) {
        Some(&idx) => merged[idx] = record,
        None => {
            positions.insert(record.id.clone(), merged.len());
            merged.push(record);
        }
    }
}

/// Stable sort by `pubDate`, newest first; unparseable dates sink to the end.
pub fn sort_newest_first(records: &mut [ArticleRecord]) {
    records.sort_by_key(|r| Reverse(r.published_at()));
}

/// Keep records published at or after `cutoff`. Undated records are dropped.
pub fn retain_recent(records: Vec<ArticleRecord>, cutoff: DateTime<Utc>) -> Vec<ArticleRecord> {
    records
        .into_iter()
        .filter(|r| r.published_at().is_some_and(|dt| dt >= cutoff))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;
    use tokio_test::assert_err;

    use crate::models::format_timestamp;

    fn article(id: &str, pub_date: &str, site_name: &str) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            title: format!("Title {}", id),
            link: format!("https://example.com/{}", id),
            pub_date: pub_date.to_string(),
            content_snippet: String::new(),
            site_name: site_name.to_string(),
        }
    }

    fn ids(records: &[ArticleRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_incoming_wins_and_fallback_fills_site_name() {
        let existing = vec![article("a", "2024-01-01", "X")];
        let incoming = vec![article("a", "2024-01-02", "")];

        let merged = merge_by_identity(existing, incoming, "Y");

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pub_date, "2024-01-02");
        assert_eq!(merged[0].site_name, "Y");
    }

    #[test]
    fn test_merge_keeps_incoming_site_name() {
        let merged = merge_by_identity(Vec::new(), vec![article("a", "2024-01-02", "Own")], "Y");
        assert_eq!(merged[0].site_name, "Own");
    }

    #[test]
    fn test_merge_overwrites_even_with_older_incoming_date() {
        let existing = vec![article("a", "2024-02-01", "X")];
        let incoming = vec![article("a", "2024-01-01", "X")];

        let merged = merge_by_identity(existing, incoming, "");
        assert_eq!(merged[0].pub_date, "2024-01-01");
    }

    #[test]
    fn test_merge_last_incoming_duplicate_wins() {
        let mut first = article("a", "2024-01-01", "");
        first.title = "first".to_string();
        let mut second = article("a", "2024-01-01", "");
        second.title = "second".to_string();

        let merged = merge_by_identity(Vec::new(), vec![first, second], "");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "second");
    }

    #[test]
    fn test_merge_sorts_newest_first_with_stable_ties() {
        let existing = vec![
            article("old", "2024-01-01", ""),
            article("tie-1", "2024-01-05", ""),
        ];
        let incoming = vec![
            article("tie-2", "2024-01-05", ""),
            article("new", "2024-01-09", ""),
            article("undated", "not a date", ""),
        ];

        let merged = merge_by_identity(existing, incoming, "");
        assert_eq!(ids(&merged), vec!["new", "tie-1", "tie-2", "old", "undated"]);
    }

    #[test]
    fn test_retain_recent_drops_old_and_undated() {
        let cutoff = now() - Duration::days(90);
        let records = vec![
            article("fresh", &format_timestamp(now() - Duration::days(1)), ""),
            article("edge", &format_timestamp(cutoff), ""),
            article("stale", &format_timestamp(now() - Duration::days(91)), ""),
            article("undated", "", ""),
        ];

        let kept = retain_recent(records, cutoff);
        assert_eq!(ids(&kept), vec!["fresh", "edge"]);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        assert!(store.load("tech").await.is_empty());
    }

    #[tokio::test]
    async fn test_load_structurally_invalid_is_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tech.json"), r#"{"articles": "nope"}"#).unwrap();
        std::fs::write(dir.path().join("news.json"), "{not json").unwrap();

        let store = CategoryStore::new(dir.path());
        assert!(store.load("tech").await.is_empty());
        assert!(store.load("news").await.is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_bad_records_but_keeps_the_rest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tech.json"),
            r#"{"articles": [{"id": "a", "pubDate": "2024-01-01"}, 42, {"title": "no id"}]}"#,
        )
        .unwrap();

        let store = CategoryStore::new(dir.path());
        let loaded = store.load("tech").await;
        assert_eq!(ids(&loaded), vec!["a"]);
    }

    #[tokio::test]
    async fn test_save_writes_document_shape() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path().join("data"));

        store
            .save("tech", "Technology", &[article("a", "2024-02-01", "X")], now())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("data").join("tech.json")).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["categoryId"], "tech");
        assert_eq!(doc["categoryName"], "Technology");
        assert_eq!(doc["articles"][0]["id"], "a");
        assert!(doc["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn test_save_rejects_bad_identity() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());

        assert_err!(store.save("", "Name", &[], now()).await);
        assert_err!(store.save("tech", "", &[], now()).await);
        assert_err!(store.save("../escape", "Name", &[], now()).await);
    }

    #[tokio::test]
    async fn test_save_refuses_the_index_file_name() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());

        let err = store.save("index", "Index", &[], now()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_err!(store.save("INDEX", "Index", &[], now()).await);
        assert!(!dir.path().join(INDEX_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let store = CategoryStore::new(&blocker);
        let err = store.save("tech", "Tech", &[], now()).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_merge_applies_retention_before_persisting() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        let cutoff = now() - Duration::days(90);

        let incoming = vec![
            article("keep", &format_timestamp(now() - Duration::days(10)), ""),
            article("drop", &format_timestamp(now() - Duration::days(91)), ""),
        ];
        let written = store
            .merge("tech", "Tech", incoming, "Site", cutoff, now())
            .await
            .unwrap();

        assert_eq!(ids(&written), vec!["keep"]);
        assert_eq!(ids(&store.load("tech").await), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        let cutoff = now() - Duration::days(90);
        let batch = vec![
            article("a", &format_timestamp(now() - Duration::days(3)), ""),
            article("b", &format_timestamp(now() - Duration::days(3)), "B"),
            article("c", &format_timestamp(now() - Duration::days(1)), ""),
        ];

        let first = store
            .merge("tech", "Tech", batch.clone(), "Site", cutoff, now())
            .await
            .unwrap();
        let second = store
            .merge("tech", "Tech", batch, "Site", cutoff, now())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ids(&second), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_live_ids_unions_categories() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        store
            .save("tech", "Tech", &[article("a", "2024-02-01", "")], now())
            .await
            .unwrap();
        store
            .save("news", "News", &[article("b", "2024-02-01", "")], now())
            .await
            .unwrap();

        let categories: Vec<Category> = serde_json::from_str(
            r#"[
                {"id": "tech", "name": "Tech", "feedUrl": "https://example.com/t"},
                {"id": "news", "name": "News", "feedUrl": "https://example.com/n"},
                {"id": "empty", "name": "Empty", "feedUrl": "https://example.com/e"}
            ]"#,
        )
        .unwrap();

        let live = store.live_ids(&categories).await;
        assert_eq!(live, HashSet::from(["a".to_string(), "b".to_string()]));
    }
}
