mod category;
mod history;
mod index;

pub use category::{retain_recent, validate_category_id, CategoryStore};
pub use history::{filter_unnotified, mark_notified, HistoryLedger};
pub use index::IndexPublisher;

use std::path::Path;

use serde::Serialize;

/// Serialize `value` next to `path` and rename it into place, so readers only
/// ever see a complete document.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let body = serde_json::to_vec_pretty(value)?;

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, body).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}
