mod discord;

pub use discord::DiscordNotifier;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ArticleRecord;

/// Announces a single article to an external channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &str, article: &ArticleRecord, category_name: &str) -> Result<()>;
}
