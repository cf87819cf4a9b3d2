use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::feed::{FeedFetcher, FeedSource};
use crate::models::{ArticleRecord, Category};
use crate::services::{DiscordNotifier, Notifier};
use crate::store::{
    filter_unnotified, mark_notified, retain_recent, validate_category_id, CategoryStore,
    HistoryLedger, IndexPublisher,
};

/// Windows and pacing for one run, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub retention: Duration,
    pub first_run_window: Duration,
    pub notify_delay: std::time::Duration,
}

impl TryFrom<&Config> for RunSettings {
    type Error = AppError;

    fn try_from(config: &Config) -> Result<Self> {
        Ok(Self {
            retention: window("retention_days", config.retention_days)?,
            first_run_window: window("first_run_filter_days", config.first_run_filter_days)?,
            notify_delay: std::time::Duration::from_millis(config.notify_delay_ms),
        })
    }
}

fn window(key: &str, days: i64) -> Result<Duration> {
    Duration::try_days(days)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| AppError::Config(format!("{} is out of range: {}", key, days)))
}

/// `now - window`, clamped to the earliest representable instant.
fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Everything a run mutates, threaded through each step.
pub struct RunContext<'a> {
    pub now: DateTime<Utc>,
    pub first_run: bool,
    pub posted_ids: HashSet<String>,
    pub categories: &'a [Category],
    pub report: RunReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub categories_ok: usize,
    pub categories_failed: usize,
    pub fetched: usize,
    pub notified: usize,
    pub history_size: usize,
    pub index_entries: usize,
    pub orphans_removed: usize,
}

pub struct App {
    settings: RunSettings,
    store: CategoryStore,
    history: HistoryLedger,
    publisher: IndexPublisher,
    feeds: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let feeds = Arc::new(FeedFetcher::new(&config.user_agent)?);
        let notifier = Arc::new(DiscordNotifier::new(&config.user_agent)?);
        Self::with_clients(config, feeds, notifier)
    }

    pub fn with_clients(
        config: &Config,
        feeds: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let store = CategoryStore::new(&config.data_dir);
        Ok(Self {
            settings: RunSettings::try_from(config)?,
            publisher: IndexPublisher::new(store.clone()),
            store,
            history: HistoryLedger::new(&config.history_path),
            feeds,
            notifier,
        })
    }

    /// One full pass over `categories`.
    ///
    /// Per-category failures are logged and counted. Failing to save history
    /// or publish the index aborts the run with an error.
    pub async fn run(&self, categories: &[Category], now: DateTime<Utc>) -> Result<RunReport> {
        let posted_ids = self.history.load().await;
        let mut ctx = RunContext {
            now,
            first_run: posted_ids.is_empty(),
            posted_ids,
            categories,
            report: RunReport::default(),
        };

        if ctx.first_run {
            tracing::info!(
                "First run: only articles from the last {} days are collected",
                self.settings.first_run_window.num_days()
            );
        }

        let categories = ctx.categories;
        for category in categories {
            tracing::info!("[{}] Processing category", category.name);
            match self.process_category(&mut ctx, category).await {
                Ok(()) => ctx.report.categories_ok += 1,
                Err(e) => {
                    tracing::error!("[{}] Category failed: {}", category.name, e);
                    ctx.report.categories_failed += 1;
                }
            }
        }

        self.finish(&mut ctx).await?;
        Ok(ctx.report)
    }

    async fn process_category(&self, ctx: &mut RunContext<'_>, category: &Category) -> Result<()> {
        if !category.is_described() {
            return Err(AppError::Validation(format!(
                "category for feed {} needs both id and name",
                category.feed_url
            )));
        }
        validate_category_id(&category.id)?;

        let mut articles = self.feeds.fetch_feed(&category.feed_url).await?;
        ctx.report.fetched += articles.len();
        tracing::info!("[{}] Fetched {} articles", category.name, articles.len());

        if ctx.first_run {
            let total = articles.len();
            articles = retain_recent(articles, cutoff(ctx.now, self.settings.first_run_window));
            tracing::info!(
                "[{}] First run: {} of {} articles are recent enough",
                category.name,
                articles.len(),
                total
            );
        }

        let fresh = filter_unnotified(&articles, &ctx.posted_ids);
        let notified = if fresh.is_empty() {
            tracing::info!("[{}] No new articles", category.name);
            Ok(())
        } else {
            tracing::info!("[{}] {} new articles", category.name, fresh.len());
            self.notify_fresh(ctx, category, &fresh).await
        };

        let persisted = self
            .store
            .merge(
                &category.id,
                &category.name,
                articles,
                &category.site_name,
                cutoff(ctx.now, self.settings.retention),
                ctx.now,
            )
            .await;

        match (notified, persisted) {
            (Err(notify_err), Err(persist_err)) => {
                tracing::error!("[{}] Notification failed: {}", category.name, notify_err);
                Err(persist_err)
            }
            (notified, persisted) => persisted.and(notified),
        }
    }

    /// Post each article in order, marking it as soon as its post succeeds.
    /// Stops at the first failure.
    async fn notify_fresh(
        &self,
        ctx: &mut RunContext<'_>,
        category: &Category,
        fresh: &[ArticleRecord],
    ) -> Result<()> {
        let Some(destination) = category.destination() else {
            tracing::warn!(
                "[{}] No notification destination configured; skipping notifications",
                category.name
            );
            return Ok(());
        };

        for (i, article) in fresh.iter().enumerate() {
            if i > 0 && !self.settings.notify_delay.is_zero() {
                tokio::time::sleep(self.settings.notify_delay).await;
            }

            self.notifier.notify(&destination, article, &category.name).await?;
            mark_notified(&mut ctx.posted_ids, std::slice::from_ref(article));
            ctx.report.notified += 1;
        }

        tracing::info!("[{}] Announced {} articles", category.name, fresh.len());
        Ok(())
    }

    async fn finish(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        let live = self.store.live_ids(ctx.categories).await;
        ctx.report.history_size = self.history.save(&ctx.posted_ids, &live, ctx.now).await?;

        let index = self.publisher.publish(ctx.categories, ctx.now).await?;
        ctx.report.index_entries = index.categories.len();

        ctx.report.orphans_removed = self.publisher.cleanup_orphans(ctx.categories).await;
        Ok(())
    }
}
