use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch feed {url}: {message}")]
    FeedFetch { url: String, message: String },

    #[error("Notification error: {0}")]
    Notification(String),

    /// A category document could not be written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The posted-id ledger could not be written. Fatal for the run.
    #[error("History persistence error: {0}")]
    HistoryPersistence(String),

    /// The index document could not be written. Fatal for the run.
    #[error("Index persistence error: {0}")]
    IndexPersistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),
}

pub type Result<T> = std::result::Result<T, AppError>;
