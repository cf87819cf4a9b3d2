mod article;
mod category;
mod documents;

pub use article::{format_timestamp, ArticleRecord};
pub use category::{CategoriesFile, Category};
pub use documents::{CategoryState, HistoryState, IndexEntry, IndexState};
