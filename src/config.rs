use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{CategoriesFile, Category};

const LOCAL_CONFIG_FILE: &str = "feed-courier.toml";

/// Upper bound for both day windows (about a century).
const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where category documents and the index are written.
    pub data_dir: PathBuf,

    pub history_path: PathBuf,

    pub categories_path: PathBuf,

    pub retention_days: i64,

    /// How far back a first run (empty history) reaches.
    pub first_run_filter_days: i64,

    /// Pause between consecutive notifications to the same channel.
    pub notify_delay_ms: u64,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("docs/data"),
            history_path: PathBuf::from("post-history.json"),
            categories_path: PathBuf::from("categories.json"),
            retention_days: 90,
            first_run_filter_days: 30,
            notify_delay_ms: 1000,
            user_agent: "feed-courier/1.0".to_string(),
        }
    }
}

impl Config {
    /// Load settings from `explicit` (which must exist), else the first
    /// config file found in the usual places, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(AppError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::search_paths().into_iter().find(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(&path)?
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    fn validate(&self) -> Result<()> {
        for (key, days) in [
            ("retention_days", self.retention_days),
            ("first_run_filter_days", self.first_run_filter_days),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(AppError::Config(format!(
                    "{} must be between 1 and {}, got {}",
                    key, MAX_WINDOW_DAYS, days
                )));
            }
        }

        // Orphan cleanup deletes every unknown .json file in data_dir
        let history_dir = self.history_path.parent().unwrap_or(Path::new(""));
        if normalized(history_dir) == normalized(&self.data_dir) {
            return Err(AppError::Config(format!(
                "history_path {} must not be inside data_dir {}",
                self.history_path.display(),
                self.data_dir.display()
            )));
        }
        Ok(())
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("feed-courier").join("config.toml"));
        }
        paths
    }
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Read the ordered category list. Any problem here is fatal for the run.
pub fn load_categories(path: &Path) -> Result<Vec<Category>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("cannot read categories {}: {}", path.display(), e))
    })?;

    let file: CategoriesFile = serde_json::from_str(&content).map_err(|e| {
        AppError::Config(format!("invalid categories {}: {}", path.display(), e))
    })?;

    Ok(file.categories)
}
