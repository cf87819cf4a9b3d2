use serde::{Deserialize, Serialize};

/// Top-level shape of the categories file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesFile {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub feed_url: String,

    /// Fills `siteName` on incoming records that carry none.
    #[serde(default)]
    pub site_name: String,

    /// Webhook URL to announce new articles to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_target: Option<String>,

    /// Name of an environment variable holding the webhook URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_env_key: Option<String>,
}

impl Category {
    /// File name of this category's document inside the data directory.
    pub fn data_file(&self) -> String {
        format!("{}.json", self.id)
    }

    /// Resolve where notifications go; a literal target wins over the env key.
    pub fn destination(&self) -> Option<String> {
        let literal = self
            .notify_target
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        literal.or_else(|| {
            let key = self.webhook_env_key.as_deref()?;
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }

    pub fn is_described(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories_file() {
        let json = r#"{
            "categories": [
                {
                    "id": "tech",
                    "name": "Technology",
                    "feedUrl": "https://example.com/tech.xml",
                    "siteName": "Example Tech",
                    "webhookEnvKey": "DISCORD_WEBHOOK_TECH"
                },
                {
                    "id": "news",
                    "name": "News",
                    "feedUrl": "https://example.com/news.xml",
                    "notifyTarget": "https://discord.com/api/webhooks/1/abc"
                }
            ]
        }"#;

        let file: CategoriesFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.categories.len(), 2);
        assert_eq!(file.categories[0].id, "tech");
        assert_eq!(
            file.categories[0].webhook_env_key.as_deref(),
            Some("DISCORD_WEBHOOK_TECH")
        );
        assert!(file.categories[1].site_name.is_empty());
        assert_eq!(file.categories[1].data_file(), "news.json");
    }

    #[test]
    fn test_destination_prefers_literal_target() {
        let category = Category {
            id: "tech".to_string(),
            name: "Tech".to_string(),
            feed_url: "https://example.com/rss".to_string(),
            site_name: String::new(),
            notify_target: Some("https://hooks.example.com/1".to_string()),
            webhook_env_key: Some("FEED_COURIER_TEST_UNSET_KEY".to_string()),
        };
        assert_eq!(
            category.destination().as_deref(),
            Some("https://hooks.example.com/1")
        );
    }

    #[test]
    fn test_destination_missing_env_is_none() {
        let category = Category {
            id: "tech".to_string(),
            name: "Tech".to_string(),
            feed_url: "https://example.com/rss".to_string(),
            site_name: String::new(),
            notify_target: Some("   ".to_string()),
            webhook_env_key: Some("FEED_COURIER_TEST_SURELY_UNSET".to_string()),
        };
        assert_eq!(category.destination(), None);
    }

    #[test]
    fn test_is_described() {
        let mut category = Category {
            id: "tech".to_string(),
            name: "Tech".to_string(),
            feed_url: String::new(),
            site_name: String::new(),
            notify_target: None,
            webhook_env_key: None,
        };
        assert!(category.is_described());
        category.name = " ".to_string();
        assert!(!category.is_described());
    }
}
