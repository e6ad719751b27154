//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub content_dir: String,
    pub public_dir: String,
    pub static_dir: String,
    pub blog_dir: String,
    pub tag_dir: String,

    // Date format (Moment.js-style tokens)
    pub date_format: String,

    // Listing
    pub home_posts: usize,
    pub feed_limit: usize,

    #[serde(default)]
    pub highlight: HighlightConfig,

    #[serde(default = "default_menu")]
    pub menu: Vec<MenuItem>,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Folio".to_string(),
            subtitle: String::new(),
            description: String::new(),
            author: "John Doe".to_string(),
            language: "en".to_string(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            content_dir: "content/posts".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            blog_dir: "blog".to_string(),
            tag_dir: "tags".to_string(),

            date_format: "YYYY-MM-DD".to_string(),

            home_posts: 3,
            feed_limit: 20,

            highlight: HighlightConfig::default(),
            menu: default_menu(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Look up a free-form string setting (e.g. `github_username`)
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub line_number: bool,
    pub theme: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            line_number: false,
            theme: "base16-ocean.dark".to_string(),
        }
    }
}

/// Navigation entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub path: String,
}

fn default_menu() -> Vec<MenuItem> {
    [("Home", "/"), ("Blog", "/blog/"), ("Tags", "/tags/")]
        .into_iter()
        .map(|(name, path)| MenuItem {
            name: name.to_string(),
            path: path.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "Folio");
        assert_eq!(config.content_dir, "content/posts");
        assert_eq!(config.home_posts, 3);
        assert!(config.highlight.enable);
        assert_eq!(config.menu.len(), 3);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Portfolio
author: Test User
content_dir: articles
feed_limit: 5
highlight:
  enable: false
menu:
  - name: Writing
    path: /blog/
github_username: octocat
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Portfolio");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.content_dir, "articles");
        assert_eq!(config.feed_limit, 5);
        assert!(!config.highlight.enable);
        assert_eq!(config.highlight.theme, "base16-ocean.dark");
        assert_eq!(config.menu.len(), 1);
        assert_eq!(config.menu[0].name, "Writing");
        assert_eq!(config.extra_str("github_username"), Some("octocat"));
    }
}
