//! folio: content engine for a personal portfolio and blog site
//!
//! Articles live as markdown files with an optional metadata header. The
//! [`content::ContentIndex`] lists and loads them; the generator and the dev
//! server turn them into pages using the embedded Tera templates.

pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;
pub mod watch;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// The site handle, created once at startup and passed to every consumer
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown content directory
    pub content_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets directory
    pub static_dir: PathBuf,
}

impl Site {
    /// Resolve the site rooted at `base_dir`, reading `_config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            tracing::debug!("Loading config from {:?}", config_path);
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Build a site from an already resolved configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let content_dir = base_dir.join(&config.content_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            content_dir,
            public_dir,
            static_dir,
        }
    }

    /// Open the content index for this site
    pub fn content_index(&self) -> content::ContentIndex {
        content::ContentIndex::from_site(self)
    }

    /// Generate the static site
    pub fn build(&self) -> Result<()> {
        commands::build::run(self)
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_defaults_without_config() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Folio");
        assert_eq!(site.content_dir, dir.path().join("content/posts"));
        assert_eq!(site.public_dir, dir.path().join("public"));
    }

    #[test]
    fn test_site_reads_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("_config.yml"),
            "title: Jane Doe\ncontent_dir: writing\npublic_dir: dist\n",
        )
        .unwrap();

        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Jane Doe");
        assert_eq!(site.content_dir, dir.path().join("writing"));
        assert_eq!(site.public_dir, dir.path().join("dist"));
        assert_eq!(site.content_index().root(), dir.path().join("writing"));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_config.yml"), "home_posts: [not, a, number]\n").unwrap();
        assert!(Site::new(dir.path()).is_err());
    }
}
