//! Generator module - writes the static site using the built-in Tera templates

use anyhow::{Context as _, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{ContentIndex, ContentItem};
use crate::helpers::{self, absolutize_urls, escape_xml, strip_invalid_xml_chars};
use crate::templates::TemplateRenderer;
use crate::Site;

/// Static site generator
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
}

/// What a build produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub items: usize,
    pub pages: usize,
    pub assets: usize,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        Ok(Self {
            site: site.clone(),
            renderer: TemplateRenderer::new(&site.config)?,
        })
    }

    /// Generate the entire site from the index
    pub fn generate(&self, index: &ContentIndex) -> Result<BuildReport> {
        let listing = index.list_all()?;
        let full = load_full(index, &listing)?;
        self.write_site(&listing, &full)
    }

    /// Write every page for an already loaded listing and its full items
    pub fn write_site(&self, listing: &[ContentItem], full: &[ContentItem]) -> Result<BuildReport> {
        let public_dir = &self.site.public_dir;
        fs::create_dir_all(public_dir)
            .with_context(|| format!("Failed to create {:?}", public_dir))?;

        let mut report = BuildReport {
            items: listing.len(),
            ..Default::default()
        };

        report.assets = self.copy_static_assets()?;

        let config = &self.site.config;

        self.write_page("index.html", &self.renderer.render_home(listing)?)?;
        self.write_page(
            &format!("{}/index.html", config.blog_dir.trim_matches('/')),
            &self.renderer.render_list(listing)?,
        )?;
        self.write_page(
            &format!("{}/index.html", config.tag_dir.trim_matches('/')),
            &self.renderer.render_tags(listing)?,
        )?;
        self.write_page("404.html", &self.renderer.render_not_found("/404.html")?)?;
        report.pages += 4;

        let removed = self.prune_stale_articles(full)?;
        if removed > 0 {
            tracing::info!("Removed {} stale article pages", removed);
        }

        for item in full {
            let html = self.renderer.render_article(item, listing)?;
            let path = format!(
                "{}/{}/index.html",
                config.blog_dir.trim_matches('/'),
                item.slug
            );
            self.write_page(&path, &html)?;
            report.pages += 1;
        }

        fs::write(public_dir.join("atom.xml"), render_atom_feed(config, full))?;
        tracing::info!("Generated atom.xml");

        fs::write(
            public_dir.join("search.json"),
            render_search_index(config, full)?,
        )?;
        tracing::info!("Generated search.json");

        Ok(report)
    }

    fn write_page(&self, relative: &str, html: &str) -> Result<()> {
        let output_path = self.site.public_dir.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
        }
        fs::write(&output_path, html)
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", output_path, e))?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }

    /// Delete article pages from earlier builds whose source is gone.
    ///
    /// Only directories holding a generated `index.html` are touched.
    fn prune_stale_articles(&self, full: &[ContentItem]) -> Result<usize> {
        let blog_dir = self.site.config.blog_dir.trim_matches('/');
        if blog_dir.is_empty() {
            return Ok(0);
        }
        let output = self.site.public_dir.join(blog_dir);
        if !output.is_dir() {
            return Ok(0);
        }

        let live: HashSet<&str> = full.iter().map(|item| item.slug.as_str()).collect();
        let mut removed = 0;
        for entry in fs::read_dir(&output)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_dir() || live.contains(name) || !path.join("index.html").is_file() {
                continue;
            }
            fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to remove stale page {:?}", path))?;
            tracing::debug!("Removed: {:?}", path);
            removed += 1;
        }

        Ok(removed)
    }

    /// Copy the static directory (images, css) into the public directory
    fn copy_static_assets(&self) -> Result<usize> {
        copy_dir(&self.site.static_dir, &self.site.public_dir)
    }
}

/// Full form of every listed item, in listing order
pub fn load_full(index: &ContentIndex, listing: &[ContentItem]) -> Result<Vec<ContentItem>> {
    let mut full = Vec::with_capacity(listing.len());
    for item in listing {
        match index.get_by_slug(&item.slug) {
            Ok(item) => full.push(item),
            // Removed since the listing was taken
            Err(e) if e.is_not_found() => tracing::warn!("Skipping {}: {}", item.slug, e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(full)
}

fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(from)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = path.strip_prefix(from)?;
        let dest = to.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &dest)?;
        copied += 1;
    }

    Ok(copied)
}

/// Atom feed of the most recent `feed_limit` items.
///
/// Items must be in full form; links inside the bodies are made absolute.
pub fn render_atom_feed(config: &SiteConfig, items: &[ContentItem]) -> String {
    let base_url = config.url.trim_end_matches('/');
    let updated = items
        .first()
        .map(|i| helpers::date_xml(&i.date))
        .unwrap_or_else(|| helpers::date_xml(&chrono::Local::now()));

    let mut feed = String::new();
    feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
    feed.push('\n');
    feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
    feed.push('\n');
    feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
    if !config.subtitle.is_empty() {
        feed.push_str(&format!(
            "  <subtitle>{}</subtitle>\n",
            escape_xml(&config.subtitle)
        ));
    }
    feed.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\"/>\n",
        helpers::full_url_for(config, "atom.xml")
    ));
    feed.push_str(&format!(
        "  <link href=\"{}\"/>\n",
        helpers::full_url_for(config, "")
    ));
    feed.push_str(&format!("  <updated>{}</updated>\n", updated));
    feed.push_str(&format!(
        "  <id>{}</id>\n",
        helpers::full_url_for(config, "")
    ));
    feed.push_str(&format!(
        "  <author><name>{}</name></author>\n",
        escape_xml(&config.author)
    ));

    for item in items.iter().take(config.feed_limit) {
        let link = format!("{}{}", base_url, helpers::item_path(config, &item.slug));

        feed.push_str("  <entry>\n");
        feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&item.title)));
        feed.push_str(&format!("    <link href=\"{}\"/>\n", link));
        feed.push_str(&format!("    <id>{}</id>\n", link));
        feed.push_str(&format!(
            "    <published>{}</published>\n",
            helpers::date_xml(&item.date)
        ));
        feed.push_str(&format!(
            "    <updated>{}</updated>\n",
            helpers::date_xml(&item.date)
        ));
        if !item.summary.is_empty() {
            feed.push_str(&format!(
                "    <summary>{}</summary>\n",
                escape_xml(&item.summary)
            ));
        }
        for tag in &item.tags {
            feed.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(tag)));
        }
        if let Some(html) = &item.rendered_body {
            let content = strip_invalid_xml_chars(&absolutize_urls(html, base_url));
            // A literal "]]>" would end the CDATA section early
            let content = content.replace("]]>", "]]]]><![CDATA[>");
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content
            ));
        }
        feed.push_str("  </entry>\n");
    }

    feed.push_str("</feed>\n");
    feed
}

/// Client-side search index: one entry per item with its plain text
pub fn render_search_index(config: &SiteConfig, items: &[ContentItem]) -> Result<String> {
    let entries: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            let text = item
                .rendered_body
                .as_deref()
                .map(helpers::strip_html)
                .unwrap_or_default();
            serde_json::json!({
                "title": item.title,
                "url": helpers::item_path(config, &item.slug),
                "date": helpers::format_date(&item.date, &config.date_format),
                "tags": item.tags,
                "summary": item.summary,
                "content": text.split_whitespace().collect::<Vec<_>>().join(" "),
            })
        })
        .collect();

    Ok(serde_json::to_string_pretty(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MarkdownRenderer;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn full_item(slug: &str, day: u32, html: &str) -> ContentItem {
        let mut item = ContentItem::new(slug, Local.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap());
        item.title = format!("Post <{}>", slug);
        item.tags = vec!["rust".to_string()];
        item.body = Some(String::new());
        item.rendered_body = Some(html.to_string());
        item
    }

    fn feed_config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.url = "https://example.com".to_string();
        config.title = "Jane & Co".to_string();
        config
    }

    #[test]
    fn test_atom_feed() {
        let config = feed_config();
        let items = vec![full_item("b", 2, r#"<a href="/blog/a/">prev</a>"#)];

        let feed = render_atom_feed(&config, &items);
        assert!(feed.contains("<title>Jane &amp; Co</title>"));
        assert!(feed.contains("<title>Post &lt;b&gt;</title>"));
        assert!(feed.contains(r#"<link href="https://example.com/blog/b/"/>"#));
        assert!(feed.contains(r#"href="https://example.com/blog/a/""#));
        assert!(feed.contains(r#"<category term="rust"/>"#));
        assert!(feed.ends_with("</feed>\n"));
    }

    #[test]
    fn test_atom_feed_respects_limit() {
        let mut config = feed_config();
        config.feed_limit = 1;
        let items = vec![full_item("b", 2, "<p>b</p>"), full_item("a", 1, "<p>a</p>")];

        let feed = render_atom_feed(&config, &items);
        assert_eq!(feed.matches("<entry>").count(), 1);
        assert!(feed.contains("/blog/b/"));
    }

    #[test]
    fn test_search_index() {
        let config = SiteConfig::default();
        let items = vec![full_item("hello", 3, "<h2>Intro</h2>\n<p>Some   text</p>")];

        let json: serde_json::Value =
            serde_json::from_str(&render_search_index(&config, &items).unwrap()).unwrap();
        assert_eq!(json[0]["url"], "/blog/hello/");
        assert_eq!(json[0]["date"], "2024-06-03");
        assert_eq!(json[0]["content"], "Intro Some text");
        assert_eq!(json[0]["tags"][0], "rust");
    }

    #[test]
    fn test_generate_writes_every_route() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(&site.content_dir).unwrap();
        fs::write(
            site.content_dir.join("first-post.md"),
            "---\ntitle: First\ndate: 2024-01-01\ntags: [rust]\n---\n\n# Hello\n",
        )
        .unwrap();
        fs::write(
            site.content_dir.join("second.md"),
            "---\ntitle: Second\ndate: 2024-02-01\n---\nBody\n",
        )
        .unwrap();
        fs::create_dir_all(site.static_dir.join("img")).unwrap();
        fs::write(site.static_dir.join("img/me.png"), b"png").unwrap();

        let index = ContentIndex::new(&site.content_dir, MarkdownRenderer::new());
        let report = Generator::new(&site).unwrap().generate(&index).unwrap();

        assert_eq!(report.items, 2);
        assert_eq!(report.pages, 6);
        assert_eq!(report.assets, 1);

        let public = &site.public_dir;
        for path in [
            "index.html",
            "blog/index.html",
            "blog/first-post/index.html",
            "blog/second/index.html",
            "tags/index.html",
            "404.html",
            "atom.xml",
            "search.json",
            "img/me.png",
        ] {
            assert!(public.join(path).is_file(), "missing {}", path);
        }

        let article = fs::read_to_string(public.join("blog/first-post/index.html")).unwrap();
        assert!(article.contains(r#"<h1 id="hello">Hello</h1>"#));
        assert!(article.contains(r#"href="/blog/second/""#));
    }

    #[test]
    fn test_generate_empty_site() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path().to_path_buf(), SiteConfig::default());
        let index = ContentIndex::new(&site.content_dir, MarkdownRenderer::new());

        let report = Generator::new(&site).unwrap().generate(&index).unwrap();
        assert_eq!(report.items, 0);
        assert!(site.public_dir.join("index.html").is_file());
    }

    #[test]
    fn test_rebuild_removes_deleted_articles() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(&site.content_dir).unwrap();
        fs::write(site.content_dir.join("keep.md"), "---\ndate: 2024-01-01\n---\nKeep").unwrap();
        fs::write(site.content_dir.join("gone.md"), "---\ndate: 2024-02-01\n---\nGone").unwrap();

        let index = ContentIndex::new(&site.content_dir, MarkdownRenderer::new());
        let generator = Generator::new(&site).unwrap();
        generator.generate(&index).unwrap();
        let blog = site.public_dir.join("blog");
        assert!(blog.join("gone/index.html").is_file());

        fs::remove_file(site.content_dir.join("gone.md")).unwrap();
        let report = generator.generate(&index).unwrap();

        assert_eq!(report.items, 1);
        assert!(!blog.join("gone").exists());
        assert!(blog.join("keep/index.html").is_file());
        assert!(blog.join("index.html").is_file());
        let search = fs::read_to_string(site.public_dir.join("search.json")).unwrap();
        assert!(!search.contains("/blog/gone/"));
    }

    #[test]
    fn test_rebuild_leaves_foreign_directories() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path().to_path_buf(), SiteConfig::default());
        let assets = site.public_dir.join("blog/images");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("cover.png"), b"png").unwrap();

        let index = ContentIndex::new(&site.content_dir, MarkdownRenderer::new());
        Generator::new(&site).unwrap().generate(&index).unwrap();
        assert!(assets.join("cover.png").is_file());
    }
}
