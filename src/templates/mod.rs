//! Built-in site templates using the Tera template engine
//!
//! Templates are embedded in the binary. Every page view the site offers
//! (home, blog listing, article, tags, not-found) is rendered here so the
//! static build and the dev server produce identical HTML.

use anyhow::Result;
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::{MenuItem, SiteConfig};
use crate::content::ContentItem;
use crate::helpers::{self, format_date};

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
    site: SiteConfig,
    config: ConfigData,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        // Page bodies are already HTML; templates escape text fields explicitly
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("folio/layout.html")),
            ("home.html", include_str!("folio/home.html")),
            ("list.html", include_str!("folio/list.html")),
            ("article.html", include_str!("folio/article.html")),
            ("tags.html", include_str!("folio/tags.html")),
            ("not_found.html", include_str!("folio/not_found.html")),
            ("partials/card.html", include_str!("folio/partials/card.html")),
            ("partials/tags.html", include_str!("folio/partials/tags.html")),
        ])?;

        let date_format = config.date_format.clone();
        tera.register_filter(
            "date_format",
            move |value: &tera::Value, args: &HashMap<String, tera::Value>| {
                date_format_filter(value, args, &date_format)
            },
        );
        tera.register_filter("strip_html", strip_html_filter);

        Ok(Self {
            tera,
            site: config.clone(),
            config: ConfigData::from_config(config),
        })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    /// Home page: site intro plus the most recent items
    pub fn render_home(&self, items: &[ContentItem]) -> Result<String> {
        let config = &self.site;
        let recent: Vec<ItemData> = items
            .iter()
            .take(config.home_posts)
            .map(|i| ItemData::from_item(config, i))
            .collect();

        let mut context = self.base_context(&self.config.root);
        context.insert("items", &recent);
        context.insert("has_more", &(items.len() > recent.len()));
        self.render("home.html", &context)
    }

    /// Blog listing page
    pub fn render_list(&self, items: &[ContentItem]) -> Result<String> {
        let items: Vec<ItemData> = items
            .iter()
            .map(|i| ItemData::from_item(&self.site, i))
            .collect();

        let mut context = self.base_context(&self.config.blog_path);
        context.insert("items", &items);
        self.render("list.html", &context)
    }

    /// Single article page; `listing` supplies the newer/older links
    pub fn render_article(&self, item: &ContentItem, listing: &[ContentItem]) -> Result<String> {
        let config = &self.site;
        let content = item.rendered_body.as_deref().unwrap_or_default();
        let toc = helpers::toc(content, 3);

        let mut context = self.base_context(&helpers::item_path(config, &item.slug));
        context.insert("article", &ItemData::from_item(config, item));
        context.insert("content", content);
        context.insert("has_toc", &helpers::has_entries(&toc));
        context.insert("toc", &toc);
        context.insert(
            "newer",
            &item.newer(listing).map(|i| ItemData::from_item(config, i)),
        );
        context.insert(
            "older",
            &item.older(listing).map(|i| ItemData::from_item(config, i)),
        );
        context.insert("reading_minutes", &helpers::reading_minutes(content));
        self.render("article.html", &context)
    }

    /// Tag index page
    pub fn render_tags(&self, items: &[ContentItem]) -> Result<String> {
        let tags = TagData::collect(&self.site, items);

        let mut context = self.base_context(&self.config.tags_path);
        context.insert("tags", &tags);
        self.render("tags.html", &context)
    }

    /// Not-found page for a requested path
    pub fn render_not_found(&self, requested: &str) -> Result<String> {
        let mut context = self.base_context(requested);
        context.insert("requested", requested);
        self.render("not_found.html", &context)
    }

    fn base_context(&self, current_path: &str) -> Context {
        let mut context = Context::new();
        context.insert("config", &self.config);
        context.insert("current_path", current_path);
        context.insert("current_year", &chrono::Local::now().year());
        context.insert("generator_version", env!("CARGO_PKG_VERSION"));
        context
    }
}

/// Tera filter: format an RFC 3339 date string with a Moment-style format
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
    default_format: &str,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => default_format.to_string(),
    };

    match chrono::DateTime::parse_from_rfc3339(&s) {
        Ok(date) => Ok(tera::Value::String(format_date(&date, &format))),
        Err(_) => Ok(tera::Value::String(s)),
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(helpers::strip_html(&s)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub blog_path: String,
    pub tags_path: String,
    pub feed_path: String,
    pub menu: Vec<MenuItem>,
    pub github_username: String,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: helpers::url_for(config, ""),
            blog_path: helpers::section_path(config, &config.blog_dir),
            tags_path: helpers::section_path(config, &config.tag_dir),
            feed_path: helpers::url_for(config, "atom.xml"),
            menu: config
                .menu
                .iter()
                .map(|m| MenuItem {
                    name: m.name.clone(),
                    path: helpers::url_for(config, &m.path),
                })
                .collect(),
            github_username: config.extra_str("github_username").unwrap_or("").to_string(),
        }
    }
}

/// An item as the templates see it
#[derive(Debug, Clone, Serialize)]
pub struct ItemData {
    pub slug: String,
    pub title: String,
    /// RFC 3339, formatted by the `date_format` filter
    pub date: String,
    pub path: String,
    pub tags: Vec<String>,
    pub summary: String,
}

impl ItemData {
    pub fn from_item(config: &SiteConfig, item: &ContentItem) -> Self {
        Self {
            slug: item.slug.clone(),
            title: item.title.clone(),
            date: helpers::date_xml(&item.date),
            path: helpers::item_path(config, &item.slug),
            tags: item.tags.clone(),
            summary: item.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub anchor: String,
    pub count: usize,
    pub items: Vec<ItemData>,
}

impl TagData {
    /// Group a date-ordered listing by tag, most used tags first
    pub fn collect(config: &SiteConfig, items: &[ContentItem]) -> Vec<TagData> {
        let mut tags: indexmap::IndexMap<&str, Vec<ItemData>> = indexmap::IndexMap::new();
        for item in items {
            for tag in &item.tags {
                tags.entry(tag.as_str())
                    .or_default()
                    .push(ItemData::from_item(config, item));
            }
        }
        tags.sort_by(|_, a, _, b| b.len().cmp(&a.len()));

        tags.into_iter()
            .map(|(name, items)| TagData {
                name: name.to_string(),
                anchor: slug::slugify(name),
                count: items.len(),
                items,
            })
            .collect()
    }
}
