//! Content item model

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One article, backed by one source file.
///
/// Items coming out of [`ContentIndex::list_all`](super::ContentIndex::list_all)
/// are in summary form: `body` and `rendered_body` are `None`. Items from
/// [`ContentIndex::get_by_slug`](super::ContentIndex::get_by_slug) always carry both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// File name without extension; unique across the content directory
    pub slug: String,

    /// Display title, defaults to the slug
    pub title: String,

    /// Publication date, defaults to load time
    pub date: DateTime<Local>,

    pub tags: Vec<String>,

    /// Short description, empty when absent
    pub summary: String,

    /// Raw markdown body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Body converted to HTML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_body: Option<String>,
}

impl ContentItem {
    /// Create a summary-form item with default metadata
    pub fn new(slug: impl Into<String>, date: DateTime<Local>) -> Self {
        let slug = slug.into();
        Self {
            title: slug.clone(),
            slug,
            date,
            tags: Vec::new(),
            summary: String::new(),
            body: None,
            rendered_body: None,
        }
    }

    /// Whether this is the full (single-item) form
    pub fn is_full(&self) -> bool {
        self.body.is_some() && self.rendered_body.is_some()
    }

    /// Drop the body, leaving the summary form
    pub fn into_summary(self) -> Self {
        Self {
            body: None,
            rendered_body: None,
            ..self
        }
    }

    /// The item published just before this one in a date-descending list
    pub fn older<'a>(&self, items: &'a [ContentItem]) -> Option<&'a ContentItem> {
        let pos = items.iter().position(|i| i.slug == self.slug)?;
        items.get(pos + 1)
    }

    /// The item published just after this one in a date-descending list
    pub fn newer<'a>(&self, items: &'a [ContentItem]) -> Option<&'a ContentItem> {
        let pos = items.iter().position(|i| i.slug == self.slug)?;
        pos.checked_sub(1).and_then(|p| items.get(p))
    }
}
