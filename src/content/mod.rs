//! Content module - articles, metadata headers, and markdown rendering

mod error;
mod frontmatter;
mod index;
mod item;
mod markdown;

pub use error::{ContentError, Result};
pub use frontmatter::{parse_date_string, FrontMatter};
pub use index::ContentIndex;
pub use item::ContentItem;
pub use markdown::MarkdownRenderer;
