//! Helper functions for templates, the feed, and the markdown renderer

mod date;
mod html;
mod toc;
mod url;

pub use date::*;
pub use html::*;
pub use toc::*;
pub use url::*;
