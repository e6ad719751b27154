//! Content errors

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `ContentError`.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors raised while reading content.
#[derive(Error, Debug)]
pub enum ContentError {
    /// No content file has the requested slug.
    #[error("content not found: {slug}")]
    NotFound { slug: String },

    /// The content directory does not exist.
    #[error("content directory unavailable: {path}")]
    SourceUnavailable { path: PathBuf },

    /// A content file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory enumeration failed.
    #[error("failed to enumerate {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The file watcher could not be started.
    #[error("failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },
}

impl ContentError {
    pub fn not_found(slug: impl Into<String>) -> Self {
        Self::NotFound { slug: slug.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
