//! Content index - discovers and loads articles from the content directory

use chrono::Local;
use std::borrow::Cow;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::error::{ContentError, Result};
use super::{ContentItem, FrontMatter, MarkdownRenderer};
use crate::Site;

/// Read-only view over a directory of markdown articles.
///
/// Every call re-reads the directory, so edits show up without a restart and
/// concurrent callers never share mutable state.
pub struct ContentIndex {
    root: PathBuf,
    renderer: MarkdownRenderer,
}

/// A discovered content file
struct SourceFile {
    slug: String,
    path: PathBuf,
}

impl ContentIndex {
    /// Create an index over `root`
    pub fn new(root: impl Into<PathBuf>, renderer: MarkdownRenderer) -> Self {
        Self {
            root: root.into(),
            renderer,
        }
    }

    /// Create an index over the site's content directory
    pub fn from_site(site: &Site) -> Self {
        Self::new(
            site.content_dir.clone(),
            MarkdownRenderer::with_options(&site.config.highlight),
        )
    }

    /// The content directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All items in summary form, newest first.
    ///
    /// A missing content directory is an empty catalog, not an error.
    pub fn list_all(&self) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();

        for source in self.discover()? {
            match self.load(&source, false) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Skipping {:?}: {}", source.path, e),
            }
        }

        // Stable: equal dates keep discovery order
        items.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(items)
    }

    /// One item in full form, with its body rendered to HTML
    pub fn get_by_slug(&self, slug: &str) -> Result<ContentItem> {
        let source = self
            .discover()?
            .into_iter()
            .find(|s| s.slug == slug)
            .ok_or_else(|| ContentError::not_found(slug))?;

        self.load(&source, true)
    }

    /// Every valid slug, in listing order (for static route generation)
    pub fn slugs(&self) -> Result<Vec<String>> {
        Ok(self.list_all()?.into_iter().map(|item| item.slug).collect())
    }

    /// Tag usage counts, most used first
    pub fn tags(&self) -> Result<IndexMap<String, usize>> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for item in self.list_all()? {
            for tag in item.tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        counts.sort_by(|_, a, _, b| b.cmp(a));
        Ok(counts)
    }

    /// Enumerate content files in file-name order, one per slug
    fn discover(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            tracing::debug!("Content directory {:?} does not exist", self.root);
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ContentError::Walk {
                        path: self.root.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown_file(path) {
                continue;
            }

            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!("Skipping {:?}: file name is not valid UTF-8", path);
                continue;
            };
            if slug.starts_with('.') {
                continue;
            }
            if !seen.insert(slug.to_string()) {
                tracing::warn!("Skipping {:?}: slug `{}` is already taken", path, slug);
                continue;
            }

            sources.push(SourceFile {
                slug: slug.to_string(),
                path: path.to_path_buf(),
            });
        }

        Ok(sources)
    }

    /// Load a single file
    fn load(&self, source: &SourceFile, full: bool) -> Result<ContentItem> {
        let _span = tracing::debug_span!("content", slug = %source.slug).entered();

        let bytes = fs::read(&source.path).map_err(|e| ContentError::Read {
            path: source.path.clone(),
            source: e,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        if let Cow::Owned(_) = content {
            tracing::warn!("{:?} is not valid UTF-8, replacing invalid bytes", source.path);
        }
        let (fm, body) = FrontMatter::parse(&content);

        let mut item = ContentItem::new(&source.slug, fm.date.unwrap_or_else(Local::now));
        if let Some(title) = fm.title.filter(|t| !t.trim().is_empty()) {
            item.title = title;
        }
        item.tags = fm.tags;
        item.summary = fm.summary.unwrap_or_default();

        if full {
            item.rendered_body = Some(self.renderer.render(body));
            item.body = Some(body.to_string());
        }

        tracing::debug!("Loaded {:?}", source.path);
        Ok(item)
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_with(files: &[(&str, &str)]) -> (TempDir, ContentIndex) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let index = ContentIndex::new(dir.path(), MarkdownRenderer::new());
        (dir, index)
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = ContentIndex::new(dir.path().join("nope"), MarkdownRenderer::new());
        assert!(index.list_all().unwrap().is_empty());
        assert!(index.get_by_slug("anything").unwrap_err().is_not_found());
    }

    #[test]
    fn test_ignores_non_markdown_and_subdirectories() {
        let (dir, index) = index_with(&[
            ("post.md", "---\ntitle: Post\n---\nBody"),
            ("notes.txt", "not content"),
            (".draft.md", "hidden"),
        ]);
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/inner.md"), "inner").unwrap();

        let slugs = index.slugs().unwrap();
        assert_eq!(slugs, vec!["post"]);
    }

    #[test]
    fn test_duplicate_slug_keeps_first() {
        let (_dir, index) = index_with(&[
            ("same.markdown", "---\ntitle: Long extension\n---\n"),
            ("same.md", "---\ntitle: Short extension\n---\n"),
        ]);
        let items = index.list_all().unwrap();
        assert_eq!(items.len(), 1);
        // "same.markdown" sorts before "same.md"
        assert_eq!(items[0].title, "Long extension");
    }

    #[test]
    fn test_equal_dates_keep_discovery_order() {
        let (_dir, index) = index_with(&[
            ("b.md", "---\ndate: 2024-03-01\n---\n"),
            ("a.md", "---\ndate: 2024-03-01\n---\n"),
            ("c.md", "---\ndate: 2024-04-01\n---\n"),
        ]);
        assert_eq!(index.slugs().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_get_by_slug_renders_body() {
        let (_dir, index) = index_with(&[(
            "hello.md",
            "---\ntitle: Hello\nsummary: Greeting\n---\n\n## Section\n\nSome *text*.\n",
        )]);
        let item = index.get_by_slug("hello").unwrap();
        assert_eq!(item.title, "Hello");
        assert_eq!(item.summary, "Greeting");
        assert_eq!(item.body.as_deref(), Some("## Section\n\nSome *text*.\n"));
        let html = item.rendered_body.unwrap();
        assert!(html.contains(r#"<h2 id="section">Section</h2>"#));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_blank_title_falls_back_to_slug() {
        let (_dir, index) = index_with(&[("untitled-post.md", "---\ntitle: ''\n---\nBody")]);
        assert_eq!(index.list_all().unwrap()[0].title, "untitled-post");
    }

    #[test]
    fn test_tag_counts() {
        let (_dir, index) = index_with(&[
            ("a.md", "---\ndate: 2024-01-03\ntags: [rust, web]\n---\n"),
            ("b.md", "---\ndate: 2024-01-02\ntags: [web]\n---\n"),
            ("c.md", "---\ndate: 2024-01-01\ntags: [life, web, rust]\n---\n"),
        ]);
        let tags = index.tags().unwrap();
        let ordered: Vec<_> = tags.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        assert_eq!(ordered, vec![("web", 3), ("rust", 2), ("life", 1)]);
    }

    #[test]
    fn test_uppercase_extension() {
        let (_dir, index) = index_with(&[("Shout.MD", "Loud body")]);
        let item = index.get_by_slug("Shout").unwrap();
        assert_eq!(item.title, "Shout");
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let (dir, index) = index_with(&[("ok.md", "---\ndate: 2024-01-01\n---\nFine")]);
        fs::write(dir.path().join("latin.md"), b"caf\xe9 au lait\n").unwrap();

        let slugs = index.slugs().unwrap();
        assert_eq!(slugs.len(), 2);
        assert!(slugs.contains(&"latin".to_string()));

        let item = index.get_by_slug("latin").unwrap();
        assert_eq!(item.body.as_deref(), Some("caf\u{FFFD} au lait\n"));
        assert!(item.rendered_body.unwrap().contains("au lait"));
    }

    #[test]
    fn test_indented_code_without_header() {
        let (_dir, index) = index_with(&[("snippet.md", "    let x = 1;\n")]);
        let item = index.get_by_slug("snippet").unwrap();
        assert_eq!(item.body.as_deref(), Some("    let x = 1;\n"));
        assert!(item.rendered_body.unwrap().contains("<pre"));
    }

    #[test]
    fn test_brace_prose_stays_in_body() {
        let (_dir, index) = index_with(&[("draft.md", "{Draft} Here is my post.\n")]);
        let item = index.get_by_slug("draft").unwrap();
        assert_eq!(item.title, "draft");
        assert_eq!(item.body.as_deref(), Some("{Draft} Here is my post.\n"));
    }

    #[test]
    fn test_shared_across_threads() {
        let (_dir, index) = index_with(&[("a.md", "A"), ("b.md", "B")]);
        let index = std::sync::Arc::new(index);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let index = index.clone();
                std::thread::spawn(move || index.list_all().unwrap().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    }
}
