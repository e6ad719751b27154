//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;
use crate::helpers::html_escape;

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    highlight: bool,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options(&HighlightConfig::default())
    }

    /// Create with highlight settings from the site config
    pub fn with_options(config: &HighlightConfig) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: config.theme.clone(),
            highlight: config.enable,
            line_numbers: config.line_number,
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        // Metadata blocks are stripped before rendering, so no YAML option here
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES;
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<(Option<String>, String)> = None;
        let mut heading: Option<(usize, String)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let html = self.highlight_code(&code, lang.as_deref());
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::Start(Tag::Heading { .. }) => {
                    heading = Some((events.len(), String::new()));
                    events.push(event);
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((start, text)) = heading.take() {
                        assign_heading_id(&mut events[start], &text);
                    }
                    events.push(event);
                }
                Event::Text(ref text) | Event::Code(ref text) if heading.is_some() => {
                    if let Some((_, buf)) = heading.as_mut() {
                        buf.push_str(text);
                    }
                    events.push(event);
                }
                _ => events.push(event),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        if !self.highlight {
            return plain_code_block(code, lang);
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next());
        let Some(theme) = theme else {
            return plain_code_block(code, lang);
        };

        match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(highlighted) => {
                if self.line_numbers {
                    add_line_numbers(&highlighted, code.lines().count(), lang)
                } else {
                    format!(
                        r#"<figure class="highlight {}">{}</figure>"#,
                        html_escape(lang),
                        highlighted
                    )
                }
            }
            Err(e) => {
                tracing::debug!("Highlighting failed for {}: {}", lang, e);
                plain_code_block(code, lang)
            }
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Give a heading a slug id unless the author set one with `{#id}`
fn assign_heading_id(event: &mut Event<'_>, text: &str) {
    if let Event::Start(Tag::Heading { id, .. }) = event {
        if id.is_none() {
            let slug = slug::slugify(text);
            if !slug.is_empty() {
                *id = Some(CowStr::from(slug));
            }
        }
    }
}

fn plain_code_block(code: &str, lang: &str) -> String {
    format!(
        r#"<pre><code class="language-{}">{}</code></pre>"#,
        html_escape(lang),
        html_escape(code)
    )
}

/// Wrap highlighted code in a gutter table
fn add_line_numbers(highlighted: &str, line_count: usize, lang: &str) -> String {
    let gutter = (1..=line_count)
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        html_escape(lang),
        gutter,
        highlighted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("Intro paragraph.\n\n- one\n- two\n\n*emphasis* and [link](/about/)");
        assert!(html.contains("<p>Intro paragraph.</p>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains(r#"<a href="/about/">link</a>"#));
    }

    #[test]
    fn test_headings_get_ids() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\n## Custom {#mine}\n\n## Using `cargo`");
        assert!(html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(html.contains(r#"<h2 id="mine">"#));
        assert!(html.contains(r#"id="using-cargo""#));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains("highlight rust"));
        assert!(!html.contains("```"));
    }

    #[test]
    fn test_render_code_block_without_highlighting() {
        let renderer = MarkdownRenderer::with_options(&HighlightConfig {
            enable: false,
            ..Default::default()
        });
        let html = renderer.render("```html\n<b>x</b>\n```\n\n    indented <i>");
        assert!(html.contains(r#"<pre><code class="language-html">&lt;b&gt;x&lt;/b&gt;"#));
        assert!(html.contains(r#"<pre><code class="language-text">indented &lt;i&gt;"#));
    }

    #[test]
    fn test_line_numbers() {
        let renderer = MarkdownRenderer::with_options(&HighlightConfig {
            line_number: true,
            ..Default::default()
        });
        let html = renderer.render("```js\nlet a = 1;\nlet b = 2;\n```");
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(MarkdownRenderer::new().render(""), "");
    }
}
