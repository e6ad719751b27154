//! Table of contents

use lazy_static::lazy_static;
use regex::Regex;

use super::html::strip_html;

lazy_static! {
    static ref HEADING: Regex =
        Regex::new(r#"(?s)<h([1-6]) id="([^"]+)"[^>]*>(.*?)</h[1-6]>"#).unwrap();
}

/// Build a nested `<ol class="toc">` from the headings of rendered HTML.
///
/// Only headings that carry an `id` can be linked, which is every heading the
/// markdown renderer produces.
pub fn toc(content: &str, max_depth: usize) -> String {
    let mut html = r#"<ol class="toc">"#.to_string();
    let mut current_level = 0;

    for caps in HEADING.captures_iter(content) {
        let level: usize = caps[1].parse().unwrap_or(1);
        if level > max_depth {
            continue;
        }

        while current_level < level {
            html.push_str("<ol>");
            current_level += 1;
        }
        while current_level > level {
            html.push_str("</ol>");
            current_level -= 1;
        }

        html.push_str(&format!(
            r##"<li class="toc-item toc-level-{}"><a class="toc-link" href="#{}"><span class="toc-text">{}</span></a></li>"##,
            level,
            &caps[2],
            strip_html(&caps[3])
        ));
    }

    while current_level > 0 {
        html.push_str("</ol>");
        current_level -= 1;
    }

    html.push_str("</ol>");
    html
}

/// Whether a generated table of contents has any entries
pub fn has_entries(toc: &str) -> bool {
    toc.contains("toc-item")
}
