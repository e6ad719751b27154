//! URL helper functions

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::config::SiteConfig;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

lazy_static! {
    static ref ROOT_RELATIVE: Regex = Regex::new(r#"(href|src)=(["'])/([^/])"#).unwrap();
}

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/portfolio/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Percent-encode one path segment
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Site-relative path of an article page, e.g. `/blog/hello-world/`
pub fn item_path(config: &SiteConfig, slug: &str) -> String {
    url_for(
        config,
        &format!(
            "{}/{}/",
            config.blog_dir.trim_matches('/'),
            encode_segment(slug)
        ),
    )
}

/// Site-relative path of a directory page such as the blog listing
pub fn section_path(config: &SiteConfig, dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        url_for(config, "")
    } else {
        url_for(config, &format!("{}/", dir))
    }
}

/// Rewrite root-relative `href`/`src` attributes to absolute URLs
pub fn absolutize_urls(html: &str, base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    ROOT_RELATIVE
        .replace_all(html, |caps: &regex::Captures| {
            format!("{}={}{}/{}", &caps[1], &caps[2], base_url, &caps[3])
        })
        .into_owned()
}
