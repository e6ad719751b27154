//! HTML helper functions

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape XML special characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Strip invalid XML control characters (except tab, newline, carriage return)
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Truncate a string to at most `length` characters, omission included
pub fn truncate(s: &str, length: usize, omission: Option<&str>) -> String {
    let omission = omission.unwrap_or("...");

    if s.chars().count() <= length {
        s.to_string()
    } else {
        let truncated: String = s
            .chars()
            .take(length.saturating_sub(omission.chars().count()))
            .collect();
        format!("{}{}", truncated.trim_end(), omission)
    }
}

/// Count words in HTML content; each CJK character counts as a word
pub fn count_words(html: &str) -> usize {
    let text = strip_html(html);
    let mut count = 0;
    let mut in_word = false;

    for c in text.chars() {
        if c.is_alphanumeric() && !is_cjk(c) {
            if !in_word {
                in_word = true;
                count += 1;
            }
        } else if is_cjk(c) {
            count += 1;
            in_word = false;
        } else {
            in_word = false;
        }
    }

    count
}

/// Estimated reading time in whole minutes (at least one)
pub fn reading_minutes(html: &str) -> usize {
    count_words(html).div_ceil(200).max(1)
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_strip_invalid_xml_chars() {
        assert_eq!(strip_invalid_xml_chars("a\u{0001}b\tc"), "ab\tc");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello World", 8, None), "Hello...");
        assert_eq!(truncate("Hi", 10, None), "Hi");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("<p>Hello, <em>brave</em> new world</p>"), 4);
        assert_eq!(count_words("<p>你好 world</p>"), 3);
    }

    #[test]
    fn test_reading_minutes() {
        assert_eq!(reading_minutes(""), 1);
        let long = "word ".repeat(450);
        assert_eq!(reading_minutes(&long), 3);
    }
}
