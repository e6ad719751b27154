//! Metadata header parsing
//!
//! A content file may start with a YAML block delimited by `---` lines, or a
//! JSON object (either bare `{...}` or wrapped in `;;;`). Recognized keys are
//! `title`, `date`, `tags` and `summary`. Each key is extracted on its own, so a
//! bad value only loses that one field.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// Parsed metadata header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<DateTime<Local>>,
    pub tags: Vec<String>,
    pub summary: Option<String>,

    /// Keys this crate does not interpret
    pub extra: HashMap<String, Value>,
}

impl FrontMatter {
    /// Split a content file into its metadata header and body.
    ///
    /// Never fails: a missing or unusable header yields default metadata.
    pub fn parse(content: &str) -> (Self, &str) {
        // Detect on the trimmed view; a file without a header keeps its
        // leading whitespace (indented code blocks depend on it)
        let trimmed = content.trim_start();

        let parsed = if trimmed.starts_with("---") {
            Self::parse_yaml(trimmed)
        } else if trimmed.starts_with(";;;") || trimmed.starts_with('{') {
            Self::parse_json(trimmed)
        } else {
            None
        };

        parsed.unwrap_or_else(|| (FrontMatter::default(), content))
    }

    fn parse_yaml(content: &str) -> Option<(Self, &str)> {
        let (block, body) = split_block(content, "---")?;

        if block.trim().is_empty() {
            return Some((FrontMatter::default(), body));
        }

        // A `---` pair around prose is a pair of thematic breaks, not a header
        if !looks_like_yaml(block) {
            return None;
        }

        let fm = match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(mapping)) => Self::from_mapping(mapping),
            Ok(Value::Null) => FrontMatter::default(),
            Ok(_) => {
                tracing::warn!("Metadata header is not a key/value block, ignoring it");
                FrontMatter::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse YAML metadata header: {}", e);
                FrontMatter::default()
            }
        };
        Some((fm, body))
    }

    fn parse_json(content: &str) -> Option<(Self, &str)> {
        let delimited = content.starts_with(";;;");
        let (json, body) = if delimited {
            split_block(content, ";;;")?
        } else {
            let end = json_object_end(content)?;
            (
                &content[..end],
                content[end..].trim_start_matches(['\n', '\r']),
            )
        };

        let value = serde_json::from_str::<serde_json::Value>(json)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_yaml::to_value(v).map_err(|e| e.to_string()));

        match value {
            Ok(Value::Mapping(mapping)) => Some((Self::from_mapping(mapping), body)),
            // Without `;;;` delimiters, braces that are not a JSON object are body text
            _ if !delimited => None,
            Ok(_) => {
                tracing::warn!("JSON metadata header is not an object, ignoring it");
                Some((FrontMatter::default(), body))
            }
            Err(e) => {
                tracing::warn!("Failed to parse JSON metadata header: {}", e);
                Some((FrontMatter::default(), body))
            }
        }
    }

    /// Pull the recognized keys out of a parsed block
    fn from_mapping(mapping: Mapping) -> Self {
        let mut fm = FrontMatter::default();

        for (key, value) in mapping {
            let Some(key) = key.as_str().map(str::to_string) else {
                tracing::warn!("Skipping non-string metadata key: {:?}", key);
                continue;
            };

            match key.as_str() {
                "title" => {
                    fm.title = scalar_to_string(&value);
                    if fm.title.is_none() && !value.is_null() {
                        tracing::warn!("Malformed `title` value {:?}, using default", value);
                    }
                }
                "date" => {
                    fm.date = scalar_to_string(&value).and_then(|s| parse_date_string(&s));
                    if fm.date.is_none() && !value.is_null() {
                        tracing::warn!("Malformed `date` value {:?}, using default", value);
                    }
                }
                "tags" => match parse_tags(&value) {
                    Some(tags) => fm.tags = tags,
                    None => tracing::warn!("Malformed `tags` value {:?}, using default", value),
                },
                "summary" => {
                    fm.summary = scalar_to_string(&value);
                    if fm.summary.is_none() && !value.is_null() {
                        tracing::warn!("Malformed `summary` value {:?}, using default", value);
                    }
                }
                _ => {
                    fm.extra.insert(key, value);
                }
            }
        }

        fm
    }
}

/// Find a block opened by a `delim` line and closed by the next `delim` line.
/// Returns the block text and whatever follows the closing line.
fn split_block<'a>(content: &'a str, delim: &str) -> Option<(&'a str, &'a str)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != delim {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == delim {
            let block = &content[start..offset];
            let rest = &content[offset + line.len()..];
            return Some((block, rest.trim_start_matches(['\n', '\r'])));
        }
        offset += line.len();
    }

    None
}

/// Byte offset just past the closing brace of a leading JSON object
fn json_object_end(content: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// At least one line must look like `key: value` for a `---` block to count
/// as a metadata header.
fn looks_like_yaml(block: &str) -> bool {
    block.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        let Some((key, after)) = trimmed.split_once(':') else {
            return false;
        };
        let is_valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(key, "http" | "https" | "ftp" | "mailto");
        is_valid_key && (after.is_empty() || after.starts_with(' '))
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Accept a list of scalars or a single string
fn parse_tags(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(|item| {
                    let tag = scalar_to_string(item);
                    if tag.is_none() {
                        tracing::warn!("Skipping malformed tag {:?}", item);
                    }
                    tag
                })
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

/// Parse a date string in various formats, interpreting naive values in local time
pub fn parse_date_string(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Local));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&dt).earliest();
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&d.and_hms_opt(0, 0, 0)?).earliest();
        }
    }

    None
}
