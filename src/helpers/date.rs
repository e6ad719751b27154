//! Date helper functions

use chrono::{DateTime, TimeZone};

/// Format a date using Moment.js-compatible format string
///
/// # Examples
/// ```ignore
/// format_date(&date, "YYYY-MM-DD") // -> "2024-01-15"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let chrono_format = moment_to_chrono_format(format);
    date.format(&chrono_format).to_string()
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Format date in full format (like "January 15, 2024")
pub fn full_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%B %-d, %Y").to_string()
}

/// Convert Moment.js format to chrono format
fn moment_to_chrono_format(format: &str) -> String {
    // Longest token first within each family
    let replacements = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DDDD", "%j"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("ZZ", "%z"),
        ("SSS", "%3f"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local};

    #[test]
    fn test_format_date() {
        let date = Local.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_date(&date, "YYYY-MM-DD"), "2024-01-15");
        assert_eq!(format_date(&date, "MMM DD, YYYY"), "Jan 15, 2024");
    }

    #[test]
    fn test_full_date() {
        let date = Local.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
        assert_eq!(full_date(&date), "June 1, 2024");
    }

    #[test]
    fn test_date_xml() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let date = offset.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(date_xml(&date), "2024-06-01T08:00:00+02:00");
    }

    #[test]
    fn test_moment_to_chrono() {
        assert_eq!(moment_to_chrono_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(moment_to_chrono_format("HH:mm:ss"), "%H:%M:%S");
        assert_eq!(moment_to_chrono_format("dddd, MMMM DD"), "%A, %B %d");
    }
}
