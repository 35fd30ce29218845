use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unrecognised timestamp text: {text:?}")]
pub struct TimestampParseError {
    pub text: String,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y, %I:%M %p",
    "%d %b %Y %H:%M",
    "%d %B %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%b %d, %Y", "%B %d, %Y"];

/// Parse the timestamp shown on an item's detail view.
///
/// Times without an offset are taken as UTC. A leading word label such as
/// `Sent:` is ignored.
pub fn parse_activity_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let text = strip_label(raw);
    if text.is_empty() {
        return Err(TimestampParseError {
            text: raw.to_string(),
        });
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }
    }

    Err(TimestampParseError {
        text: raw.to_string(),
    })
}

fn strip_label(raw: &str) -> &str {
    let text = raw.trim();
    match text.split_once(':') {
        Some((label, rest))
            if !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_alphabetic() || c.is_whitespace()) =>
        {
            rest.trim()
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn accepts_common_portal_formats() {
        let expected = utc(2025, 11, 3, 14, 5);
        for text in [
            "2025-11-03T14:05:00Z",
            "2025-11-03T15:05:00+01:00",
            "2025-11-03 14:05:00",
            "2025-11-03 14:05",
            "03/11/2025 14:05",
            "Nov 3, 2025 2:05 PM",
            "November 3, 2025 2:05 PM",
            "3 Nov 2025 14:05",
        ] {
            assert_eq!(parse_activity_timestamp(text), Ok(expected), "{text}");
        }
    }

    #[test]
    fn bare_date_means_midnight() {
        assert_eq!(
            parse_activity_timestamp("2025-11-01"),
            Ok(utc(2025, 11, 1, 0, 0))
        );
    }

    #[test]
    fn label_prefix_is_ignored() {
        assert_eq!(
            parse_activity_timestamp("  Sent: 2025-11-03 14:05 "),
            Ok(utc(2025, 11, 3, 14, 5))
        );
    }

    #[test]
    fn non_date_text_is_rejected() {
        let err = parse_activity_timestamp("Expires soon").unwrap_err();
        assert_eq!(err.text, "Expires soon");
        assert!(parse_activity_timestamp("   ").is_err());
        assert!(parse_activity_timestamp("Sent:").is_err());
    }
}
