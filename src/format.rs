//! Stateless format validators.
//!
//! Formats with calendar or grammar rules (`date`, `date-time`, `duration`,
//! `uuid`) are owned by the coercer, which reports them with parsing error
//! kinds. The remaining string formats are checked during constraint
//! validation. Unknown formats validate vacuously, per JSON Schema
//! annotation semantics.

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Pattern used for `format: email` validation and echoed in error context.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$";

#[allow(clippy::expect_used)]
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"));

#[allow(clippy::expect_used)]
static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("hostname pattern is valid")
});

/// String formats recognized by the schema compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Email,
    Uri,
    Ipv4,
    Ipv6,
    Hostname,
    Uuid,
    Date,
    DateTime,
    Duration,
    /// Multipart file payloads; validated against the file content string.
    Binary,
    /// Unrecognized format names are carried but never enforced.
    Other(String),
}

impl Format {
    pub fn from_keyword(keyword: &str) -> Format {
        match keyword {
            "email" => Format::Email,
            "uri" => Format::Uri,
            "ipv4" => Format::Ipv4,
            "ipv6" => Format::Ipv6,
            "hostname" => Format::Hostname,
            "uuid" => Format::Uuid,
            "date" => Format::Date,
            "date-time" => Format::DateTime,
            "duration" => Format::Duration,
            "binary" => Format::Binary,
            other => Format::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Format::Email => "email",
            Format::Uri => "uri",
            Format::Ipv4 => "ipv4",
            Format::Ipv6 => "ipv6",
            Format::Hostname => "hostname",
            Format::Uuid => "uuid",
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Duration => "duration",
            Format::Binary => "binary",
            Format::Other(s) => s,
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_uri(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

pub fn is_valid_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

pub fn is_valid_ipv6(value: &str) -> bool {
    value.parse::<Ipv6Addr>().is_ok()
}

pub fn is_valid_hostname(value: &str) -> bool {
    value.len() <= 253 && HOSTNAME_RE.is_match(value)
}

pub fn is_valid_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

/// `YYYY-MM-DD` with real calendar rules (month 13 or day 45 fail).
pub fn is_valid_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// RFC 3339 / ISO-8601 date-time with offset.
pub fn is_valid_datetime(value: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(value).is_ok()
}

/// ISO-8601 duration, e.g. `P1Y2M3DT4H5M6S`, `PT0.5S`, `P4W`.
///
/// Hand-rolled because the grammar needs "at least one component" and
/// "T must be followed by a time component" checks that a linear-time
/// regex cannot express.
pub fn is_valid_duration(value: &str) -> bool {
    let mut chars = value.chars().peekable();
    if chars.next() != Some('P') {
        return false;
    }

    let mut saw_component = false;
    let mut in_time = false;
    let mut saw_time_component = false;
    // Designator order is enforced within each section
    let date_order = ['Y', 'M', 'W', 'D'];
    let time_order = ['H', 'M', 'S'];
    let mut next_date = 0usize;
    let mut next_time = 0usize;

    while let Some(&c) = chars.peek() {
        if c == 'T' {
            if in_time {
                return false;
            }
            in_time = true;
            chars.next();
            continue;
        }
        if !c.is_ascii_digit() {
            return false;
        }
        let mut number = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == '.' {
                number.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let designator = match chars.next() {
            Some(d) => d,
            None => return false,
        };
        // Fractions are only allowed on seconds
        if number.contains('.') && designator != 'S' {
            return false;
        }
        if number.parse::<f64>().is_err() {
            return false;
        }
        if in_time {
            let pos = match time_order[next_time..].iter().position(|&d| d == designator) {
                Some(p) => next_time + p,
                None => return false,
            };
            next_time = pos + 1;
            saw_time_component = true;
        } else {
            let pos = match date_order[next_date..].iter().position(|&d| d == designator) {
                Some(p) => next_date + p,
                None => return false,
            };
            next_date = pos + 1;
        }
        saw_component = true;
    }

    if in_time && !saw_time_component {
        return false;
    }
    saw_component
}

/// Check a string against a non-parsing format. Returns `Ok(())` for
/// formats handled by the coercer and for unknown formats.
pub fn validate_format(format: &Format, value: &str) -> Result<(), String> {
    let ok = match format {
        Format::Email => is_valid_email(value),
        Format::Uri => is_valid_uri(value),
        Format::Ipv4 => is_valid_ipv4(value),
        Format::Ipv6 => is_valid_ipv6(value),
        Format::Hostname => is_valid_hostname(value),
        // Parsing formats and unknown formats are not enforced here
        Format::Uuid
        | Format::Date
        | Format::DateTime
        | Format::Duration
        | Format::Binary
        | Format::Other(_) => true,
    };
    if ok {
        Ok(())
    } else {
        match format {
            Format::Email => Err(format!("String should match pattern '{EMAIL_PATTERN}'")),
            Format::Ipv4 => Err("Input should be a valid IPv4 address".to_string()),
            Format::Ipv6 => Err("Input should be a valid IPv6 address".to_string()),
            Format::Hostname => Err("Input should be a valid hostname".to_string()),
            _ => Err(format!("Input should be a valid {}", format.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name+tag@sub.example.co"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn test_ip_addresses() {
        assert!(is_valid_ipv4("192.168.0.1"));
        assert!(!is_valid_ipv4("256.1.1.1"));
        assert!(!is_valid_ipv4("1.2.3"));
        assert!(is_valid_ipv6("::1"));
        assert!(is_valid_ipv6("2001:db8::8a2e:370:7334"));
        assert!(!is_valid_ipv6("2001:::1"));
    }

    #[test]
    fn test_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("a-b.c-d.example"));
        assert!(!is_valid_hostname("-leading.example.com"));
        assert!(!is_valid_hostname("trailing-.example.com"));
        assert!(!is_valid_hostname(&"a".repeat(254)));
    }

    #[test]
    fn test_uuid() {
        assert!(is_valid_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid("550e8400-e29b-41d4-a716"));
    }

    #[test]
    fn test_date_calendar_rules() {
        assert!(is_valid_date("2024-02-29")); // leap year
        assert!(!is_valid_date("2023-02-29"));
        assert!(!is_valid_date("2024-13-01")); // month 13
        assert!(!is_valid_date("2024-01-45")); // day 45
        assert!(!is_valid_date("01/02/2024"));
    }

    #[test]
    fn test_datetime() {
        assert!(is_valid_datetime("2024-06-01T12:30:00Z"));
        assert!(is_valid_datetime("2024-06-01T12:30:00+02:00"));
        assert!(!is_valid_datetime("2024-06-01 12:30:00"));
        assert!(!is_valid_datetime("2024-06-01"));
    }

    #[test]
    fn test_duration() {
        assert!(is_valid_duration("P1Y"));
        assert!(is_valid_duration("P1Y2M3DT4H5M6S"));
        assert!(is_valid_duration("PT0.5S"));
        assert!(is_valid_duration("P4W"));
        assert!(!is_valid_duration("P")); // no components
        assert!(!is_valid_duration("P1YT")); // dangling T
        assert!(!is_valid_duration("P1S")); // time designator without T
        assert!(!is_valid_duration("P1M1Y")); // wrong order
        assert!(!is_valid_duration("1Y"));
        assert!(!is_valid_duration("PT1.5H")); // fraction only on seconds
    }

    #[test]
    fn test_unknown_format_passes() {
        let fmt = Format::from_keyword("color");
        assert_eq!(validate_format(&fmt, "anything"), Ok(()));
    }
}
