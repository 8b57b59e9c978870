//! Release date parsing.

use chrono::NaiveDate;
use serde_json::Value;

/// Accepted layouts after `/` is normalized to `-`.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%d-%m-%Y"];

/// Parse a release date. Non-strings and unparsable text yield `None`.
pub fn parse_release_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_text(s),
        _ => None,
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let normalized = text.trim().replace('/', "-");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
}

/// ISO `YYYY-MM-DD` text of a parsed date.
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slashes_are_normalized() {
        let date = parse_release_date(&json!("1999/01/09")).unwrap();
        assert_eq!(iso(date), "1999-01-09");
    }

    #[test]
    fn test_compact_and_day_first_forms() {
        assert_eq!(iso(parse_date_text("19990109").unwrap()), "1999-01-09");
        assert_eq!(iso(parse_date_text("09/01/1999").unwrap()), "1999-01-09");
    }

    #[test]
    fn test_unparsable_and_non_strings_are_none() {
        assert!(parse_release_date(&json!("soon")).is_none());
        assert!(parse_release_date(&json!("1999-13-01")).is_none());
        assert!(parse_release_date(&json!(19990109)).is_none());
        assert!(parse_release_date(&Value::Null).is_none());
    }
}
