//! Scalar cleaning for monetary and date fields.
//!
//! Source data mixes locales and formatting conventions, so every function here
//! degrades to a typed default instead of failing.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Currency codes stripped from monetary strings.
const CURRENCY_CODES: [&str; 3] = ["RWF", "USD", "EUR"];

/// Date patterns tried in order. The order decides ambiguous dates such as
/// `03/04/2023` (day-first wins) and must match the training pipeline.
const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d"];

/// Best-effort patterns used only after every entry in [`DATE_FORMATS`] failed.
/// Ambiguous numeric forms are read month-first here.
const FALLBACK_DATE_FORMATS: [&str; 17] = [
    "%Y%m%d",
    "%m.%d.%Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%d/%m/%y",
    "%m-%d-%y",
    "%d-%m-%y",
    "%m.%d.%y",
    "%d.%m.%y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%y%m%d",
    "%Y.%m.%d",
];

const FALLBACK_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Clean a balance-like value into a float.
///
/// Null, empty and unparseable inputs become `0.0`. Strings lose whitespace,
/// thousands separators and known currency codes before parsing.
pub fn normalize_amount(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => finite_or_zero(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => parse_amount(s),
        Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Clean an average-transaction-value field. Same contract as
/// [`normalize_amount`].
pub fn normalize_transaction_value(value: &Value) -> f64 {
    normalize_amount(value)
}

fn parse_amount(raw: &str) -> f64 {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>()
        .to_ascii_uppercase();
    for code in CURRENCY_CODES {
        cleaned = cleaned.replace(code, "");
    }
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Parse a date-like value.
///
/// Returns `None` for null, empty or unrecognised input.
pub fn normalize_date(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| parse_with_format(&raw, fmt))
        .or_else(|| parse_date_lenient(&raw))
}

/// Parse with one pattern. A `%Y` pattern only matches a four-digit year;
/// chrono alone would read `01/02/23` as the year 23.
fn parse_with_format(raw: &str, fmt: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, fmt).ok()?;
    if fmt.contains("%Y") && !has_four_digit_year(raw, date.year()) {
        return None;
    }
    Some(date)
}

fn has_four_digit_year(raw: &str, year: i32) -> bool {
    if !(0..=9999).contains(&year) {
        return false;
    }
    let token = format!("{year:04}");
    raw.split(|c: char| !c.is_ascii_digit())
        .any(|run| run == token || (run.len() == 8 && run.starts_with(&token)))
}

fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|fmt| parse_with_format(raw, fmt))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_strips_separators_and_currency() {
        assert_eq!(normalize_amount(&json!("1,234,567.50 RWF")), 1_234_567.5);
        assert_eq!(normalize_amount(&json!(" 12 500 USD ")), 12_500.0);
        assert_eq!(normalize_amount(&json!("EUR 99.9")), 99.9);
        assert_eq!(normalize_amount(&json!("3,000 rwf")), 3000.0);
        assert_eq!(normalize_amount(&json!(250.25)), 250.25);
    }

    #[test]
    fn test_amount_defaults_to_zero() {
        assert_eq!(normalize_amount(&Value::Null), 0.0);
        assert_eq!(normalize_amount(&json!("")), 0.0);
        assert_eq!(normalize_amount(&json!("   ")), 0.0);
        assert_eq!(normalize_amount(&json!("not a number")), 0.0);
        assert_eq!(normalize_amount(&json!("12..5")), 0.0);
        assert_eq!(normalize_amount(&json!("NaN")), 0.0);
        assert_eq!(normalize_amount(&json!({"amount": 5})), 0.0);
    }

    #[test]
    fn test_transaction_value_same_contract() {
        assert_eq!(normalize_transaction_value(&json!("45,000")), 45_000.0);
        assert_eq!(normalize_transaction_value(&json!(null)), 0.0);
        assert_eq!(normalize_transaction_value(&json!("??")), 0.0);
    }

    #[test]
    fn test_date_day_first_wins_for_ambiguous_input() {
        let date = normalize_date(&json!("03/04/2023")).unwrap();
        assert_eq!((date.day(), date.month(), date.year()), (3, 4, 2023));
    }

    #[test]
    fn test_date_falls_through_to_month_first() {
        // 25 is not a valid month, so the day-first pattern fails.
        let date = normalize_date(&json!("12/25/2022")).unwrap();
        assert_eq!((date.month(), date.day()), (12, 25));
    }

    #[test]
    fn test_date_iso_and_dash_variants() {
        assert_eq!(
            normalize_date(&json!("2021-07-15")),
            NaiveDate::from_ymd_opt(2021, 7, 15)
        );
        assert_eq!(
            normalize_date(&json!("15-07-2021")),
            NaiveDate::from_ymd_opt(2021, 7, 15)
        );
        assert_eq!(
            normalize_date(&json!("2021/07/15")),
            NaiveDate::from_ymd_opt(2021, 7, 15)
        );
    }

    #[test]
    fn test_date_best_effort_fallback() {
        assert_eq!(
            normalize_date(&json!("2020-02-29T10:30:00Z")),
            NaiveDate::from_ymd_opt(2020, 2, 29)
        );
        assert_eq!(
            normalize_date(&json!("5 March 2019")),
            NaiveDate::from_ymd_opt(2019, 3, 5)
        );
        assert_eq!(
            normalize_date(&json!(20230115)),
            NaiveDate::from_ymd_opt(2023, 1, 15)
        );
    }

    #[test]
    fn test_date_two_digit_year_is_not_year_zero() {
        // no strict pattern takes a short year; the lenient pass reads month-first
        assert_eq!(
            normalize_date(&json!("01/02/23")),
            NaiveDate::from_ymd_opt(2023, 1, 2)
        );
        assert_eq!(
            normalize_date(&json!("25/12/22")),
            NaiveDate::from_ymd_opt(2022, 12, 25)
        );
        assert_eq!(
            normalize_date(&json!("07-15-21")),
            NaiveDate::from_ymd_opt(2021, 7, 15)
        );
        assert_eq!(normalize_date(&json!("1/2/123")), None);
    }

    #[test]
    fn test_date_dotted_form_is_month_first() {
        assert_eq!(
            normalize_date(&json!("03.04.2023")),
            NaiveDate::from_ymd_opt(2023, 3, 4)
        );
        assert_eq!(
            normalize_date(&json!("25.12.2022")),
            NaiveDate::from_ymd_opt(2022, 12, 25)
        );
    }

    #[test]
    fn test_date_unparseable_is_none() {
        assert_eq!(normalize_date(&Value::Null), None);
        assert_eq!(normalize_date(&json!("")), None);
        assert_eq!(normalize_date(&json!("yesterday")), None);
        assert_eq!(normalize_date(&json!("31/02/2023")), None);
        assert_eq!(normalize_date(&json!(true)), None);
    }
}
