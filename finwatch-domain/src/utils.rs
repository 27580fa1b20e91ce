// Shared parsing and formatting helpers

use chrono::{NaiveDate, NaiveDateTime};

/// Canonical timestamp rendering: ISO-8601, second precision.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse the timestamp renderings accepted across the system:
/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, ISO-8601 with `T`, with or
/// without a UTC offset and fractional seconds. Offsets and fractions
/// are truncated: the stored value is the local wall-clock second.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let mut s = raw.trim().replace('T', " ");
    if s.is_empty() {
        return None;
    }
    // Drop a trailing UTC designator or numeric offset (+HH:MM / -HH:MM).
    if s.ends_with('Z') {
        s.pop();
    } else {
        let sign = s.get(10..).and_then(|tail| tail.rfind(['+', '-']));
        if let Some(pos) = sign {
            s.truncate(10 + pos);
        }
    }
    // Drop fractional seconds.
    let fraction = s.find('.');
    if let Some(pos) = fraction {
        s.truncate(pos);
    }
    let s = s.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Coerce a raw amount cell: strip everything but digits, sign and the
/// decimal point, then parse. Zero and non-finite values are rejected.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    Some(value)
}

/// Money rendering used in alert descriptions: thousands `.`, decimal
/// `,`, two places. The raw number always travels in `extra`.
pub fn format_money(value: f64) -> String {
    let negative = value < 0.0;
    let text = format!("{:.2}", value.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }
    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped},{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_date() {
        let dt = parse_timestamp("2024-03-15").unwrap();
        assert_eq!(format_timestamp(dt), "2024-03-15T00:00:00");
    }

    #[test]
    fn parses_datetime_with_offset_and_fraction() {
        let dt = parse_timestamp("2023-01-25T21:00:00.123-03:00").unwrap();
        assert_eq!(format_timestamp(dt), "2023-01-25T21:00:00");
        let dt = parse_timestamp("2023-01-25T21:00:00+02:00").unwrap();
        assert_eq!(format_timestamp(dt), "2023-01-25T21:00:00");
        let dt = parse_timestamp("2023-01-25 08:30:00Z").unwrap();
        assert_eq!(format_timestamp(dt), "2023-01-25T08:30:00");
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("15/03/2024").is_none());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn amount_coercion_strips_currency_noise() {
        assert_eq!(parse_amount("1234.56"), Some(1234.56));
        assert_eq!(parse_amount("R$ 950"), Some(950.0));
        assert_eq!(parse_amount("-42.5"), Some(-42.5));
        assert_eq!(parse_amount("R$ abc"), None);
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn money_formatting_uses_brazilian_locale() {
        assert_eq!(format_money(1234.5), "1.234,50");
        assert_eq!(format_money(-500.0), "-500,00");
        assert_eq!(format_money(1_234_567.891), "1.234.567,89");
        assert_eq!(format_money(0.0), "0,00");
    }
}
