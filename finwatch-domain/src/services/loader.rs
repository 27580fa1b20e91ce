//! Transaction cleaning.
//!
//! Turns raw store rows into the validated frame the detectors consume.
//! Rows are dropped, never repaired: a row survives only with a
//! parseable date and a finite, non-zero amount.

use crate::entities::{CleanRow, TransactionRecord};
use crate::services::frame::CleanFrame;
use crate::utils::{parse_amount, parse_timestamp};
use crate::value_objects::{TransactionKind, YearMonth};

/// Build the frame. Returns the frame plus the number of rows dropped
/// by validation, for aggregate warning upstream.
pub fn build_frame(records: Vec<TransactionRecord>) -> (CleanFrame, usize) {
    let total = records.len();
    let mut rows: Vec<CleanRow> = records.into_iter().filter_map(clean_row).collect();
    rows.sort_by_key(|r| r.date);
    let dropped = total - rows.len();
    (CleanFrame::new(rows), dropped)
}

fn clean_row(record: TransactionRecord) -> Option<CleanRow> {
    let date = parse_timestamp(record.date.as_deref()?)?;
    let amount = parse_amount(record.amount.as_deref()?)?;

    let category = match record.category.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => "Outros".to_string(),
    };
    let kind = record
        .kind
        .as_deref()
        .map(TransactionKind::from)
        .unwrap_or(TransactionKind::Other);

    Some(CleanRow {
        id: record.id,
        date,
        description: record.description,
        amount,
        abs_amount: amount.abs(),
        category,
        kind,
        asset: none_if_blank(record.asset),
        payment_method: none_if_blank(record.payment_method),
        rate: record.rate.filter(|r| r.is_finite()),
        indicator_1: record.indicator_1.filter(|v| v.is_finite()),
        indicator_2: record.indicator_2.filter(|v| v.is_finite()),
        year_month: YearMonth::from_datetime(date),
    })
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, amount: &str) -> TransactionRecord {
        TransactionRecord {
            date: Some(date.to_string()),
            amount: Some(amount.to_string()),
            kind: Some("despesa".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn drops_malformed_rows_silently() {
        let records = vec![
            record("2024-03-15", "100.0"),
            record("2024-03-16", "R$ abc"),
            record("not a date", "50.0"),
            record("2024-03-17", "0"),
            record("2024-03-18", "-75.5"),
        ];
        let (frame, dropped) = build_frame(records);
        assert_eq!(frame.len(), 2);
        assert_eq!(dropped, 3);
    }

    #[test]
    fn sorts_by_date_and_derives_columns() {
        let records = vec![record("2024-05-02", "-30"), record("2024-03-15", "100")];
        let (frame, _) = build_frame(records);
        let rows = frame.rows();
        assert_eq!(rows[0].year_month, YearMonth::new(2024, 3));
        assert_eq!(rows[1].year_month, YearMonth::new(2024, 5));
        assert_eq!(rows[1].abs_amount, 30.0);
        assert_eq!(rows[0].category, "Outros");
    }

    #[test]
    fn empty_input_yields_empty_frame() {
        let (frame, dropped) = build_frame(Vec::new());
        assert!(frame.is_empty());
        assert_eq!(dropped, 0);
    }
}
