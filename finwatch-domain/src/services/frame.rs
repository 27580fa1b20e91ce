//! Query-friendly views over the cleaned transaction rows.
//!
//! Every view is backed by a `BTreeMap` so grouping and iteration order
//! are deterministic across runs; the dedup key depends on it.

use std::collections::BTreeMap;

use crate::entities::CleanRow;
use crate::value_objects::{TransactionKind, YearMonth};

#[derive(Debug, Clone, Copy, Default)]
pub struct MonthTotals {
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CleanFrame {
    rows: Vec<CleanRow>,
}

impl CleanFrame {
    /// Rows must already be sorted by date ascending (the loader's job).
    pub fn new(rows: Vec<CleanRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CleanRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per-(category, kind) groups, in row order inside each group.
    pub fn groups_by_category_kind(&self) -> BTreeMap<(String, TransactionKind), Vec<&CleanRow>> {
        let mut groups: BTreeMap<(String, TransactionKind), Vec<&CleanRow>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry((row.category.clone(), row.kind))
                .or_default()
                .push(row);
        }
        groups
    }

    /// Monthly expense totals per category (absolute values).
    pub fn monthly_expense_by_category(&self) -> BTreeMap<String, BTreeMap<YearMonth, f64>> {
        let mut out: BTreeMap<String, BTreeMap<YearMonth, f64>> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.kind.is_expense()) {
            *out.entry(row.category.clone())
                .or_default()
                .entry(row.year_month)
                .or_insert(0.0) += row.amount;
        }
        for months in out.values_mut() {
            for total in months.values_mut() {
                *total = total.abs();
            }
        }
        out
    }

    /// Total monthly expenses across categories (absolute values).
    pub fn monthly_expense_totals(&self) -> BTreeMap<YearMonth, f64> {
        let mut out: BTreeMap<YearMonth, f64> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.kind.is_expense()) {
            *out.entry(row.year_month).or_insert(0.0) += row.amount;
        }
        for total in out.values_mut() {
            *total = total.abs();
        }
        out
    }

    /// Income/expense pivot per month. Only months that carry at least
    /// one row appear; the absent side of a present month is zero.
    pub fn monthly_income_expense(&self) -> BTreeMap<YearMonth, MonthTotals> {
        let mut raw: BTreeMap<YearMonth, (f64, f64)> = BTreeMap::new();
        for row in &self.rows {
            // Transfers and the rest keep the month visible without
            // moving either side.
            let entry = raw.entry(row.year_month).or_default();
            match row.kind {
                TransactionKind::Income => entry.0 += row.amount,
                TransactionKind::Expense => entry.1 += row.amount,
                _ => {}
            }
        }
        raw.into_iter()
            .map(|(month, (income, expense))| {
                (
                    month,
                    MonthTotals {
                        income,
                        expense: expense.abs(),
                    },
                )
            })
            .collect()
    }

    /// Rows carrying an asset symbol, grouped per asset.
    pub fn asset_rows(&self) -> BTreeMap<String, Vec<&CleanRow>> {
        let mut out: BTreeMap<String, Vec<&CleanRow>> = BTreeMap::new();
        for row in &self.rows {
            if let Some(asset) = &row.asset {
                out.entry(asset.clone()).or_default().push(row);
            }
        }
        out
    }

    /// Signed monthly sums per asset.
    pub fn monthly_totals_by_asset(&self) -> BTreeMap<String, BTreeMap<YearMonth, f64>> {
        let mut out: BTreeMap<String, BTreeMap<YearMonth, f64>> = BTreeMap::new();
        for row in &self.rows {
            if let Some(asset) = &row.asset {
                *out.entry(asset.clone())
                    .or_default()
                    .entry(row.year_month)
                    .or_insert(0.0) += row.amount;
            }
        }
        out
    }

    pub fn rows_in_month(&self, month: YearMonth) -> Vec<&CleanRow> {
        self.rows
            .iter()
            .filter(|r| r.year_month == month)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entities::CleanRow;

    fn row(date: (i32, u32, u32), amount: f64, category: &str, kind: TransactionKind) -> CleanRow {
        let dt = NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        CleanRow {
            id: None,
            date: dt,
            description: None,
            amount,
            abs_amount: amount.abs(),
            category: category.to_string(),
            kind,
            asset: None,
            payment_method: None,
            rate: None,
            indicator_1: None,
            indicator_2: None,
            year_month: YearMonth::from_datetime(dt),
        }
    }

    #[test]
    fn pivot_fills_absent_side_with_zero() {
        let frame = CleanFrame::new(vec![
            row((2024, 1, 5), 1000.0, "Salário", TransactionKind::Income),
            row((2024, 1, 10), -300.0, "Mercado", TransactionKind::Expense),
            row((2024, 2, 10), -200.0, "Mercado", TransactionKind::Expense),
        ]);
        let pivot = frame.monthly_income_expense();
        let jan = pivot[&YearMonth::new(2024, 1)];
        assert_eq!(jan.income, 1000.0);
        assert_eq!(jan.expense, 300.0);
        let feb = pivot[&YearMonth::new(2024, 2)];
        assert_eq!(feb.income, 0.0);
        assert_eq!(feb.expense, 200.0);
    }

    #[test]
    fn monthly_expense_by_category_uses_absolute_sums() {
        let frame = CleanFrame::new(vec![
            row((2024, 1, 3), -50.0, "Transporte", TransactionKind::Expense),
            row((2024, 1, 20), -70.0, "Transporte", TransactionKind::Expense),
            row((2024, 1, 4), 500.0, "Salário", TransactionKind::Income),
        ]);
        let by_cat = frame.monthly_expense_by_category();
        assert_eq!(by_cat["Transporte"][&YearMonth::new(2024, 1)], 120.0);
        assert!(!by_cat.contains_key("Salário"));
    }

    #[test]
    fn groups_gate_on_category_and_kind() {
        let frame = CleanFrame::new(vec![
            row((2024, 1, 3), -50.0, "Food", TransactionKind::Expense),
            row((2024, 1, 4), -60.0, "Food", TransactionKind::Expense),
            row((2024, 1, 5), 100.0, "Food", TransactionKind::Income),
        ]);
        let groups = frame.groups_by_category_kind();
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[&("Food".to_string(), TransactionKind::Expense)].len(),
            2
        );
    }
}
