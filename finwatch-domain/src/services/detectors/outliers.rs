//! Per-transaction outlier detectors: z-score, percentile bounds and
//! EMA drift. All three work per (category, kind) group and stamp the
//! transaction instant as the occurrence time.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::entities::AlertDraft;
use crate::services::frame::CleanFrame;
use crate::services::stats;
use crate::utils::format_money;
use crate::value_objects::{AlertKind, Priority};

use super::DetectorContext;

/// Z-score outliers on absolute amounts. The IQR fences pick the
/// estimation subset so one extreme row cannot hide itself by inflating
/// the deviation; every row of the group is then scored against those
/// statistics.
pub fn z_score(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for ((category, kind), rows) in frame.groups_by_category_kind() {
        if rows.len() < cfg.min_group_size {
            continue;
        }
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        let q1 = stats::quantile(&amounts, 0.25);
        let q3 = stats::quantile(&amounts, 0.75);
        let iqr = q3 - q1;
        let lower_fence = q1 - cfg.iqr_k * iqr;
        let upper_fence = q3 + cfg.iqr_k * iqr;

        let fenced: Vec<f64> = rows
            .iter()
            .filter(|r| r.amount >= lower_fence && r.amount <= upper_fence)
            .map(|r| r.abs_amount)
            .collect();
        if fenced.len() < cfg.min_group_size {
            continue;
        }

        let mean = stats::mean(&fenced);
        let median = stats::median(&fenced);
        let std = stats::sample_std(&fenced).max(1e-10);

        for row in &rows {
            let z = (row.abs_amount - mean) / std;
            if z.abs() <= cfg.z_limit {
                continue;
            }
            let priority = if z.abs() > 3.0 {
                Priority::High
            } else {
                Priority::Medium
            };

            let mut extra = BTreeMap::new();
            extra.insert("zscore".to_string(), json!(z));
            extra.insert("kind".to_string(), json!(kind.as_str()));
            extra.insert("group_mean".to_string(), json!(mean));
            extra.insert("group_median".to_string(), json!(median));
            extra.insert("group_std".to_string(), json!(std));
            extra.insert("group_size".to_string(), json!(rows.len()));
            extra.insert("filtered_size".to_string(), json!(fenced.len()));

            drafts.push(AlertDraft {
                title: format!("Anomalia em {category}"),
                description: format!(
                    "Valor atípico detectado: R${} em {} ({}) com z-score de {:.2} em {}. \
                     Média do grupo: R${}, desvio padrão: R${}",
                    format_money(row.amount),
                    category,
                    kind.as_str(),
                    z,
                    row.date.format("%d/%m/%Y"),
                    format_money(mean),
                    format_money(std),
                ),
                kind: AlertKind::Anomaly,
                priority,
                category: Some(category.clone()),
                value: row.amount,
                occurred_at: row.date,
                source: "Z-Score",
                extra,
                transaction_id: row.id.clone(),
            });
        }
    }
    Ok(drafts)
}

/// Rows outside the p1/p99 band of their (category, kind) group.
pub fn percentile(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for ((category, kind), rows) in frame.groups_by_category_kind() {
        if rows.len() < cfg.min_group_size {
            continue;
        }
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        let p_low = stats::quantile(&amounts, cfg.pct_low);
        let p_high = stats::quantile(&amounts, cfg.pct_high);
        let band = p_high - p_low;

        for row in &rows {
            let value = row.amount;
            if value >= p_low && value <= p_high {
                continue;
            }
            let distance = if value < p_low {
                p_low - value
            } else {
                value - p_high
            };
            let priority = if distance > 3.0 * band {
                Priority::High
            } else {
                Priority::Medium
            };

            let mut extra = BTreeMap::new();
            extra.insert("p_low".to_string(), json!(p_low));
            extra.insert("p_high".to_string(), json!(p_high));
            extra.insert("kind".to_string(), json!(kind.as_str()));
            extra.insert("group_size".to_string(), json!(rows.len()));

            drafts.push(AlertDraft {
                title: format!("Outlier em {category}"),
                description: format!(
                    "Valor fora do percentil esperado: R${} em {} ({}) em {}. \
                     Intervalo: R${} a R${}.",
                    format_money(value),
                    category,
                    kind.as_str(),
                    row.date.format("%Y-%m-%d"),
                    format_money(p_low),
                    format_money(p_high),
                ),
                kind: AlertKind::Anomaly,
                priority,
                category: Some(category.clone()),
                value,
                occurred_at: row.date,
                source: "Percentile",
                extra,
                transaction_id: row.id.clone(),
            });
        }
    }
    Ok(drafts)
}

/// Rows that exceed their group's exponential moving average by more
/// than the configured fraction.
pub fn ema_drift(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for ((category, kind), rows) in frame.groups_by_category_kind() {
        if rows.len() < cfg.ema_min_rows {
            continue;
        }
        // Rows arrive date-sorted from the frame.
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        let averages = stats::ema(&amounts, cfg.ema_span);

        for (row, ema) in rows.iter().zip(&averages) {
            if ema.abs() < 1e-10 {
                continue;
            }
            let diff_pct = (row.amount - ema) / ema;
            if diff_pct <= cfg.ema_diff {
                continue;
            }

            let mut extra = BTreeMap::new();
            extra.insert("ema".to_string(), json!(ema));
            extra.insert("diff_pct".to_string(), json!(diff_pct));
            extra.insert("kind".to_string(), json!(kind.as_str()));
            extra.insert("ema_span".to_string(), json!(cfg.ema_span));
            extra.insert("group_size".to_string(), json!(rows.len()));

            drafts.push(AlertDraft {
                title: format!("Pico em {category}"),
                description: format!(
                    "Valor excede a EMA em {:.2}%: R${} em {} ({}) em {}. EMA: R${}.",
                    diff_pct * 100.0,
                    format_money(row.amount),
                    category,
                    kind.as_str(),
                    row.date.format("%d/%m/%Y"),
                    format_money(*ema),
                ),
                kind: AlertKind::Trend,
                priority: Priority::Medium,
                category: Some(category.clone()),
                value: row.amount,
                occurred_at: row.date,
                source: "EMA",
                extra,
                transaction_id: row.id.clone(),
            });
        }
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entities::{CleanRow, DetectorConfig};
    use crate::value_objects::{TransactionKind, YearMonth};

    fn expense(id: u32, day: u32, amount: f64) -> CleanRow {
        let date = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        CleanRow {
            id: Some(id.to_string()),
            date,
            description: None,
            amount,
            abs_amount: amount.abs(),
            category: "Food".to_string(),
            kind: TransactionKind::Expense,
            asset: None,
            payment_method: None,
            rate: None,
            indicator_1: None,
            indicator_2: None,
            year_month: YearMonth::from_datetime(date),
        }
    }

    fn frame_with_outlier() -> CleanFrame {
        let mut rows: Vec<CleanRow> = (0..30)
            .map(|i| expense(i, 1 + (i % 28), [90.0, 95.0, 100.0, 105.0, 110.0][(i % 5) as usize]))
            .collect();
        rows.push(expense(99, 15, 900.0));
        rows.sort_by_key(|r| r.date);
        CleanFrame::new(rows)
    }

    fn ctx_at(config: &DetectorConfig) -> DetectorContext<'_> {
        let now = NaiveDate::from_ymd_opt(2024, 4, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        DetectorContext::new(config, now)
    }

    #[test]
    fn z_score_flags_the_outlier_despite_iqr_fences() {
        let config = DetectorConfig::default();
        let drafts = z_score(&frame_with_outlier(), &ctx_at(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.source, "Z-Score");
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.value, 900.0);
        assert_eq!(draft.category.as_deref(), Some("Food"));
        assert_eq!(draft.transaction_id.as_deref(), Some("99"));
        assert_eq!(
            draft.occurred_at,
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn z_score_skips_small_groups() {
        let config = DetectorConfig::default();
        let rows: Vec<CleanRow> = (0..4).map(|i| expense(i, i + 1, 100.0)).collect();
        let drafts = z_score(&CleanFrame::new(rows), &ctx_at(&config)).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn percentile_flags_the_extreme_row() {
        let config = DetectorConfig::default();
        let drafts = percentile(&frame_with_outlier(), &ctx_at(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source, "Percentile");
        assert_eq!(drafts[0].value, 900.0);
    }

    #[test]
    fn ema_flags_spike_against_trailing_average() {
        let config = DetectorConfig::default();
        let drafts = ema_drift(&frame_with_outlier(), &ctx_at(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.source, "EMA");
        assert_eq!(draft.value, 900.0);
        assert_eq!(draft.kind, AlertKind::Trend);
    }
}
