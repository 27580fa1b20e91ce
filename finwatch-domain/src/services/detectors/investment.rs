//! Asset and risk detectors: ROI, Sharpe, volatility, beta and VaR.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::entities::AlertDraft;
use crate::services::frame::CleanFrame;
use crate::services::stats;
use crate::utils::format_money;
use crate::value_objects::{AlertKind, Priority, YearMonth};

use super::DetectorContext;

const MONTHS_PER_YEAR: f64 = 12.0;

/// Current-month return on investment per asset, judged against an
/// asset-kind floor and up to six months of its own history.
pub fn roi(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (asset, rows) in frame.asset_rows() {
        let mut invested = 0.0;
        let mut returned = 0.0;
        let mut monthly: BTreeMap<YearMonth, (f64, f64)> = BTreeMap::new();
        for row in &rows {
            let entry = monthly.entry(row.year_month).or_default();
            if row.kind.is_expense() {
                entry.0 += row.abs_amount;
            } else if row.kind.is_income() {
                entry.1 += row.amount;
            }
            if row.year_month == ctx.current_month {
                if row.kind.is_expense() {
                    invested += row.abs_amount;
                } else if row.kind.is_income() {
                    returned += row.amount;
                }
            }
        }
        if !monthly.contains_key(&ctx.current_month) {
            continue;
        }
        let floor = cfg.roi_floor_for(&asset);
        if invested < floor {
            continue;
        }

        let asset_roi = if returned == 0.0 {
            let had_past_income = monthly
                .range(..ctx.current_month)
                .any(|(_, (_, ret))| *ret > 0.0);
            if !had_past_income {
                // Fresh position, no return expected yet.
                continue;
            }
            -1.0
        } else {
            (returned - invested) / invested
        };

        let mut roi_history = Vec::new();
        for (_, (inv, ret)) in monthly.range(..ctx.current_month).rev() {
            if *inv >= floor && *inv > 0.0 {
                roi_history.push((ret - inv) / inv);
            }
            if roi_history.len() >= 6 {
                break;
            }
        }
        let roi_mean = if roi_history.is_empty() {
            None
        } else {
            Some(stats::mean(&roi_history))
        };

        let priority = match roi_mean {
            Some(historical) => {
                if asset_roi <= -0.5 {
                    Priority::High
                } else if asset_roi <= -0.2 {
                    Priority::Medium
                } else if (asset_roi - historical).abs() > 0.5 {
                    if asset_roi > 0.0 {
                        Priority::Medium
                    } else {
                        Priority::High
                    }
                } else {
                    Priority::Low
                }
            }
            None => {
                if asset_roi <= -0.5 {
                    Priority::High
                } else if asset_roi <= -0.2 {
                    Priority::Medium
                } else {
                    Priority::Low
                }
            }
        };

        let mut limit = cfg.roi_limit;
        if let Some(historical) = roi_mean {
            if historical > limit {
                limit = limit.max(historical * 0.5);
            }
        }
        if asset_roi >= limit.max(-0.05) {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("roi".to_string(), json!(asset_roi));
        extra.insert("invested".to_string(), json!(invested));
        extra.insert("returned".to_string(), json!(returned));
        extra.insert("asset".to_string(), json!(asset));
        extra.insert("roi_history".to_string(), json!(roi_history));
        extra.insert("roi_mean_historical".to_string(), json!(roi_mean));
        extra.insert("roi_limit".to_string(), json!(limit));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("ROI de {:+.2}% em {asset}", asset_roi * 100.0),
            description: format!(
                "ROI de {:+.2}% em {asset} no mês {}. Investimento: R${}, retorno: R${}.",
                asset_roi * 100.0,
                ctx.current_month,
                format_money(invested),
                format_money(returned),
            ),
            kind: AlertKind::Investment,
            priority,
            category: Some("Investimentos".to_string()),
            value: returned - invested,
            occurred_at: ctx.current_month.first_instant(),
            source: "ROI",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Annualized Sharpe ratio per asset over its monthly returns.
pub fn sharpe(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (asset, months) in frame.monthly_totals_by_asset() {
        let values: Vec<f64> = months.values().copied().collect();
        let returns = stats::pct_change(&values);
        if returns.len() < cfg.sharpe_months {
            continue;
        }
        let mean_return = stats::mean(&returns);
        let return_std = stats::sample_std(&returns).max(0.01);
        let ratio = mean_return / return_std * MONTHS_PER_YEAR.sqrt();
        if ratio >= cfg.sharpe_limit {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("sharpe".to_string(), json!(ratio));
        extra.insert("mean_return".to_string(), json!(mean_return));
        extra.insert("return_std".to_string(), json!(return_std));
        extra.insert("asset".to_string(), json!(asset));
        extra.insert("months_analyzed".to_string(), json!(returns.len()));

        drafts.push(AlertDraft {
            title: format!("Sharpe Ratio Baixo em {asset}"),
            description: format!(
                "Sharpe ratio de {ratio:.2} em {asset}. Retorno médio mensal: {:.2}%, \
                 volatilidade: {:.2}%.",
                mean_return * 100.0,
                return_std * 100.0,
            ),
            kind: AlertKind::Investment,
            priority: Priority::Medium,
            category: Some(asset.clone()),
            value: ratio,
            occurred_at: ctx.current_month.first_instant(),
            source: "Sharpe",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Annualized volatility of monthly expense changes per category.
pub fn volatility(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < cfg.vol_months {
            continue;
        }
        let values: Vec<f64> = months.values().copied().collect();
        let annualized = stats::sample_std(&stats::pct_change(&values)) * MONTHS_PER_YEAR.sqrt();
        if annualized <= cfg.vol_limit {
            continue;
        }
        let current = months.get(&ctx.current_month).copied().unwrap_or(0.0);

        let mut extra = BTreeMap::new();
        extra.insert("volatility".to_string(), json!(annualized));
        extra.insert("months_analyzed".to_string(), json!(months.len()));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("Alta Volatilidade em {category}"),
            description: format!(
                "Volatilidade anualizada de {annualized:.2} em {category} em {}. \
                 Valor atual: R${}.",
                ctx.current_month,
                format_money(current),
            ),
            kind: AlertKind::Risk,
            priority: Priority::Medium,
            category: Some(category.clone()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "Volatility",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Beta per asset against the whole-portfolio monthly return series.
pub fn beta(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let by_asset = frame.monthly_totals_by_asset();
    if by_asset.is_empty() {
        return Ok(Vec::new());
    }

    // Market proxy: every asset summed per month.
    let mut market: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for months in by_asset.values() {
        for (month, total) in months {
            *market.entry(*month).or_insert(0.0) += total;
        }
    }

    let mut drafts = Vec::new();
    for (asset, months) in &by_asset {
        // Paired returns on the asset's own month grid.
        let keys: Vec<YearMonth> = months.keys().copied().collect();
        let mut asset_returns = Vec::new();
        let mut market_returns = Vec::new();
        for pair in keys.windows(2) {
            let (prev_m, cur_m) = (pair[0], pair[1]);
            let a_prev = months[&prev_m];
            let m_prev = market.get(&prev_m).copied().unwrap_or(0.0);
            if a_prev.abs() < 1e-10 || m_prev.abs() < 1e-10 {
                continue;
            }
            asset_returns.push(months[&cur_m] / a_prev - 1.0);
            market_returns.push(market.get(&cur_m).copied().unwrap_or(0.0) / m_prev - 1.0);
        }
        if asset_returns.len() < cfg.beta_min_months {
            continue;
        }
        let market_var = stats::sample_variance(&market_returns);
        if market_var < 1e-10 {
            continue;
        }
        let Some(covariance) = stats::sample_covariance(&asset_returns, &market_returns) else {
            continue;
        };
        let asset_beta = covariance / market_var;
        let correlation = stats::pearson(&asset_returns, &market_returns);
        let annualized_vol = stats::sample_std(&asset_returns) * MONTHS_PER_YEAR.sqrt();

        let (profile, priority) = if asset_beta > cfg.beta_high {
            ("MUITO AGRESSIVO", Priority::High)
        } else if asset_beta > 1.0 {
            ("AGRESSIVO", Priority::Medium)
        } else if asset_beta > cfg.beta_low {
            ("MODERADO", Priority::Low)
        } else if asset_beta > 0.0 {
            ("CONSERVADOR", Priority::Low)
        } else {
            ("DEFENSIVO", Priority::Medium)
        };

        let short_history = asset_returns.len() < 6;
        if asset_beta.abs() <= cfg.beta_high && asset_beta.abs() >= cfg.beta_low && !short_history
        {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("beta".to_string(), json!(asset_beta));
        extra.insert("asset".to_string(), json!(asset));
        extra.insert("risk_profile".to_string(), json!(profile));
        extra.insert("correlation".to_string(), json!(correlation));
        extra.insert("annualized_vol".to_string(), json!(annualized_vol));
        extra.insert("months_analyzed".to_string(), json!(asset_returns.len()));

        let mut description = format!(
            "Beta de {asset_beta:.2} (faixa esperada: {:.1}-{:.1}).",
            cfg.beta_low, cfg.beta_high
        );
        if let Some(rho) = correlation {
            description.push_str(&format!(" Correlação com o mercado: {rho:.2}."));
        }
        description.push_str(&format!(
            " Volatilidade anualizada: {:.1}%.",
            annualized_vol * 100.0
        ));
        if short_history {
            description.push_str(&format!(
                " Análise baseada em apenas {} meses.",
                asset_returns.len()
            ));
        }

        drafts.push(AlertDraft {
            title: format!("Beta {profile} para {asset}"),
            description,
            kind: AlertKind::Risk,
            priority,
            category: Some(asset.clone()),
            value: asset_beta,
            occurred_at: ctx.current_month.first_instant(),
            source: "Beta",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Value-at-risk of total monthly expenses: the larger of the
/// parametric and historical estimates, against the latest return.
pub fn value_at_risk(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let totals = frame.monthly_expense_totals();
    if totals.len() < cfg.var_min_months {
        return Ok(Vec::new());
    }
    let months: Vec<YearMonth> = totals.keys().copied().collect();
    let values: Vec<f64> = totals.values().copied().collect();
    let returns = stats::pct_change(&values);
    if returns.len() < 2 {
        return Ok(Vec::new());
    }

    let confidence = match cfg.var_confidence {
        90 | 95 | 99 => cfg.var_confidence,
        _ => 95,
    };
    let tail = (100 - confidence) as f64 / 100.0;
    let mean_return = stats::mean(&returns);
    let return_std = stats::sample_std(&returns);
    let var_parametric = stats::one_sided_z(confidence) * return_std;
    let var_historical = -stats::quantile(&returns, tail);
    let var_final = var_parametric.max(var_historical);

    let last_return = returns[returns.len() - 1];
    if last_return >= -var_final {
        return Ok(Vec::new());
    }

    let last_month = months[months.len() - 1];
    let current_value = values[values.len() - 1];
    let priority = if confidence >= 95 {
        Priority::High
    } else {
        Priority::Medium
    };

    let mut extra = BTreeMap::new();
    extra.insert("confidence".to_string(), json!(confidence));
    extra.insert("var_parametric".to_string(), json!(var_parametric));
    extra.insert("var_historical".to_string(), json!(var_historical));
    extra.insert("last_return".to_string(), json!(last_return));
    extra.insert("mean_return".to_string(), json!(mean_return));
    extra.insert("volatility".to_string(), json!(return_std));
    extra.insert("months_analyzed".to_string(), json!(returns.len()));
    extra.insert("reference_month".to_string(), json!(last_month.to_string()));

    Ok(vec![AlertDraft {
        title: format!("Alerta de Risco Financeiro - VaR {confidence}%"),
        description: format!(
            "Retorno mensal de {:+.2}% está abaixo do VaR {confidence}% ({:.2}%). \
             Valor mensal: R${}, média histórica: {:+.2}%, volatilidade: {:.2}%.",
            last_return * 100.0,
            -var_final * 100.0,
            format_money(current_value),
            mean_return * 100.0,
            return_std * 100.0,
        ),
        kind: AlertKind::Risk,
        priority,
        category: Some("Risco Financeiro".to_string()),
        value: current_value,
        occurred_at: last_month.first_instant(),
        source: "VaR",
        extra,
        transaction_id: None,
    }])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entities::{CleanRow, DetectorConfig};
    use crate::value_objects::TransactionKind;

    fn asset_row(
        year: i32,
        month: u32,
        amount: f64,
        asset: &str,
        kind: TransactionKind,
    ) -> CleanRow {
        let date = NaiveDate::from_ymd_opt(year, month, 10)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        CleanRow {
            id: None,
            date,
            description: None,
            amount,
            abs_amount: amount.abs(),
            category: "Investimentos".to_string(),
            kind,
            asset: Some(asset.to_string()),
            payment_method: None,
            rate: None,
            indicator_1: None,
            indicator_2: None,
            year_month: YearMonth::new(year, month),
        }
    }

    fn expense_row(year: i32, month: u32, amount: f64, category: &str) -> CleanRow {
        let date = NaiveDate::from_ymd_opt(year, month, 10)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        CleanRow {
            id: None,
            date,
            description: None,
            amount,
            abs_amount: amount.abs(),
            category: category.to_string(),
            kind: TransactionKind::Expense,
            asset: None,
            payment_method: None,
            rate: None,
            indicator_1: None,
            indicator_2: None,
            year_month: YearMonth::new(year, month),
        }
    }

    fn ctx_at(config: &DetectorConfig, year: i32, month: u32) -> DetectorContext<'_> {
        let now = NaiveDate::from_ymd_opt(year, month, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        DetectorContext::new(config, now)
    }

    #[test]
    fn roi_fires_on_heavy_loss() {
        let config = DetectorConfig::default();
        // Two past months with income, current month invested 1000 and
        // only 200 back: ROI -80%.
        let frame = CleanFrame::new(vec![
            asset_row(2024, 5, 1000.0, "PETR4", TransactionKind::Expense),
            asset_row(2024, 5, 1100.0, "PETR4", TransactionKind::Income),
            asset_row(2024, 6, 1000.0, "PETR4", TransactionKind::Expense),
            asset_row(2024, 6, 1050.0, "PETR4", TransactionKind::Income),
            asset_row(2024, 7, 1000.0, "PETR4", TransactionKind::Expense),
            asset_row(2024, 7, 200.0, "PETR4", TransactionKind::Income),
        ]);
        let drafts = roi(&frame, &ctx_at(&config, 2024, 7)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.value, -800.0);
        assert!((draft.extra["roi"].as_f64().unwrap() + 0.8).abs() < 1e-9);
    }

    #[test]
    fn roi_skips_below_floor() {
        let config = DetectorConfig::default();
        // CDB floor is 1000; a 300 position is not judged.
        let frame = CleanFrame::new(vec![
            asset_row(2024, 7, 300.0, "CDB Liquidez", TransactionKind::Expense),
            asset_row(2024, 7, 10.0, "CDB Liquidez", TransactionKind::Income),
        ]);
        let drafts = roi(&frame, &ctx_at(&config, 2024, 7)).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn sharpe_flags_poor_risk_adjusted_asset() {
        let config = DetectorConfig::default();
        // Alternating gains and losses: mean return near zero, high
        // deviation, Sharpe well under 1.
        let values = [1000.0, 1200.0, 900.0, 1150.0, 880.0, 1100.0, 900.0, 1000.0];
        let rows: Vec<CleanRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| asset_row(2024, i as u32 + 1, v, "FUND11", TransactionKind::Income))
            .collect();
        let drafts = sharpe(&CleanFrame::new(rows), &ctx_at(&config, 2024, 8)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].category.as_deref(), Some("FUND11"));
        assert!(drafts[0].value < 1.0);
    }

    #[test]
    fn volatility_flags_erratic_category() {
        let config = DetectorConfig::default();
        let values = [100.0, 300.0, 80.0, 350.0, 90.0, 400.0, 100.0];
        let rows: Vec<CleanRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| expense_row(2024, i as u32 + 1, v, "Lazer"))
            .collect();
        let drafts = volatility(&CleanFrame::new(rows), &ctx_at(&config, 2024, 7)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].extra["volatility"].as_f64().unwrap() > 0.5);
    }

    #[test]
    fn single_asset_beta_is_one_and_quiet_with_history() {
        let config = DetectorConfig::default();
        let values = [1000.0, 1100.0, 1050.0, 1200.0, 1150.0, 1300.0, 1250.0, 1400.0];
        let rows: Vec<CleanRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| asset_row(2024, i as u32 + 1, v, "IVVB11", TransactionKind::Income))
            .collect();
        // The single asset IS the market: beta 1.0, enough history.
        let drafts = beta(&CleanFrame::new(rows), &ctx_at(&config, 2024, 8)).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn beta_flags_amplified_asset() {
        let config = DetectorConfig::default();
        // ALAV3 swings three times the shared pattern while BASE3 stays
        // flat, so ALAV3 amplifies the portfolio move (beta ~1.8).
        let swings = [0.0, 100.0, 0.0, 200.0, 50.0, 250.0, 100.0];
        let mut rows = Vec::new();
        for (i, &swing) in swings.iter().enumerate() {
            rows.push(asset_row(
                2024,
                i as u32 + 1,
                1000.0 + swing * 3.0,
                "ALAV3",
                TransactionKind::Income,
            ));
            rows.push(asset_row(2024, i as u32 + 1, 1000.0, "BASE3", TransactionKind::Income));
        }
        let drafts = beta(&CleanFrame::new(rows), &ctx_at(&config, 2024, 8)).unwrap();
        let flagged: Vec<_> = drafts
            .iter()
            .filter(|d| d.category.as_deref() == Some("ALAV3"))
            .collect();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].value > config.beta_high);
        assert_eq!(flagged[0].priority, Priority::High);
    }

    #[test]
    fn var_fires_on_crash_month() {
        let config = DetectorConfig::default();
        // Mild moves, then the last month collapses far past the VaR.
        let values = [1000.0, 1020.0, 990.0, 1010.0, 1000.0, 1030.0, 200.0];
        let rows: Vec<CleanRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| expense_row(2024, i as u32 + 1, v, "Geral"))
            .collect();
        let drafts = value_at_risk(&CleanFrame::new(rows), &ctx_at(&config, 2024, 7)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.occurred_at, YearMonth::new(2024, 7).first_instant());
        assert_eq!(draft.value, 200.0);
    }

    #[test]
    fn var_quiet_on_steady_months() {
        let config = DetectorConfig::default();
        let values = [1000.0, 1020.0, 990.0, 1010.0, 1000.0, 1030.0];
        let rows: Vec<CleanRow> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| expense_row(2024, i as u32 + 1, v, "Geral"))
            .collect();
        let drafts = value_at_risk(&CleanFrame::new(rows), &ctx_at(&config, 2024, 6)).unwrap();
        assert!(drafts.is_empty());
    }
}
