//! Monthly budget and balance detectors. All of them aggregate by
//! calendar month and stamp the first instant of the month they judge.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::entities::AlertDraft;
use crate::services::frame::CleanFrame;
use crate::services::stats;
use crate::utils::format_money;
use crate::value_objects::{AlertKind, Priority};

use super::DetectorContext;

/// Current-month expense total per category against its own history:
/// graded by how far past the historical mean it lands, with the 90th
/// percentile and the growth trend as softer tiers.
pub fn budget(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < cfg.budget_months + 1 {
            continue;
        }
        let Some(&current) = months.get(&ctx.current_month) else {
            continue;
        };
        let history: Vec<f64> = months
            .iter()
            .filter(|(m, _)| **m < ctx.current_month)
            .map(|(_, v)| *v)
            .collect();
        let start = history.len().saturating_sub(cfg.budget_months);
        let history = &history[start..];
        if history.len() < cfg.budget_months {
            continue;
        }

        let mean = stats::mean(history);
        let median = stats::median(history);
        let std = stats::sample_std(history);
        let pctl = stats::quantile(history, cfg.budget_pctl);
        let mild_limit = mean * (1.0 + cfg.budget_over_mild);
        let severe_limit = mean * (1.0 + cfg.budget_over_severe);

        let trend_pct = stats::linear_fit(history)
            .map(|(slope, _)| if mean > 1e-10 { slope / mean * 100.0 } else { 0.0 })
            .unwrap_or(0.0);

        let (priority, reason) = if current > severe_limit {
            (
                Priority::High,
                format!(
                    "excedeu o limite grave de {:.0}% acima da média",
                    cfg.budget_over_severe * 100.0
                ),
            )
        } else if current > mild_limit {
            (
                Priority::Medium,
                format!(
                    "excedeu o limite de {:.0}% acima da média",
                    cfg.budget_over_mild * 100.0
                ),
            )
        } else if current > pctl {
            (
                Priority::Low,
                format!(
                    "valor acima do {:.0}º percentil histórico",
                    cfg.budget_pctl * 100.0
                ),
            )
        } else if trend_pct > cfg.growth_limit * 100.0 {
            (
                Priority::Medium,
                format!("tendência de crescimento acentuado (+{trend_pct:.1}% ao mês)"),
            )
        } else {
            continue;
        };

        let pct_over = if mean > 1e-10 {
            (current - mean) / mean * 100.0
        } else {
            0.0
        };

        let mut extra = BTreeMap::new();
        extra.insert("historical_mean".to_string(), json!(mean));
        extra.insert("historical_median".to_string(), json!(median));
        extra.insert("historical_std".to_string(), json!(std));
        extra.insert("percentile_limit".to_string(), json!(pctl));
        extra.insert("pct_over_mean".to_string(), json!(pct_over));
        extra.insert("trend_pct_per_month".to_string(), json!(trend_pct));
        extra.insert("mild_limit".to_string(), json!(mild_limit));
        extra.insert("severe_limit".to_string(), json!(severe_limit));
        extra.insert("months_analyzed".to_string(), json!(history.len()));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        let prefix = if priority == Priority::High {
            "ALERTA GRAVE: "
        } else {
            ""
        };
        drafts.push(AlertDraft {
            title: format!("{prefix}Excesso Orçamentário em {category}"),
            description: format!(
                "Despesa em {category} {reason}. Valor atual: R${}, média histórica: R${} \
                 (últimos {} meses), mediana: R${}, desvio padrão: R${}.",
                format_money(current),
                format_money(mean),
                history.len(),
                format_money(median),
                format_money(std),
            ),
            kind: AlertKind::Budget,
            priority,
            category: Some(category.clone()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "Budget",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Current month against the historical mean plus k deviations.
pub fn sigma_band(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < cfg.min_group_size {
            continue;
        }
        let Some(&current) = months.get(&ctx.current_month) else {
            continue;
        };
        let history: Vec<f64> = months
            .iter()
            .filter(|(m, _)| **m < ctx.current_month)
            .map(|(_, v)| *v)
            .collect();
        let start = history.len().saturating_sub(cfg.sigma_months);
        let history = &history[start..];
        if history.len() < 3 {
            continue;
        }

        let mean = stats::mean(history);
        let median = stats::median(history);
        let std = stats::sample_std(history).max(0.01);
        let variation_coeff = if mean > 1e-10 { std / mean * 100.0 } else { 0.0 };
        let mild_limit = mean + cfg.sigma_mild * std;
        let severe_limit = mean + cfg.sigma_severe * std;
        let p95 = stats::quantile(history, 0.95);

        let trend_pct = stats::linear_fit(history)
            .map(|(slope, _)| if mean > 1e-10 { slope / mean * 100.0 } else { 0.0 })
            .unwrap_or(0.0);

        let (priority, reason) = if current > severe_limit {
            (
                Priority::High,
                format!("valor excedeu {} desvios padrão da média", cfg.sigma_severe),
            )
        } else if current > mild_limit {
            (
                Priority::Medium,
                format!("valor excedeu {} desvios padrão da média", cfg.sigma_mild),
            )
        } else if current > p95 {
            (
                Priority::Low,
                "valor acima do 95º percentil histórico".to_string(),
            )
        } else if trend_pct > cfg.growth_limit * 100.0 {
            (
                if trend_pct > 30.0 {
                    Priority::Medium
                } else {
                    Priority::Low
                },
                format!("tendência de crescimento de {trend_pct:.1}% ao mês"),
            )
        } else {
            continue;
        };

        let mut extra = BTreeMap::new();
        extra.insert("historical_mean".to_string(), json!(mean));
        extra.insert("historical_median".to_string(), json!(median));
        extra.insert("historical_std".to_string(), json!(std));
        extra.insert("variation_coeff_pct".to_string(), json!(variation_coeff));
        extra.insert("p95".to_string(), json!(p95));
        extra.insert("mild_limit".to_string(), json!(mild_limit));
        extra.insert("severe_limit".to_string(), json!(severe_limit));
        extra.insert("trend_pct_per_month".to_string(), json!(trend_pct));
        extra.insert("months_analyzed".to_string(), json!(history.len()));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("Desvio em {category}"),
            description: format!(
                "{reason}. Valor atual: R${}, média histórica: R${} (últimos {} meses), \
                 desvio padrão: R${} (CV: {variation_coeff:.1}%).",
                format_money(current),
                format_money(mean),
                history.len(),
                format_money(std),
            ),
            kind: AlertKind::Anomaly,
            priority,
            category: Some(category.clone()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "SigmaBand",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Monthly expense/income ratio: level tiers, trend, income drops,
/// expense jumps and distance from the historical mean. Every triggered
/// branch contributes to one draft.
pub fn expense_income_ratio(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let pivot = frame.monthly_income_expense();

    let ratios: BTreeMap<_, f64> = pivot
        .iter()
        .filter(|(_, t)| t.income > 0.0)
        .map(|(m, t)| (*m, t.expense / t.income))
        .collect();
    if ratios.len() < 3 {
        return Ok(Vec::new());
    }
    let Some(&current_ratio) = ratios.get(&ctx.current_month) else {
        return Ok(Vec::new());
    };
    let current = pivot[&ctx.current_month];

    let history: Vec<f64> = ratios
        .iter()
        .filter(|(m, _)| **m < ctx.current_month)
        .map(|(_, r)| *r)
        .collect();
    let start = history.len().saturating_sub(cfg.ratio_months);
    let history = &history[start..];
    if history.len() < 3 {
        return Ok(Vec::new());
    }

    let mean = stats::mean(history);
    let median = stats::median(history);
    let std = stats::sample_std(history).max(0.01);
    let max_hist = history.iter().cloned().fold(f64::MIN, f64::max);
    let min_hist = history.iter().cloned().fold(f64::MAX, f64::min);
    let (slope, intercept) = stats::linear_fit(history).unwrap_or((0.0, mean));
    let next_forecast = slope * history.len() as f64 + intercept;

    let prev_month = ctx.current_month.prev();
    let prev_ratio = ratios.get(&prev_month).copied();
    let prev_totals = pivot.get(&prev_month);
    let income_change = prev_totals.and_then(|p| {
        if p.income.abs() < 1e-10 {
            None
        } else {
            Some(current.income / p.income - 1.0)
        }
    });
    let expense_change = prev_totals.and_then(|p| {
        if p.expense.abs() < 1e-10 {
            None
        } else {
            Some(current.expense / p.expense - 1.0)
        }
    });
    let monthly_variation = prev_ratio.and_then(|p| {
        if p > 1e-10 {
            Some(current_ratio / p - 1.0)
        } else {
            None
        }
    });

    let mut triggers: Vec<String> = Vec::new();
    let mut priority = Priority::Low;

    if current_ratio >= cfg.ratio_critical {
        triggers.push(format!(
            "proporção crítica de {:.1}% (acima de {:.0}%)",
            current_ratio * 100.0,
            cfg.ratio_critical * 100.0
        ));
        priority = priority.escalate(Priority::Critical);
    } else if current_ratio >= cfg.ratio_alert {
        triggers.push(format!(
            "proporção elevada de {:.1}% (acima de {:.0}%)",
            current_ratio * 100.0,
            cfg.ratio_alert * 100.0
        ));
        priority = priority.escalate(Priority::High);
    } else if current_ratio >= cfg.ratio_attention {
        triggers.push(format!(
            "proporção em atenção: {:.1}% (acima de {:.0}%)",
            current_ratio * 100.0,
            cfg.ratio_attention * 100.0
        ));
        priority = priority.escalate(Priority::Medium);
    }

    if slope > cfg.ratio_trend {
        triggers.push(format!(
            "tendência de piora: aumento de {:.1} p.p. ao mês na proporção",
            slope * 100.0
        ));
        priority = priority.escalate(Priority::Medium);
    }

    if let Some(drop) = income_change {
        if drop < -cfg.income_drop {
            triggers.push(format!(
                "queda significativa na receita: {:.1}% em relação ao mês anterior",
                drop * 100.0
            ));
            priority = priority.escalate(Priority::High);
        }
    }

    if let Some(jump) = expense_change {
        if jump > cfg.expense_jump {
            triggers.push(format!(
                "aumento significativo nas despesas: {:.1}% em relação ao mês anterior",
                jump * 100.0
            ));
            priority = priority.escalate(Priority::High);
        }
    }

    if current_ratio > mean * 1.2 {
        triggers.push(format!(
            "proporção atual {:.1}% está acima da média histórica de {:.1}%",
            current_ratio * 100.0,
            mean * 100.0
        ));
        priority = priority.escalate(Priority::Medium);
    }

    if triggers.is_empty() {
        return Ok(Vec::new());
    }

    let balance = current.income - current.expense;
    let title_prefix = match priority {
        Priority::Critical => "CRÍTICO: ",
        Priority::High => "ALTO: ",
        Priority::Medium => "ATENÇÃO: ",
        Priority::Low => "",
    };

    let mut description = format!(
        "Receita: R${}, despesa: R${}, saldo: R${} ({}). Proporção atual: {:.1}%, \
         média histórica: {:.1}% (últimos {} meses).",
        format_money(current.income),
        format_money(current.expense),
        format_money(balance),
        if balance < 0.0 { "DÉFICIT" } else { "SUPERÁVIT" },
        current_ratio * 100.0,
        mean * 100.0,
        history.len(),
    );
    for (i, trigger) in triggers.iter().enumerate() {
        description.push_str(&format!(" {}. {trigger}.", i + 1));
    }

    let mut extra = BTreeMap::new();
    extra.insert("current_ratio".to_string(), json!(current_ratio));
    extra.insert("current_income".to_string(), json!(current.income));
    extra.insert("current_expense".to_string(), json!(current.expense));
    extra.insert("current_balance".to_string(), json!(balance));
    extra.insert("historical_mean".to_string(), json!(mean));
    extra.insert("historical_median".to_string(), json!(median));
    extra.insert("historical_std".to_string(), json!(std));
    extra.insert("historical_max".to_string(), json!(max_hist));
    extra.insert("historical_min".to_string(), json!(min_hist));
    extra.insert("monthly_trend".to_string(), json!(slope));
    extra.insert("next_month_forecast".to_string(), json!(next_forecast));
    extra.insert("income_change".to_string(), json!(income_change));
    extra.insert("expense_change".to_string(), json!(expense_change));
    extra.insert("monthly_variation".to_string(), json!(monthly_variation));
    extra.insert("months_analyzed".to_string(), json!(history.len()));
    extra.insert("triggers".to_string(), json!(triggers));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: format!(
            "{title_prefix}Proporção Despesa/Receita em {:.1}%",
            current_ratio * 100.0
        ),
        description,
        kind: AlertKind::Budget,
        priority,
        category: Some("Geral".to_string()),
        value: current_ratio,
        occurred_at: ctx.current_month.first_instant(),
        source: "ExpenseIncomeRatio",
        extra,
        transaction_id: None,
    }])
}

/// Month-over-month growth of expense categories.
pub fn mom_growth(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < 2 {
            continue;
        }
        let Some(&current) = months.get(&ctx.current_month) else {
            continue;
        };
        let Some((_, &previous)) = months.range(..ctx.current_month).next_back() else {
            continue;
        };
        if previous <= 0.0 {
            continue;
        }
        let growth = (current - previous) / previous;
        if growth <= cfg.growth_limit {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("growth_pct".to_string(), json!(growth));
        extra.insert("previous_total".to_string(), json!(previous));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("Crescimento Anormal em {category}"),
            description: format!(
                "Crescimento de {:.2}% em {category} em {}. Valor atual: R${}, anterior: R${}.",
                growth * 100.0,
                ctx.current_month,
                format_money(current),
                format_money(previous),
            ),
            kind: AlertKind::Trend,
            priority: Priority::Medium,
            category: Some(category.clone()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "MoMGrowth",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Current-month income minus expenses below zero.
pub fn negative_balance(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let pivot = frame.monthly_income_expense();
    let Some(current) = pivot.get(&ctx.current_month) else {
        return Ok(Vec::new());
    };
    let balance = current.income - current.expense;
    if balance >= 0.0 {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("balance".to_string(), json!(balance));
    extra.insert("expense".to_string(), json!(current.expense));
    extra.insert("income".to_string(), json!(current.income));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Saldo Negativo Detectado".to_string(),
        description: format!(
            "Saldo negativo de R${} em {}. Despesa: R${}, receita: R${}.",
            format_money(balance.abs()),
            ctx.current_month,
            format_money(current.expense),
            format_money(current.income),
        ),
        kind: AlertKind::Budget,
        priority: Priority::High,
        category: None,
        value: balance,
        occurred_at: ctx.current_month.first_instant(),
        source: "NegativeBalance",
        extra,
        transaction_id: None,
    }])
}

/// Current-month income/expense ratio below one.
pub fn liquidity(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let pivot = frame.monthly_income_expense();
    let Some(current) = pivot.get(&ctx.current_month) else {
        return Ok(Vec::new());
    };
    if current.expense <= 0.0 {
        return Ok(Vec::new());
    }
    let ratio = current.income / current.expense;
    if ratio >= 1.0 {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("liquidity_ratio".to_string(), json!(ratio));
    extra.insert("income".to_string(), json!(current.income));
    extra.insert("expense".to_string(), json!(current.expense));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Baixa Liquidez Detectada".to_string(),
        description: format!(
            "Razão de liquidez de {ratio:.2} em {}. Receitas: R${}, despesas: R${}.",
            ctx.current_month,
            format_money(current.income),
            format_money(current.expense),
        ),
        kind: AlertKind::Risk,
        priority: Priority::High,
        category: None,
        value: current.income - current.expense,
        occurred_at: ctx.current_month.first_instant(),
        source: "Liquidity",
        extra,
        transaction_id: None,
    }])
}

/// Current-month profit margin below the configured floor.
pub fn margin(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let pivot = frame.monthly_income_expense();
    let Some(current) = pivot.get(&ctx.current_month) else {
        return Ok(Vec::new());
    };
    if current.income <= 0.0 {
        return Ok(Vec::new());
    }
    let profit_margin = (current.income - current.expense) / current.income;
    if profit_margin >= cfg.margin_limit {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("margin".to_string(), json!(profit_margin));
    extra.insert("income".to_string(), json!(current.income));
    extra.insert("expense".to_string(), json!(current.expense));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Margem de Lucro Baixa".to_string(),
        description: format!(
            "Margem de lucro de {:.2}% em {}. Receitas: R${}, despesas: R${}.",
            profit_margin * 100.0,
            ctx.current_month,
            format_money(current.income),
            format_money(current.expense),
        ),
        kind: AlertKind::Budget,
        priority: Priority::High,
        category: None,
        value: current.income - current.expense,
        occurred_at: ctx.current_month.first_instant(),
        source: "Margin",
        extra,
        transaction_id: None,
    }])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entities::{CleanRow, DetectorConfig};
    use crate::value_objects::{TransactionKind, YearMonth};

    fn row(year: i32, month: u32, day: u32, amount: f64, kind: TransactionKind) -> CleanRow {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        CleanRow {
            id: None,
            date,
            description: None,
            amount,
            abs_amount: amount.abs(),
            category: "Transport".to_string(),
            kind,
            asset: None,
            payment_method: None,
            rate: None,
            indicator_1: None,
            indicator_2: None,
            year_month: YearMonth::from_datetime(date),
        }
    }

    fn ctx_july(config: &DetectorConfig) -> DetectorContext<'_> {
        let now = NaiveDate::from_ymd_opt(2024, 7, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        DetectorContext::new(config, now)
    }

    fn budget_frame(current: f64) -> CleanFrame {
        let history = [300.0, 310.0, 290.0, 305.0, 315.0, 320.0];
        let mut rows: Vec<CleanRow> = history
            .iter()
            .enumerate()
            .map(|(i, &v)| row(2024, i as u32 + 1, 10, v, TransactionKind::Expense))
            .collect();
        rows.push(row(2024, 7, 10, current, TransactionKind::Expense));
        CleanFrame::new(rows)
    }

    #[test]
    fn budget_grades_severe_overrun_high() {
        let config = DetectorConfig::default();
        let drafts = budget(&budget_frame(500.0), &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.source, "Budget");
        // 500 is 63% over the 306.67 mean, past the 50% severe tier.
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.value, 500.0);
        assert_eq!(
            draft.occurred_at,
            YearMonth::new(2024, 7).first_instant()
        );
    }

    #[test]
    fn budget_grades_mild_overrun_medium() {
        let config = DetectorConfig::default();
        let drafts = budget(&budget_frame(380.0), &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].priority, Priority::Medium);
    }

    #[test]
    fn budget_needs_full_history() {
        let config = DetectorConfig::default();
        let mut rows: Vec<CleanRow> = (4..=6)
            .map(|m| row(2024, m, 10, 300.0, TransactionKind::Expense))
            .collect();
        rows.push(row(2024, 7, 10, 900.0, TransactionKind::Expense));
        let drafts = budget(&CleanFrame::new(rows), &ctx_july(&config)).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn sigma_band_flags_three_sigma_breach() {
        let config = DetectorConfig::default();
        let drafts = sigma_band(&budget_frame(500.0), &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        // std of the history is ~10.8, so 500 is far past mean + 3 sigma.
        assert_eq!(drafts[0].priority, Priority::High);
        assert_eq!(drafts[0].source, "SigmaBand");
    }

    #[test]
    fn negative_balance_on_deficit_month() {
        let config = DetectorConfig::default();
        let frame = CleanFrame::new(vec![
            row(2024, 7, 1, 1000.0, TransactionKind::Income),
            row(2024, 7, 5, 1500.0, TransactionKind::Expense),
        ]);
        let drafts = negative_balance(&frame, &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.value, -500.0);
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.source, "NegativeBalance");
    }

    #[test]
    fn liquidity_and_margin_share_the_balance_value() {
        let config = DetectorConfig::default();
        let frame = CleanFrame::new(vec![
            row(2024, 7, 1, 1000.0, TransactionKind::Income),
            row(2024, 7, 5, 1500.0, TransactionKind::Expense),
        ]);
        let liq = liquidity(&frame, &ctx_july(&config)).unwrap();
        let mar = margin(&frame, &ctx_july(&config)).unwrap();
        assert_eq!(liq[0].value, -500.0);
        assert_eq!(mar[0].value, -500.0);
        assert_eq!(liq[0].occurred_at, mar[0].occurred_at);
    }

    #[test]
    fn ratio_detector_fires_critical_above_one() {
        let config = DetectorConfig::default();
        let mut rows = Vec::new();
        for m in 3..=6 {
            rows.push(row(2024, m, 1, 2000.0, TransactionKind::Income));
            rows.push(row(2024, m, 15, 1000.0, TransactionKind::Expense));
        }
        rows.push(row(2024, 7, 1, 1000.0, TransactionKind::Income));
        rows.push(row(2024, 7, 15, 1500.0, TransactionKind::Expense));
        let drafts = expense_income_ratio(&CleanFrame::new(rows), &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.priority, Priority::Critical);
        assert_eq!(draft.category.as_deref(), Some("Geral"));
        assert!((draft.value - 1.5).abs() < 1e-9);
        let triggers = draft.extra["triggers"].as_array().unwrap();
        // Critical level, income drop, expense jump and above-mean all fire.
        assert!(triggers.len() >= 3);
    }

    #[test]
    fn mom_growth_compares_against_previous_month() {
        let config = DetectorConfig::default();
        let frame = CleanFrame::new(vec![
            row(2024, 6, 10, 320.0, TransactionKind::Expense),
            row(2024, 7, 10, 500.0, TransactionKind::Expense),
        ]);
        let drafts = mom_growth(&frame, &ctx_july(&config)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert!((drafts[0].extra["growth_pct"].as_f64().unwrap() - 0.5625).abs() < 1e-9);
    }
}
