//! Econometric detectors: concentration, dependence, hypothesis tests,
//! trend fits, forecasting and seasonality.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde_json::json;

use crate::entities::AlertDraft;
use crate::services::arima::Arima111;
use crate::services::frame::CleanFrame;
use crate::services::stats;
use crate::utils::format_money;
use crate::value_objects::{AlertKind, Priority};

use super::DetectorContext;

/// Herfindahl-Hirschman concentration of current-month expenses.
pub fn hhi(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let rows = frame.rows_in_month(ctx.current_month);
    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total = 0.0;
    for row in rows.iter().filter(|r| r.kind.is_expense()) {
        *by_category.entry(row.category.as_str()).or_insert(0.0) += row.abs_amount;
        total += row.abs_amount;
    }
    if total <= 0.0 {
        return Ok(Vec::new());
    }

    let index: f64 = by_category
        .values()
        .map(|sum| (sum / total).powi(2))
        .sum();
    if index <= cfg.hhi_limit {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("hhi".to_string(), json!(index));
    extra.insert("total_spent".to_string(), json!(total));
    extra.insert(
        "categories".to_string(),
        json!(by_category.keys().collect::<Vec<_>>()),
    );
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Alta Concentração de Gastos".to_string(),
        description: format!(
            "Índice HHI de {index:.4} indica alta concentração de gastos em {}. \
             Total gasto: R${}.",
            ctx.current_month,
            format_money(total),
        ),
        kind: AlertKind::Risk,
        priority: Priority::Medium,
        category: None,
        value: total,
        occurred_at: ctx.current_month.first_instant(),
        source: "HHI",
        extra,
        transaction_id: None,
    }])
}

/// Pairwise correlation of monthly expense sums across categories.
/// Absent months count as zero so all series share the same grid.
pub fn category_correlation(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let by_category = frame.monthly_expense_by_category();
    if by_category.len() < 2 {
        return Ok(Vec::new());
    }

    let months: BTreeSet<_> = by_category
        .values()
        .flat_map(|m| m.keys().copied())
        .collect();
    if months.len() < 3 {
        return Ok(Vec::new());
    }

    let series: Vec<(&String, Vec<f64>)> = by_category
        .iter()
        .map(|(category, totals)| {
            let aligned: Vec<f64> = months
                .iter()
                .map(|m| totals.get(m).copied().unwrap_or(0.0))
                .collect();
            (category, aligned)
        })
        .collect();

    let mut drafts = Vec::new();
    for i in 0..series.len() {
        for j in (i + 1)..series.len() {
            let (cat_a, values_a) = &series[i];
            let (cat_b, values_b) = &series[j];
            let Some(rho) = stats::pearson(values_a, values_b) else {
                continue;
            };
            if rho.abs() <= cfg.corr_limit {
                continue;
            }

            let mut extra = BTreeMap::new();
            extra.insert("correlation".to_string(), json!(rho));
            extra.insert("category_1".to_string(), json!(cat_a));
            extra.insert("category_2".to_string(), json!(cat_b));
            extra.insert("months_compared".to_string(), json!(months.len()));
            extra.insert(
                "reference_month".to_string(),
                json!(ctx.current_month.to_string()),
            );

            drafts.push(AlertDraft {
                title: format!("Correlação Alta entre {cat_a} e {cat_b}"),
                description: format!(
                    "Correlação de {rho:.2} entre {cat_a} e {cat_b} nas somas mensais. \
                     Possível dependência nos gastos."
                ),
                kind: AlertKind::Anomaly,
                priority: Priority::Medium,
                category: None,
                value: rho,
                occurred_at: ctx.current_month.first_instant(),
                source: "CategoryCorrelation",
                extra,
                transaction_id: None,
            });
        }
    }
    Ok(drafts)
}

/// One-way ANOVA across expense categories.
pub fn anova(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in frame.rows().iter().filter(|r| r.kind.is_expense()) {
        groups.entry(row.category.as_str()).or_default().push(row.amount);
    }
    let categories: Vec<&str> = groups.keys().copied().collect();
    let samples: Vec<Vec<f64>> = groups.into_values().collect();
    let Some((f_stat, p_value)) = stats::one_way_anova(&samples) else {
        return Ok(Vec::new());
    };
    if p_value >= cfg.p_value_limit {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("f_stat".to_string(), json!(f_stat));
    extra.insert("p_value".to_string(), json!(p_value));
    extra.insert("categories".to_string(), json!(categories));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Diferenças Significativas entre Categorias".to_string(),
        description: format!(
            "Teste ANOVA detectou diferenças significativas (p-valor: {p_value:.4}) \
             entre categorias em despesas."
        ),
        kind: AlertKind::Anomaly,
        priority: Priority::Medium,
        category: None,
        value: f_stat,
        occurred_at: ctx.current_month.first_instant(),
        source: "ANOVA",
        extra,
        transaction_id: None,
    }])
}

/// Welch t-test between expense and income amounts.
pub fn t_test(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let expenses: Vec<f64> = frame
        .rows()
        .iter()
        .filter(|r| r.kind.is_expense())
        .map(|r| r.amount)
        .collect();
    let incomes: Vec<f64> = frame
        .rows()
        .iter()
        .filter(|r| r.kind.is_income())
        .map(|r| r.amount)
        .collect();
    let Some((t_stat, p_value)) = stats::welch_t_test(&expenses, &incomes) else {
        return Ok(Vec::new());
    };
    if p_value >= cfg.p_value_limit {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("t_stat".to_string(), json!(t_stat));
    extra.insert("p_value".to_string(), json!(p_value));
    extra.insert("expense_mean".to_string(), json!(stats::mean(&expenses)));
    extra.insert("income_mean".to_string(), json!(stats::mean(&incomes)));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Diferença Significativa entre Despesa e Receita".to_string(),
        description: format!(
            "Teste t detectou diferença significativa (p-valor: {p_value:.4}) \
             entre médias de despesa e receita."
        ),
        kind: AlertKind::Anomaly,
        priority: Priority::Medium,
        category: None,
        value: t_stat,
        occurred_at: ctx.current_month.first_instant(),
        source: "TTest",
        extra,
        transaction_id: None,
    }])
}

/// Residual of the current month against a linear fit of the monthly
/// category totals.
pub fn linear_regression(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < cfg.regression_months {
            continue;
        }
        let keys: Vec<_> = months.keys().copied().collect();
        let values: Vec<f64> = months.values().copied().collect();
        let Some(position) = keys.iter().position(|m| *m == ctx.current_month) else {
            continue;
        };
        let Some((slope, intercept)) = stats::linear_fit(&values) else {
            continue;
        };
        let residuals: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, v)| v - (slope * i as f64 + intercept))
            .collect();
        let limit = cfg.residual_k * stats::population_std(&residuals);
        let residual = residuals[position];
        if residual.abs() <= limit {
            continue;
        }
        let predicted = slope * position as f64 + intercept;
        let current = values[position];

        let mut extra = BTreeMap::new();
        extra.insert("residual".to_string(), json!(residual));
        extra.insert("predicted".to_string(), json!(predicted));
        extra.insert("slope".to_string(), json!(slope));
        extra.insert("months_analyzed".to_string(), json!(values.len()));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("Desvio de Tendência em {category}"),
            description: format!(
                "Valor de R${} em {category} em {} desvia da tendência linear \
                 (predito: R${}).",
                format_money(current),
                ctx.current_month,
                format_money(predicted),
            ),
            kind: AlertKind::Trend,
            priority: Priority::Medium,
            category: Some(category.clone()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "LinearRegression",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// ARIMA(1,1,1) one-step band per expense category: the band is fitted
/// on the series without its latest month so the tested value cannot
/// widen its own interval.
pub fn arima_forecast(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for (category, months) in frame.monthly_expense_by_category() {
        if months.len() < cfg.arima_months {
            continue;
        }
        let keys: Vec<_> = months.keys().copied().collect();
        let values: Vec<f64> = months.values().copied().collect();
        let (latest, fit_series) = match values.split_last() {
            Some(split) => split,
            None => continue,
        };
        let latest_month = keys[keys.len() - 1];

        let mut model = Arima111::new();
        if model.fit(fit_series).is_err() {
            continue;
        }
        let band = model.forecast_one(0.95)?;
        if band.contains(*latest) {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("forecast".to_string(), json!(band.forecast));
        extra.insert("lower".to_string(), json!(band.lower));
        extra.insert("upper".to_string(), json!(band.upper));
        extra.insert("confidence_level".to_string(), json!(band.confidence_level));
        extra.insert("months_analyzed".to_string(), json!(values.len()));
        extra.insert("reference_month".to_string(), json!(latest_month.to_string()));

        drafts.push(AlertDraft {
            title: format!("Previsão Anormal em {category}"),
            description: format!(
                "Valor de R${} em {category} em {latest_month} está fora do intervalo \
                 previsto: R${} a R${}.",
                format_money(*latest),
                format_money(band.lower),
                format_money(band.upper),
            ),
            kind: AlertKind::Forecast,
            priority: Priority::High,
            category: Some(category.clone()),
            value: *latest,
            occurred_at: latest_month.first_instant(),
            source: "ARIMA",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Per-month-of-year expense pattern: the current month's total against
/// the mean of the monthly pattern, with a dampening factor when the
/// pattern rests on few months.
pub fn seasonality(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    let mut per_category: BTreeMap<&str, BTreeMap<u32, f64>> = BTreeMap::new();
    for row in frame.rows().iter().filter(|r| r.kind.is_expense()) {
        *per_category
            .entry(row.category.as_str())
            .or_default()
            .entry(row.year_month.month)
            .or_insert(0.0) += row.abs_amount;
    }

    for (category, by_month) in per_category {
        if by_month.len() < cfg.seasonality_min_months {
            continue;
        }
        let sums: Vec<f64> = by_month.values().copied().collect();
        let mean = stats::mean(&sums);
        let std = stats::sample_std(&sums).max(0.01);
        let current = by_month
            .get(&ctx.current_month.month)
            .or_else(|| by_month.values().next_back())
            .copied()
            .unwrap_or(0.0);

        let damping = (by_month.len() as f64 / 6.0).min(1.0);
        let upper = mean + cfg.seasonality_k * std * damping;
        let lower = mean - cfg.seasonality_k * std * damping;
        if current <= upper && current >= lower {
            continue;
        }

        let above = current > upper;
        let (priority, label) = if above {
            (Priority::High, "ALTA")
        } else {
            (Priority::Medium, "BAIXA")
        };
        let deviation_pct = if mean > 1e-10 {
            (current / mean - 1.0) * 100.0
        } else {
            0.0
        };

        let mut extra = BTreeMap::new();
        extra.insert("seasonal_mean".to_string(), json!(mean));
        extra.insert("seasonal_std".to_string(), json!(std));
        extra.insert("upper_limit".to_string(), json!(upper));
        extra.insert("lower_limit".to_string(), json!(lower));
        extra.insert("month_of_year".to_string(), json!(ctx.current_month.month));
        extra.insert("months_observed".to_string(), json!(by_month.len()));

        drafts.push(AlertDraft {
            title: format!("Sazonalidade Anormal em {category} - {label}"),
            description: format!(
                "Despesa de R${} em {category} no mês {} está {:.1}% {} da média mensal \
                 (R${}).",
                format_money(current),
                ctx.current_month.month,
                deviation_pct.abs(),
                if above { "acima" } else { "abaixo" },
                format_money(mean),
            ),
            kind: AlertKind::Seasonality,
            priority,
            category: Some(category.to_string()),
            value: current,
            occurred_at: ctx.current_month.first_instant(),
            source: "Seasonality",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}
