//! Behavioral and operational detectors.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Timelike};
use serde_json::json;

use crate::entities::AlertDraft;
use crate::services::frame::CleanFrame;
use crate::services::stats;
use crate::utils::{format_money, format_timestamp};
use crate::value_objects::{AlertKind, Priority};

use super::DetectorContext;

/// Large amounts moved outside normal hours.
pub fn fraud(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let mut drafts = Vec::new();

    for row in frame.rows() {
        let hour = row.date.hour();
        if row.abs_amount <= cfg.fraud_amount {
            continue;
        }
        if hour >= cfg.fraud_hour_start && hour <= cfg.fraud_hour_end {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("hour".to_string(), json!(hour));
        extra.insert("amount".to_string(), json!(row.abs_amount));

        drafts.push(AlertDraft {
            title: "Possível Fraude Detectada".to_string(),
            description: format!(
                "Transação de R${} em {} realizada em horário atípico \
                 (fora do intervalo {:02}:00-{:02}:00).",
                format_money(row.abs_amount),
                row.date.format("%d/%m/%Y %H:%M"),
                cfg.fraud_hour_start,
                cfg.fraud_hour_end,
            ),
            kind: AlertKind::Fraud,
            priority: Priority::High,
            category: Some(row.category.clone()),
            value: row.abs_amount,
            occurred_at: row.date,
            source: "Fraud",
            extra,
            transaction_id: row.id.clone(),
        });
    }
    Ok(drafts)
}

/// Payment-method share of the current month against the full history.
pub fn payment_mix(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;

    let mut current: BTreeMap<&str, f64> = BTreeMap::new();
    let mut current_total = 0usize;
    let mut historical: BTreeMap<&str, f64> = BTreeMap::new();
    let mut historical_total = 0usize;

    for row in frame.rows() {
        let Some(method) = row.payment_method.as_deref() else {
            continue;
        };
        if row.year_month == ctx.current_month {
            *current.entry(method).or_insert(0.0) += 1.0;
            current_total += 1;
        } else if row.year_month < ctx.current_month {
            *historical.entry(method).or_insert(0.0) += 1.0;
            historical_total += 1;
        }
    }
    if current_total == 0 || historical_total == 0 {
        return Ok(Vec::new());
    }

    let mut drafts = Vec::new();
    for (method, count) in &current {
        let current_share = count / current_total as f64;
        let historical_share =
            historical.get(method).copied().unwrap_or(0.0) / historical_total as f64;
        let drift = current_share - historical_share;
        if drift <= cfg.payment_drift {
            continue;
        }

        let mut extra = BTreeMap::new();
        extra.insert("payment_method".to_string(), json!(method));
        extra.insert("drift".to_string(), json!(drift));
        extra.insert("current_share".to_string(), json!(current_share));
        extra.insert("historical_share".to_string(), json!(historical_share));
        extra.insert(
            "reference_month".to_string(),
            json!(ctx.current_month.to_string()),
        );

        drafts.push(AlertDraft {
            title: format!("Mudança na Forma de Pagamento {method}"),
            description: format!(
                "Uso de {method} aumentou {:.2} pontos percentuais em {} em relação à \
                 média histórica ({:.1}% contra {:.1}%).",
                drift * 100.0,
                ctx.current_month,
                current_share * 100.0,
                historical_share * 100.0,
            ),
            kind: AlertKind::Behavior,
            priority: Priority::Medium,
            category: None,
            value: drift,
            occurred_at: ctx.current_month.first_instant(),
            source: "PaymentMix",
            extra,
            transaction_id: None,
        });
    }
    Ok(drafts)
}

/// Gap between the average income date and the average expense date in
/// the current month.
pub fn operational_cycle(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let rows = frame.rows_in_month(ctx.current_month);

    let expense_dates: Vec<NaiveDateTime> = rows
        .iter()
        .filter(|r| r.kind.is_expense())
        .map(|r| r.date)
        .collect();
    let income_dates: Vec<NaiveDateTime> = rows
        .iter()
        .filter(|r| r.kind.is_income())
        .map(|r| r.date)
        .collect();
    if expense_dates.is_empty() || income_dates.is_empty() {
        return Ok(Vec::new());
    }

    let mean_expense = mean_datetime(&expense_dates);
    let mean_income = mean_datetime(&income_dates);
    let cycle_days = (mean_income - mean_expense).num_days();
    if cycle_days <= cfg.cycle_days {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("cycle_days".to_string(), json!(cycle_days));
    extra.insert(
        "mean_expense_date".to_string(),
        json!(format_timestamp(mean_expense)),
    );
    extra.insert(
        "mean_income_date".to_string(),
        json!(format_timestamp(mean_income)),
    );
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Ciclo Operacional Longo".to_string(),
        description: format!(
            "Ciclo operacional de {cycle_days} dias em {} excede o limite. Média das \
             despesas: {}, média das receitas: {}.",
            ctx.current_month,
            mean_expense.format("%d/%m/%Y"),
            mean_income.format("%d/%m/%Y"),
        ),
        kind: AlertKind::Operational,
        priority: Priority::Medium,
        category: None,
        value: cycle_days as f64,
        occurred_at: ctx.current_month.first_instant(),
        source: "OperationalCycle",
        extra,
        transaction_id: None,
    }])
}

/// Average transaction rate of the current month above the limit.
pub fn operational_risk(frame: &CleanFrame, ctx: &DetectorContext) -> Result<Vec<AlertDraft>> {
    let cfg = ctx.config;
    let rates: Vec<f64> = frame
        .rows_in_month(ctx.current_month)
        .iter()
        .filter_map(|r| r.rate)
        .collect();
    if rates.is_empty() {
        return Ok(Vec::new());
    }
    let mean_rate = stats::mean(&rates);
    if mean_rate <= cfg.rate_limit {
        return Ok(Vec::new());
    }

    let mut extra = BTreeMap::new();
    extra.insert("mean_rate".to_string(), json!(mean_rate));
    extra.insert("rate_limit".to_string(), json!(cfg.rate_limit));
    extra.insert("samples".to_string(), json!(rates.len()));
    extra.insert(
        "reference_month".to_string(),
        json!(ctx.current_month.to_string()),
    );

    Ok(vec![AlertDraft {
        title: "Risco Operacional Elevado".to_string(),
        description: format!(
            "Média de taxas de {mean_rate:.4} em {} excede o limite de {:.4}.",
            ctx.current_month, cfg.rate_limit,
        ),
        kind: AlertKind::Risk,
        priority: Priority::Medium,
        category: None,
        value: mean_rate,
        occurred_at: ctx.current_month.first_instant(),
        source: "OperationalRisk",
        extra,
        transaction_id: None,
    }])
}

fn mean_datetime(dates: &[NaiveDateTime]) -> NaiveDateTime {
    let sum: i64 = dates.iter().map(|d| d.and_utc().timestamp()).sum();
    let mean = sum / dates.len() as i64;
    DateTime::from_timestamp(mean, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}
