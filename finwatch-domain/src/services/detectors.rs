//! The detector library.
//!
//! Each detector is a pure function over the frame: no I/O, no
//! mutation, output is a list of alert drafts. Failures never cross a
//! detector boundary: the orchestrator logs the error and moves on.
//!
//! The registry order below is load-bearing: drafts are persisted in
//! this order, and when two detectors produce the same dedup key the
//! first persisted wins.

pub mod balance;
pub mod behavior;
pub mod investment;
pub mod outliers;
pub mod statistical;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::entities::{AlertDraft, DetectorConfig};
use crate::services::frame::CleanFrame;
use crate::value_objects::YearMonth;

/// Read-only context shared by every detector in one pipeline run.
/// `current_month` is fixed once per run so a run never straddles a
/// month boundary.
#[derive(Debug, Clone, Copy)]
pub struct DetectorContext<'a> {
    pub config: &'a DetectorConfig,
    pub now: NaiveDateTime,
    pub current_month: YearMonth,
}

impl<'a> DetectorContext<'a> {
    pub fn new(config: &'a DetectorConfig, now: NaiveDateTime) -> Self {
        Self {
            config,
            now,
            current_month: YearMonth::from_datetime(now),
        }
    }
}

pub type DetectorFn = fn(&CleanFrame, &DetectorContext<'_>) -> Result<Vec<AlertDraft>>;

#[derive(Debug, Clone, Copy)]
pub struct Detector {
    pub name: &'static str,
    pub run: DetectorFn,
}

/// The full library, in execution order.
pub fn registry() -> Vec<Detector> {
    vec![
        Detector { name: "Z-Score", run: outliers::z_score },
        Detector { name: "Percentile", run: outliers::percentile },
        Detector { name: "EMA", run: outliers::ema_drift },
        Detector { name: "Budget", run: balance::budget },
        Detector { name: "SigmaBand", run: balance::sigma_band },
        Detector { name: "ExpenseIncomeRatio", run: balance::expense_income_ratio },
        Detector { name: "MoMGrowth", run: balance::mom_growth },
        Detector { name: "HHI", run: statistical::hhi },
        Detector { name: "CategoryCorrelation", run: statistical::category_correlation },
        Detector { name: "ANOVA", run: statistical::anova },
        Detector { name: "TTest", run: statistical::t_test },
        Detector { name: "LinearRegression", run: statistical::linear_regression },
        Detector { name: "ARIMA", run: statistical::arima_forecast },
        Detector { name: "ROI", run: investment::roi },
        Detector { name: "Sharpe", run: investment::sharpe },
        Detector { name: "Volatility", run: investment::volatility },
        Detector { name: "NegativeBalance", run: balance::negative_balance },
        Detector { name: "Liquidity", run: balance::liquidity },
        Detector { name: "Fraud", run: behavior::fraud },
        Detector { name: "Seasonality", run: statistical::seasonality },
        Detector { name: "Beta", run: investment::beta },
        Detector { name: "VaR", run: investment::value_at_risk },
        Detector { name: "PaymentMix", run: behavior::payment_mix },
        Detector { name: "Margin", run: balance::margin },
        Detector { name: "OperationalCycle", run: behavior::operational_cycle },
        Detector { name: "OperationalRisk", run: behavior::operational_risk },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_fixed() {
        let names: Vec<&str> = registry().iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 26);
        assert_eq!(names[0], "Z-Score");
        assert_eq!(names[3], "Budget");
        assert_eq!(names[16], "NegativeBalance");
        assert_eq!(names[25], "OperationalRisk");
        // NegativeBalance must precede Liquidity and Margin: they share
        // the month-balance dedup key and the first persisted wins.
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("NegativeBalance") < pos("Liquidity"));
        assert!(pos("Liquidity") < pos("Margin"));
    }
}
