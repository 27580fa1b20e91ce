// Engine runtime configuration
//
// Every knob the detector library reads. Deserialized straight from the
// `[detectors]` table of the config file; all fields default so a bare
// file works.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock offset from UTC used to decide the current month.
    /// Default -3 (América/São Paulo, no DST since 2019).
    pub utc_offset_hours: i32,
    pub detectors: DetectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -3,
            detectors: DetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_group_size: usize,
    pub iqr_k: f64,
    pub z_limit: f64,
    pub pct_low: f64,
    pub pct_high: f64,
    pub ema_span: usize,
    pub ema_diff: f64,
    pub ema_min_rows: usize,
    pub budget_months: usize,
    pub budget_over_mild: f64,
    pub budget_over_severe: f64,
    pub budget_pctl: f64,
    pub sigma_mild: f64,
    pub sigma_severe: f64,
    pub sigma_months: usize,
    pub ratio_attention: f64,
    pub ratio_alert: f64,
    pub ratio_critical: f64,
    pub ratio_trend: f64,
    pub ratio_months: usize,
    pub income_drop: f64,
    pub expense_jump: f64,
    pub growth_limit: f64,
    pub hhi_limit: f64,
    pub corr_limit: f64,
    pub p_value_limit: f64,
    pub residual_k: f64,
    pub regression_months: usize,
    pub arima_months: usize,
    /// Minimum invested amount per asset kind before ROI is judged;
    /// matched by case-insensitive substring of the asset symbol.
    pub roi_floor_by_asset_kind: BTreeMap<String, f64>,
    pub roi_floor_default: f64,
    pub roi_limit: f64,
    pub sharpe_limit: f64,
    pub sharpe_months: usize,
    pub vol_limit: f64,
    pub vol_months: usize,
    pub fraud_amount: f64,
    pub fraud_hour_start: u32,
    pub fraud_hour_end: u32,
    pub seasonality_k: f64,
    pub seasonality_min_months: usize,
    pub beta_low: f64,
    pub beta_high: f64,
    pub beta_min_months: usize,
    pub var_confidence: u32,
    pub var_min_months: usize,
    pub payment_drift: f64,
    pub margin_limit: f64,
    pub cycle_days: i64,
    pub rate_limit: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let mut roi_floors = BTreeMap::new();
        roi_floors.insert("CDB".to_string(), 1000.0);
        roi_floors.insert("Ações".to_string(), 100.0);
        roi_floors.insert("FII".to_string(), 100.0);
        roi_floors.insert("Cripto".to_string(), 50.0);

        Self {
            min_group_size: 5,
            iqr_k: 1.0,
            z_limit: 2.0,
            pct_low: 0.01,
            pct_high: 0.99,
            ema_span: 12,
            ema_diff: 0.5,
            ema_min_rows: 10,
            budget_months: 6,
            budget_over_mild: 0.2,
            budget_over_severe: 0.5,
            budget_pctl: 0.9,
            sigma_mild: 2.0,
            sigma_severe: 3.0,
            sigma_months: 12,
            ratio_attention: 0.7,
            ratio_alert: 0.9,
            ratio_critical: 1.0,
            ratio_trend: 0.05,
            ratio_months: 12,
            income_drop: 0.10,
            expense_jump: 0.15,
            growth_limit: 0.2,
            hhi_limit: 0.25,
            corr_limit: 0.8,
            p_value_limit: 0.05,
            residual_k: 2.0,
            regression_months: 6,
            arima_months: 12,
            roi_floor_by_asset_kind: roi_floors,
            roi_floor_default: 50.0,
            roi_limit: 0.0,
            sharpe_limit: 1.0,
            sharpe_months: 6,
            vol_limit: 0.5,
            vol_months: 6,
            fraud_amount: 5000.0,
            fraud_hour_start: 6,
            fraud_hour_end: 22,
            seasonality_k: 2.0,
            seasonality_min_months: 3,
            beta_low: 0.5,
            beta_high: 1.5,
            beta_min_months: 3,
            var_confidence: 95,
            var_min_months: 3,
            payment_drift: 0.3,
            margin_limit: 0.1,
            cycle_days: 30,
            rate_limit: 0.05,
        }
    }
}

impl DetectorConfig {
    /// Minimum invested amount before an asset's ROI is judged.
    pub fn roi_floor_for(&self, asset: &str) -> f64 {
        let lower = asset.to_lowercase();
        for (kind, floor) in &self.roi_floor_by_asset_kind {
            if lower.contains(&kind.to_lowercase()) {
                return *floor;
            }
        }
        self.roi_floor_default
    }
}
