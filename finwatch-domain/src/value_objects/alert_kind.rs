// Alert kind value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Anomaly,
    Trend,
    Budget,
    Risk,
    Investment,
    Forecast,
    Operational,
    Fraud,
    Behavior,
    Seasonality,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Anomaly => "anomaly",
            AlertKind::Trend => "trend",
            AlertKind::Budget => "budget",
            AlertKind::Risk => "risk",
            AlertKind::Investment => "investment",
            AlertKind::Forecast => "forecast",
            AlertKind::Operational => "operational",
            AlertKind::Fraud => "fraud",
            AlertKind::Behavior => "behavior",
            AlertKind::Seasonality => "seasonality",
        }
    }
}

impl From<&str> for AlertKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trend" => AlertKind::Trend,
            "budget" => AlertKind::Budget,
            "risk" => AlertKind::Risk,
            "investment" => AlertKind::Investment,
            "forecast" => AlertKind::Forecast,
            "operational" => AlertKind::Operational,
            "fraud" => AlertKind::Fraud,
            "behavior" => AlertKind::Behavior,
            "seasonality" => AlertKind::Seasonality,
            _ => AlertKind::Anomaly,
        }
    }
}
