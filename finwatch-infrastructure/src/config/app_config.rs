use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use finwatch_domain::{DetectorConfig, EngineConfig};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    pub utc_offset_hours: i32,
    pub detectors: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "./finwatch.db".to_string(),
            utc_offset_hours: -3,
            detectors: DetectorConfig::default(),
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("FINWATCH_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        let base_dir = file_path.parent();
        if !file_path.exists() {
            warn!("config.toml not found, using defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
        let content = fs::read_to_string(file_path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.db_path = resolve_path(base, &self.db_path);
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.utc_offset_hours < -23 || self.utc_offset_hours > 23 {
            return Err(anyhow!("utc_offset_hours out of range"));
        }
        let d = &self.detectors;
        if d.pct_low < 0.0 || d.pct_high > 1.0 || d.pct_low >= d.pct_high {
            return Err(anyhow!("percentile bounds must satisfy 0 <= low < high <= 1"));
        }
        if d.p_value_limit <= 0.0 || d.p_value_limit >= 1.0 {
            return Err(anyhow!("p_value_limit must be inside (0, 1)"));
        }
        if d.min_group_size == 0 || d.ema_span == 0 {
            return Err(anyhow!("min_group_size and ema_span must be positive"));
        }
        if d.fraud_hour_start > 23 || d.fraud_hour_end > 23 {
            return Err(anyhow!("fraud hours must be within 0..=23"));
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            utc_offset_hours: self.utc_offset_hours,
            detectors: self.detectors.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("FINWATCH_DB_PATH") {
            self.db_path = value;
        }
        if let Ok(value) = env::var("FINWATCH_UTC_OFFSET_HOURS") {
            self.utc_offset_hours = value.parse().unwrap_or(self.utc_offset_hours);
        }
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_percentiles_rejected() {
        let mut config = AppConfig::default();
        config.detectors.pct_low = 0.99;
        config.detectors.pct_high = 0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn detector_table_parses_from_toml() {
        let parsed: AppConfig = toml::from_str(
            r#"
            db_path = "/tmp/finance.db"

            [detectors]
            z_limit = 2.5
            budget_months = 4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.db_path, "/tmp/finance.db");
        assert_eq!(parsed.detectors.z_limit, 2.5);
        assert_eq!(parsed.detectors.budget_months, 4);
        // Untouched fields keep their defaults.
        assert_eq!(parsed.detectors.hhi_limit, 0.25);
    }
}
