//! ARIMA(1,1,1) one-step forecasting.
//!
//! The series is differenced once, the AR coefficient comes from the
//! Yule-Walker equation at lag 1, and the MA coefficient from the lag-1
//! autocorrelation of the AR residuals. The forecast band is the point
//! forecast plus/minus z times the residual deviation.

use anyhow::{bail, Result};

use super::stats;

/// Minimum observations before a fit is attempted.
pub const MIN_OBSERVATIONS: usize = 8;

#[derive(Debug, Clone)]
pub struct Arima111 {
    phi: f64,
    theta: f64,
    constant: f64,
    residual_std: f64,
    last_value: f64,
    last_diff: f64,
    last_residual: f64,
    fitted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ForecastBand {
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence_level: f64,
}

impl ForecastBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

impl Default for Arima111 {
    fn default() -> Self {
        Self::new()
    }
}

impl Arima111 {
    pub fn new() -> Self {
        Self {
            phi: 0.0,
            theta: 0.0,
            constant: 0.0,
            residual_std: 0.0,
            last_value: 0.0,
            last_diff: 0.0,
            last_residual: 0.0,
            fitted: false,
        }
    }

    pub fn fit(&mut self, data: &[f64]) -> Result<()> {
        if data.len() < MIN_OBSERVATIONS {
            bail!(
                "insufficient data for ARIMA(1,1,1): {} < {}",
                data.len(),
                MIN_OBSERVATIONS
            );
        }
        if data.iter().any(|x| !x.is_finite()) {
            bail!("series contains non-finite values");
        }

        let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
        let n = diffs.len();
        let mean = stats::mean(&diffs);
        let centered: Vec<f64> = diffs.iter().map(|d| d - mean).collect();

        // Yule-Walker at lag 1.
        let c0: f64 = centered.iter().map(|x| x * x).sum::<f64>() / n as f64;
        let c1: f64 = centered.windows(2).map(|w| w[0] * w[1]).sum::<f64>() / n as f64;
        self.phi = if c0.abs() > 1e-10 { c1 / c0 } else { 0.0 };
        self.constant = mean;

        // AR residuals.
        let mut residuals = vec![0.0; n];
        for i in 1..n {
            let prediction = self.constant + self.phi * (diffs[i - 1] - mean);
            residuals[i] = diffs[i] - prediction;
        }

        // MA coefficient from the lag-1 autocorrelation of the residuals,
        // bounded for stability.
        let tail = &residuals[1..];
        let res_mean = stats::mean(tail);
        let res_centered: Vec<f64> = tail.iter().map(|r| r - res_mean).collect();
        let r0: f64 = res_centered.iter().map(|x| x * x).sum::<f64>() / tail.len() as f64;
        let r1: f64 =
            res_centered.windows(2).map(|w| w[0] * w[1]).sum::<f64>() / tail.len() as f64;
        self.theta = if r0.abs() > 1e-10 {
            (r1 / r0).clamp(-0.99, 0.99)
        } else {
            0.0
        };

        self.residual_std = stats::sample_std(tail);
        self.last_value = data[data.len() - 1];
        self.last_diff = diffs[n - 1];
        self.last_residual = residuals[n - 1];
        self.fitted = true;
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// One-step-ahead forecast with its confidence band.
    pub fn forecast_one(&self, confidence_level: f64) -> Result<ForecastBand> {
        if !self.fitted {
            bail!("model not fitted");
        }
        let next_diff = self.constant
            + self.phi * (self.last_diff - self.constant)
            + self.theta * self.last_residual;
        let forecast = self.last_value + next_diff;
        let z = stats::two_sided_z(confidence_level);
        let half_width = z * self.residual_std;
        Ok(ForecastBand {
            forecast,
            lower: forecast - half_width,
            upper: forecast + half_width,
            confidence_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_series() {
        let mut model = Arima111::new();
        assert!(model.fit(&[1.0, 2.0, 3.0]).is_err());
        assert!(!model.is_fitted());
    }

    #[test]
    fn forecast_tracks_linear_trend() {
        let data: Vec<f64> = (1..=20).map(|x| 10.0 * x as f64).collect();
        let mut model = Arima111::new();
        model.fit(&data).unwrap();
        let band = model.forecast_one(0.95).unwrap();
        // Differences are exactly 10, so the next step is close to 210.
        assert!((band.forecast - 210.0).abs() < 5.0, "{}", band.forecast);
        assert!(band.lower <= band.forecast && band.forecast <= band.upper);
    }

    #[test]
    fn stable_series_yields_tight_band() {
        let data = vec![100.0, 101.0, 99.0, 100.0, 100.5, 99.5, 100.0, 101.0, 99.0, 100.0, 100.0, 100.5];
        let mut model = Arima111::new();
        model.fit(&data).unwrap();
        let band = model.forecast_one(0.95).unwrap();
        assert!(band.contains(100.0));
        assert!(!band.contains(1000.0));
    }
}
