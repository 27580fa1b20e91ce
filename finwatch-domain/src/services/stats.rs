//! Statistical primitives shared by the detector library.
//!
//! Everything here is deterministic and allocation-light: means,
//! sample deviations, interpolated quantiles, EMA and OLS recurrences,
//! and the two hypothesis tests (Welch t, one-way ANOVA) whose p-values
//! come from the regularized incomplete beta function.

const EPS: f64 = 1e-10;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (ddof = 1). Zero for fewer than two points.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Population deviation (ddof = 0), used for regression residuals.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Linearly interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}

/// Exponential moving average with `adjust = false` semantics:
/// `ema[0] = x[0]`, `ema[i] = alpha * x[i] + (1 - alpha) * ema[i-1]`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = values[0];
    out.push(current);
    for &x in &values[1..] {
        current = alpha * x + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

/// Month-over-month percentage changes. Pairs with a near-zero base are
/// skipped rather than producing infinities.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::new();
    for window in values.windows(2) {
        let (prev, cur) = (window[0], window[1]);
        if prev.abs() < EPS {
            continue;
        }
        out.push(cur / prev - 1.0);
    }
    out
}

/// Degree-1 least squares over `y` with x = 0..n. Returns
/// `(slope, intercept)`.
pub fn linear_fit(y: &[f64]) -> Option<(f64, f64)> {
    let n = y.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(y);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (yi - y_mean);
    }
    if sxx < EPS {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, y_mean - slope * x_mean))
}

/// Sample covariance (ddof = 1).
pub fn sample_covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    let mx = mean(x);
    let my = mean(y);
    let sum: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Some(sum / (n - 1) as f64)
}

pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = sample_covariance(x, y)?;
    let sx = sample_std(x);
    let sy = sample_std(y);
    if sx < EPS || sy < EPS {
        return None;
    }
    Some(cov / (sx * sy))
}

/// Welch's two-sample t-test. Returns `(t, two_sided_p)`.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    let (na, nb) = (a.len(), b.len());
    if na < 2 || nb < 2 {
        return None;
    }
    let sea = sample_variance(a) / na as f64;
    let seb = sample_variance(b) / nb as f64;
    let se2 = sea + seb;
    if se2 < EPS * EPS {
        return None;
    }
    let t = (mean(a) - mean(b)) / se2.sqrt();
    let df_denom = sea * sea / (na - 1) as f64 + seb * seb / (nb - 1) as f64;
    if df_denom < f64::MIN_POSITIVE {
        return None;
    }
    let df = se2 * se2 / df_denom;
    Some((t, student_t_two_sided_p(t.abs(), df)))
}

/// One-way ANOVA across `groups`. Returns `(f, p)`.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Option<(f64, f64)> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.len() < 2) {
        return None;
    }
    let n: usize = groups.iter().map(Vec::len).sum();
    let grand: f64 = groups.iter().flatten().sum::<f64>() / n as f64;

    let mut ssb = 0.0;
    let mut ssw = 0.0;
    for g in groups {
        let m = mean(g);
        ssb += g.len() as f64 * (m - grand).powi(2);
        ssw += g.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    }
    let df1 = (k - 1) as f64;
    let df2 = (n - k) as f64;
    if df2 <= 0.0 {
        return None;
    }
    let msw = ssw / df2;
    if msw < EPS * EPS {
        return None;
    }
    let f = (ssb / df1) / msw;
    Some((f, f_one_sided_p(f, df1, df2)))
}

/// Two-sided p-value of the Student t distribution.
pub fn student_t_two_sided_p(t_abs: f64, df: f64) -> f64 {
    incomplete_beta(df / 2.0, 0.5, df / (df + t_abs * t_abs))
}

/// Upper-tail p-value of the F distribution.
pub fn f_one_sided_p(f: f64, df1: f64, df2: f64) -> f64 {
    if f <= 0.0 {
        return 1.0;
    }
    incomplete_beta(df2 / 2.0, df1 / 2.0, df2 / (df2 + df1 * f))
}

/// One-sided standard normal quantile for the confidence levels VaR
/// supports.
pub fn one_sided_z(confidence: u32) -> f64 {
    match confidence {
        c if c >= 99 => 2.3263,
        c if c >= 95 => 1.6449,
        c if c >= 90 => 1.2816,
        _ => 1.6449,
    }
}

/// Two-sided standard normal quantile for forecast bands.
pub fn two_sided_z(confidence_level: f64) -> f64 {
    match confidence_level {
        x if x >= 0.99 => 2.576,
        x if x >= 0.95 => 1.96,
        x if x >= 0.90 => 1.645,
        _ => 1.96,
    }
}

/// Regularized incomplete beta function I_x(a, b), continued-fraction
/// evaluation (modified Lentz).
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const TINY: f64 = 1e-300;
    const TOL: f64 = 3e-12;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < TOL {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x), x > 0.
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut y = x;
    let mut ser = 1.000_000_000_190_015;
    for c in COEFFS {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates_linearly() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&v, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&v, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile(&v, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn sample_std_uses_ddof_one() {
        let v = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std(&v) - 2.138089935).abs() < 1e-6);
        assert_eq!(sample_std(&[3.0]), 0.0);
    }

    #[test]
    fn ema_matches_recurrence() {
        let out = ema(&[1.0, 2.0, 3.0], 3);
        // alpha = 0.5
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - 1.5).abs() < 1e-12);
        assert!((out[2] - 2.25).abs() < 1e-12);
    }

    #[test]
    fn pct_change_skips_zero_base() {
        let out = pct_change(&[100.0, 110.0, 0.0, 50.0]);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.1).abs() < 1e-12);
        assert!((out[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn linear_fit_recovers_slope() {
        let y = vec![1.0, 3.0, 5.0, 7.0];
        let (slope, intercept) = linear_fit(&y).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_detects_perfect_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-9);
        let inv: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson(&x, &inv).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn incomplete_beta_endpoints() {
        assert_eq!(incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(incomplete_beta(2.0, 3.0, 1.0), 1.0);
        // Symmetric case: I_0.5(a, a) = 0.5.
        assert!((incomplete_beta(0.5, 0.5, 0.5) - 0.5).abs() < 1e-9);
        assert!((incomplete_beta(1.0, 1.0, 0.25) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn student_t_p_matches_critical_value() {
        // t = 2.228 is the 5% two-sided critical value at df = 10.
        let p = student_t_two_sided_p(2.228, 10.0);
        assert!((p - 0.05).abs() < 0.002, "p = {p}");
    }

    #[test]
    fn f_p_matches_critical_value() {
        // F = 3.885 is the 5% critical value at (2, 12).
        let p = f_one_sided_p(3.885, 2.0, 12.0);
        assert!((p - 0.05).abs() < 0.002, "p = {p}");
    }

    #[test]
    fn welch_separates_distinct_means() {
        let a = vec![10.0, 11.0, 9.0, 10.5, 9.5, 10.2];
        let b = vec![20.0, 21.0, 19.0, 20.5, 19.5, 20.2];
        let (t, p) = welch_t_test(&a, &b).unwrap();
        assert!(t < 0.0);
        assert!(p < 0.001);

        let c = vec![10.0, 11.0, 9.0, 10.5];
        let d = vec![10.1, 10.9, 9.2, 10.4];
        let (_, p_same) = welch_t_test(&c, &d).unwrap();
        assert!(p_same > 0.5);
    }

    #[test]
    fn anova_flags_shifted_group() {
        let groups = vec![
            vec![10.0, 11.0, 9.0, 10.0],
            vec![10.5, 9.5, 10.2, 9.8],
            vec![30.0, 31.0, 29.0, 30.0],
        ];
        let (f, p) = one_way_anova(&groups).unwrap();
        assert!(f > 10.0);
        assert!(p < 0.001);
        assert!(one_way_anova(&groups[..1].to_vec()).is_none());
    }
}
