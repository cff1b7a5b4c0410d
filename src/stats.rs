use serde::{Deserialize, Serialize};

/// Mean and sample standard deviation of a stream of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub std_dev: f64,
}

/// Per-step moments of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub stock: Moments,
    pub catch: Moments,
    pub recruitment: Moments,
}

/// Online mean/variance accumulator (Welford).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn count(&self) -> usize {
        self.n_vals
    }

    /// NaN mean for no values, NaN deviation for fewer than two.
    pub fn report(&self) -> Moments {
        Moments {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Stored series of values analysed for equilibration.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    /// Whether a burn-in cut other than the fallback half was selected.
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    /// Statistics of the series after discarding the estimated burn-in.
    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = opt_equil_index(&self.vals);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: mean(tail),
            std_dev: variance(tail).sqrt(),
            sem: blocked_sem(tail),
            is_equil: !self.vals.is_empty() && i_equil != self.vals.len() / 2,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn variance(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean by Flyvbjerg-Petersen blocking.
fn blocked_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while blocks.len() >= 2 {
        let n_vals = blocks.len() as f64;
        let sem2_est = variance(&blocks) / n_vals;
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_est * (2.0 / (n_vals - 1.0)).sqrt());

        blocks = blocks
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
    }

    // First level whose estimate exceeds every later lower error bound.
    for idx in 0..sem2_ests.len() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(&sem2_errs[idx..])
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if sem2_ests[idx] > max_low {
            return sem2_ests[idx].sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Burn-in cut minimising the marginal standard error, tried at
/// `n / 2^k` for decreasing `k`.
fn opt_equil_index(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    if n_vals < 2 {
        return n_vals / 2;
    }

    let n_cuts = n_vals.ilog2() + 1;
    let mut min_mse = f64::INFINITY;
    let mut opt_index = n_vals / 2;
    for k in 0..n_cuts {
        let cut = n_vals / 2usize.pow(n_cuts - k);
        let tail = &vals[cut..];
        let n_tail = tail.len();
        let mse = variance(tail) * (n_tail - 1) as f64 / n_tail.pow(2) as f64;
        if mse < min_mse {
            min_mse = mse;
            opt_index = cut;
        }
    }
    opt_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_direct_formulas() {
        let vals = [4.0, 7.0, 13.0, 16.0];
        let mut acc = Accumulator::new();
        vals.iter().for_each(|&v| acc.add(v));
        let moments = acc.report();
        assert_eq!(acc.count(), 4);
        assert!((moments.mean - 10.0).abs() < 1e-12);
        assert!((moments.std_dev - variance(&vals).sqrt()).abs() < 1e-12);
        assert!((moments.std_dev - 30.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn accumulator_with_few_values_is_nan() {
        let mut acc = Accumulator::new();
        assert!(acc.report().mean.is_nan());
        acc.add(3.0);
        assert_eq!(acc.report().mean, 3.0);
        assert!(acc.report().std_dev.is_nan());
    }

    #[test]
    fn constant_series_has_zero_spread() {
        let mut series = TimeSeries::new();
        for _ in 0..64 {
            series.push(2.5);
        }
        let report = series.report();
        assert_eq!(report.mean, 2.5);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
    }

    #[test]
    fn burn_in_is_cut_from_a_relaxing_series() {
        let mut series = TimeSeries::new();
        for i in 0..256 {
            let transient = 100.0 * (-(i as f64) / 4.0).exp();
            let wiggle = if i % 2 == 0 { 0.5 } else { -0.5 };
            series.push(10.0 + transient + wiggle);
        }
        let report = series.report();
        assert!((report.mean - 10.0).abs() < 0.5);
        assert!(report.sem.is_finite());
    }

    #[test]
    fn empty_series_reports_nan() {
        let series = TimeSeries::new();
        let report = series.report();
        assert!(report.mean.is_nan());
        assert!(!report.is_equil);
    }
}
