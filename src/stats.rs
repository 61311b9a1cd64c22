use serde::{Deserialize, Serialize};

/// Running mean and standard deviation (Welford's algorithm).
#[derive(Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
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

    pub fn report(&self) -> AccumulatorReport {
        let mean = if self.n_vals > 0 { self.mean } else { f64::NAN };
        let std_dev = if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        AccumulatorReport { mean, std_dev }
    }
}

/// Stored series of values, summarized after discarding its transient.
#[derive(Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// Index of the first value considered equilibrated.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = opt_i_equil(&self.vals);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            i_equil,
            mean: mean(tail),
            std_dev: var(tail).sqrt(),
            sem: sem(tail),
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn var(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean using the Flyvbjerg-Petersen blocking method.
fn sem(vals: &[f64]) -> f64 {
    let mut blk_vals = vals.to_vec();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while blk_vals.len() >= 2 {
        let n_vals = blk_vals.len() as f64;
        let sem2_est = var(&blk_vals) / n_vals;
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_est * (2.0 / (n_vals - 1.0)).sqrt());

        blk_vals = blk_vals
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
    }

    // First blocking level whose estimate is compatible with every later one.
    for (idx, &sem2_est) in sem2_ests.iter().enumerate() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(&sem2_errs[idx..])
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if sem2_est > max_low {
            return sem2_est.sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Truncation index minimizing the marginal standard error.
///
/// Candidates are `n / 2^k`, so at most half of the series is discarded.
fn opt_i_equil(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    if n_vals < 2 {
        return 0;
    }

    let mut opt_i_equil = n_vals / 2;
    let mut min_mse = f64::INFINITY;
    let n_idxs = n_vals.ilog2();
    for k in 1..=n_idxs {
        let i_equil = n_vals / 2usize.pow(k);
        let tail = &vals[i_equil..];
        let n_tail = tail.len() as f64;
        let mse = var(tail) * (n_tail - 1.0) / n_tail.powi(2);
        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_direct_formulas() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut acc = Accumulator::new();
        vals.iter().for_each(|&val| acc.add(val));
        let report = acc.report();
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - var(&vals).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_accumulator_reports_nan() {
        let report = Accumulator::new().report();
        assert!(report.mean.is_nan());
        assert!(report.std_dev.is_nan());
    }

    #[test]
    fn transient_is_discarded() {
        let mut series = TimeSeries::new();
        for i in 0..256 {
            // Linear decay followed by an alternating plateau.
            let val = if i < 64 {
                100.0 - i as f64
            } else {
                10.0 + (i % 2) as f64
            };
            series.push(val);
        }
        let report = series.report();
        assert!(report.i_equil >= 64);
        assert!((report.mean - 10.5).abs() < 1e-9);
        assert!(report.sem.is_finite());
    }
}
