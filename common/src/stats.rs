use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    B,
    MiB,
    GiB,
}

impl Unit {
    pub fn bytes(&self) -> f64 {
        match self {
            Unit::B => 1.0,
            Unit::MiB => 1024.0 * 1024.0,
            Unit::GiB => 1024.0 * 1024.0 * 1024.0,
        }
    }

    /// Factor converting a value in `self` to `to`
    pub fn factor(&self, to: Unit) -> f64 {
        self.bytes() / to.bytes()
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Unit::B),
            "MiB" => Ok(Unit::MiB),
            "GiB" => Ok(Unit::GiB),
            other => Err(format!("Unsupported unit {other}, expected B, MiB or GiB")),
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentile `q` in `[0, 100]` with linear interpolation between the two
/// closest ranks (NumPy's default method).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_of_sorted(&sorted, q))
}

/// `sorted` must not be empty
fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub p99: f64,
}

pub fn summarize(values: &[f64], source: &str) -> Result<SeriesStats, EvalError> {
    let mean = mean(values).ok_or_else(|| EvalError::EmptySeries(source.to_owned()))?;
    let p99 = percentile(values, 99.0).ok_or_else(|| EvalError::EmptySeries(source.to_owned()))?;
    Ok(SeriesStats {
        count: values.len(),
        mean,
        p99,
    })
}

/// Least squares fit of `y = slope * x + intercept`
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;
    let (num, den) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(num, den), (xi, yi)| {
            (
                num + (xi - mean_x) * (yi - mean_y),
                den + (xi - mean_x).powi(2),
            )
        });
    if den == 0.0 {
        return None;
    }
    let slope = num / den;
    Some((slope, mean_y - slope * mean_x))
}

/// Box plot geometry without fliers: whiskers reach the most extreme data
/// points within 1.5 IQR of the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub whisker_low: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_high: f64,
}

impl BoxStats {
    pub fn new(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q1 = percentile_of_sorted(&sorted, 25.0);
        let median = percentile_of_sorted(&sorted, 50.0);
        let q3 = percentile_of_sorted(&sorted, 75.0);
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;
        let whisker_low = sorted
            .iter()
            .copied()
            .find(|x| *x >= low_fence)
            .unwrap_or(q1)
            .min(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|x| *x <= high_fence)
            .unwrap_or(q3)
            .max(q3);
        Some(Self {
            whisker_low,
            q1,
            median,
            q3,
            whisker_high,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_linear_interpolation() {
        let values = (1..=10).map(|x| x as f64).collect::<Vec<_>>();
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(10.0));
        assert_eq!(percentile(&values, 50.0), Some(5.5));
        // rank = 0.99 * 9 = 8.91
        let p99 = percentile(&values, 99.0).unwrap();
        assert!((p99 - 9.91).abs() < 1e-12);
        assert_eq!(percentile(&[3.0], 99.0), Some(3.0));
        assert_eq!(percentile(&[], 99.0), None);
    }

    #[test]
    fn unsorted_input() {
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 50.0), Some(2.0));
    }

    #[test]
    fn summary_of_empty_series_fails() {
        assert_eq!(
            summarize(&[], "GETLATENCY"),
            Err(EvalError::EmptySeries("GETLATENCY".to_owned()))
        );
    }

    #[test]
    fn fit() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let (slope, intercept) = linear_fit(&x, &y).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert_eq!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]), None);
    }

    #[test]
    fn units() {
        assert_eq!(Unit::GiB.factor(Unit::B), 1073741824.0);
        assert_eq!(Unit::B.factor(Unit::MiB), 1.0 / 1048576.0);
        assert_eq!(Unit::MiB.factor(Unit::MiB), 1.0);
    }

    #[test]
    fn box_whiskers_exclude_outliers() {
        let mut values = (1..=9).map(|x| x as f64).collect::<Vec<_>>();
        values.push(100.0);
        let b = BoxStats::new(&values).unwrap();
        assert_eq!(b.whisker_low, 1.0);
        assert_eq!(b.whisker_high, 9.0);
        assert_eq!(b.median, 5.5);
    }
}
