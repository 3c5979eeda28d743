use serde::Serialize;
use std::cmp::Ordering;

/// Descriptive statistics over one grade sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub trend_slope: f64,
}

fn sorted_copy(xs: &[f64]) -> Vec<f64> {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(xs);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Returns a value with maximal frequency.
///
/// Values are keyed by their exact bit pattern. When several values share the
/// top frequency the one seen first wins, but callers should treat the choice
/// among tied values as unspecified.
pub fn mode(xs: &[f64]) -> f64 {
    // (bits, count) in first-seen order
    let mut freq: Vec<(u64, usize)> = Vec::new();
    for x in xs {
        let bits = x.to_bits();
        match freq.iter_mut().find(|(b, _)| *b == bits) {
            Some(entry) => entry.1 += 1,
            None => freq.push((bits, 1)),
        }
    }
    let mut best: Option<(u64, usize)> = None;
    for (bits, count) in freq {
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((bits, count));
        }
    }
    best.map(|(bits, _)| f64::from_bits(bits)).unwrap_or(0.0)
}

/// Population standard deviation (divides by N).
pub fn standard_deviation(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let sum_sq = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    (sum_sq / xs.len() as f64).sqrt()
}

pub fn min_max(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in xs {
        if x < lo {
            lo = x;
        }
        if x > hi {
            hi = x;
        }
    }
    (lo, hi)
}

/// Linear-interpolation percentile over ascending input. `p` is in [0, 100].
pub fn quartile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let frac = idx - lower as f64;
    if frac == 0.0 || lower + 1 >= sorted.len() {
        return sorted[lower];
    }
    sorted[lower] + frac * (sorted[lower + 1] - sorted[lower])
}

/// OLS slope of `xs` against x = 1..n. Fewer than two points have no trend.
pub fn linear_trend_slope(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f + 1.0) / 2.0;
    let y_mean = mean(xs);
    let mut num = 0.0_f64;
    let mut den = 0.0_f64;
    for (i, y) in xs.iter().enumerate() {
        let dx = (i + 1) as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// All of the above in one bundle. The trend is taken over `xs` as given, so
/// pass the sequence in the order the trend should follow.
pub fn describe(xs: &[f64]) -> GradeStats {
    let sorted = sorted_copy(xs);
    let (min, max) = min_max(xs);
    GradeStats {
        count: xs.len(),
        mean: mean(xs),
        median: median(xs),
        mode: mode(xs),
        std_dev: standard_deviation(xs),
        min,
        max,
        q1: quartile(&sorted, 25.0),
        q3: quartile(&sorted, 75.0),
        trend_slope: linear_trend_slope(xs),
    }
}
