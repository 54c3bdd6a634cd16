//! Anomaly-detection metrics over per-sample scores.
//!
//! Higher scores mean "more anomalous". Every function returns a finite value
//! for any finite input, including degenerate single-class batches.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean of the scores whose flag equals `anomalous`.
pub fn class_mean(scores: &[f64], flags: &[bool], anomalous: bool) -> f64 {
    let selected: Vec<f64> = scores
        .iter()
        .zip(flags)
        .filter(|(_, f)| **f == anomalous)
        .map(|(s, _)| *s)
        .collect();
    mean(&selected)
}

/// Area under the ROC curve via the Mann-Whitney U statistic, ties counted
/// as one half. Returns 0.5 when either class is absent.
pub fn roc_auc(scores: &[f64], flags: &[bool]) -> f64 {
    let n_pos = flags.iter().filter(|f| **f).count();
    let n_neg = flags.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    // Average 1-based ranks over runs of tied scores.
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(flags)
        .filter(|(_, f)| **f)
        .map(|(r, _)| *r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Decision threshold that flags the top `anomalous_fraction` of scores.
pub fn contamination_threshold(scores: &[f64], anomalous_fraction: f64) -> f64 {
    quantile(scores, 1.0 - anomalous_fraction)
}

/// Confusion counts with "anomalous" as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl Confusion {
    /// Classify `score > threshold` as anomalous.
    pub fn at_threshold(scores: &[f64], flags: &[bool], threshold: f64) -> Self {
        let mut c = Self::default();
        for (score, anomalous) in scores.iter().zip(flags) {
            match (*score > threshold, *anomalous) {
                (true, true) => c.true_positive += 1,
                (true, false) => c.false_positive += 1,
                (false, false) => c.true_negative += 1,
                (false, true) => c.false_negative += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
