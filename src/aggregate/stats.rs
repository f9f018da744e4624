//! Group statistics over finite samples.

use std::collections::BTreeMap;

use ahash::AHashMap;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] })
}

/// Sample standard deviation (n - 1 denominator); 0 when fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else { return 0.0 };
    if values.len() < 2 { return 0.0 }
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Shannon entropy in bits of the distribution of distinct values.
pub(crate) fn entropy(values: &[f64]) -> f64 {
    if values.is_empty() { return 0.0 }
    let mut counts = AHashMap::<u64, usize>::new();
    for &v in values {
        // -0.0 and 0.0 count as the same value.
        *counts.entry((v + 0.0).to_bits()).or_default() += 1;
    }
    let n = values.len() as f64;
    let h = counts.values()
        .map(|&c| c as f64 / n)
        .map(|p| -p * p.log2())
        .sum::<f64>();
    h + 0.0
}

/// Most frequent value; ties go to the smallest.
pub(crate) fn mode<T: Ord + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts = BTreeMap::<T, usize>::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts.into_iter()
        .fold(None, |best: Option<(T, usize)>, (v, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((v, c)),
        })
        .map(|(v, _)| v)
}
