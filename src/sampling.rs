//! Deterministic row sampling.
//!
//! Rows are ranked by an xxHash64 of their index under the configured seed
//! and the lowest-ranked `round(fraction * len)` are kept. The same seed,
//! fraction and length always select the same rows, and selected rows are
//! returned in source order.

use twox_hash::XxHash64;

/// Indices of the sampled rows, ascending.
pub fn sample_indices(len: usize, fraction: f64, seed: u64) -> Vec<usize> {
    let take = ((fraction.clamp(0.0, 1.0) * len as f64).round() as usize).min(len);
    if take == len {
        return (0..len).collect();
    }

    let mut ranked: Vec<(u64, usize)> = (0..len)
        .map(|i| (XxHash64::oneshot(seed, &(i as u64).to_le_bytes()), i))
        .collect();
    ranked.sort_unstable();

    let mut picked: Vec<usize> = ranked.into_iter().take(take).map(|(_, i)| i).collect();
    picked.sort_unstable();
    picked
}

/// Borrows the sampled rows of `items`.
pub fn sample<T>(items: &[T], fraction: f64, seed: u64) -> Vec<&T> {
    sample_indices(items.len(), fraction, seed)
        .into_iter()
        .map(|i| &items[i])
        .collect()
}
