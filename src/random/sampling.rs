//! Sampling algorithms shared by the contact model.

use std::hash::Hash;

use crate::hashing::IndexSet;
use crate::rand::Rng;

/// Draws an index into `weights` with probability proportional to its weight by walking the
/// cumulative sum. Weights need not be normalized. Returns `None` when `weights` is empty or
/// sums to zero. Zero weights are never selected.
pub fn sample_cumulative<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let target = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (index, &weight) in weights.iter().enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = Some(index);
        if target < cumulative {
            return Some(index);
        }
    }
    // Summation order can leave `target` just above the final cumulative value.
    last_positive
}

/// Draws an element uniformly from `set`, never returning `excluded`.
///
/// Runs in constant time: when `excluded` is a member, one index is drawn from the other
/// `len - 1` positions.
pub fn sample_uniform_excluding<R, T>(rng: &mut R, set: &IndexSet<T>, excluded: Option<&T>) -> Option<T>
where
    R: Rng + ?Sized,
    T: Copy + Hash + Eq,
{
    let excluded_position = excluded.and_then(|item| set.get_index_of(item));
    let candidates = set.len() - usize::from(excluded_position.is_some());
    if candidates == 0 {
        return None;
    }

    let mut index = rng.random_range(0..candidates);
    if let Some(position) = excluded_position {
        if index >= position {
            index += 1;
        }
    }
    set.get_index(index).copied()
}
