//! Injectable randomness for policy draws and header rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;

    /// Uniform index in `0..bound`. `bound` must be non-zero.
    fn next_index(&self, bound: usize) -> usize {
        ((self.next_f64() * bound as f64) as usize).min(bound.saturating_sub(1))
    }
}

/// Thread-local `rand` generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Cycles through a fixed list of values.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<f64>,
    next: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, next: AtomicUsize::new(0) }
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.values[i % self.values.len()]
    }
}

/// Fisher-Yates shuffle driven by `rng`.
pub fn shuffle<T>(items: &mut [T], rng: &dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.next_index(i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_in_range() {
        let rng = ThreadRandom;
        for _ in 0..100 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_sequence_cycles() {
        let rng = SequenceRandom::new(vec![0.1, 0.9]);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.9);
        assert_eq!(rng.next_f64(), 0.1);
    }

    #[test]
    fn test_next_index_bounds() {
        assert_eq!(FixedRandom(0.0).next_index(4), 0);
        assert_eq!(FixedRandom(0.999).next_index(4), 3);
        assert_eq!(FixedRandom(1.0).next_index(4), 3);
    }

    #[test]
    fn test_shuffle_is_deterministic_with_fixed_source() {
        let mut a = [1, 2, 3, 4];
        shuffle(&mut a, &FixedRandom(0.0));
        let mut b = [1, 2, 3, 4];
        shuffle(&mut b, &FixedRandom(0.0));
        assert_eq!(a, b);

        let mut sorted = a;
        sorted.sort();
        assert_eq!(sorted, [1, 2, 3, 4]);
    }
}
