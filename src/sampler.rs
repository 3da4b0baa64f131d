// 🎲 Distribution Sampler
//
// A seeded, explicitly passed sampling context. Nothing in the crate touches
// a process-wide generator: same seed + same draw order = same output.

use crate::error::{SeedError, SeedResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ============================================================================
// SAMPLER
// ============================================================================

pub struct Sampler {
    seed: u64,
    rng: StdRng,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Sampler {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform integer in [lo, hi], inclusive
    pub fn int_range(&mut self, lo: i64, hi: i64) -> i64 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform real in [lo, hi], inclusive
    pub fn float_range(&mut self, lo: f64, hi: f64) -> f64 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Weighted coin: true with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform index in [0, len). `len` must be positive.
    pub fn choose_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "choose_index on empty range");
        self.rng.gen_range(0..len)
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.choose_index(items.len());
        items.get(idx)
    }

    /// Two distinct indices in [0, len), in draw order
    pub fn choose_pair(&mut self, len: usize) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let picked = rand::seq::index::sample(&mut self.rng, len, 2);
        Some((picked.index(0), picked.index(1)))
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Split `n` items across weighted buckets and draw one value per item
    ///
    /// Values come back shuffled so bucket membership does not follow
    /// generation order. `sizes[i]` is how many values came from bucket i.
    pub fn weighted_partition(&mut self, n: usize, buckets: &[Bucket]) -> SeedResult<Partition> {
        let sizes = partition_sizes(n, buckets)?;

        let mut values = Vec::with_capacity(n);
        for (bucket, &size) in buckets.iter().zip(&sizes) {
            for _ in 0..size {
                values.push(self.int_range(bucket.lo, bucket.hi));
            }
        }
        self.shuffle(&mut values);

        Ok(Partition { values, sizes })
    }
}

// ============================================================================
// WEIGHTED PARTITION
// ============================================================================

/// One (proportion, inclusive range) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub proportion: f64,
    pub lo: i64,
    pub hi: i64,
}

impl Bucket {
    pub fn new(proportion: f64, lo: i64, hi: i64) -> Self {
        Bucket { proportion, lo, hi }
    }

    pub fn validate(&self) -> SeedResult<()> {
        if !self.proportion.is_finite() || !(0.0..=1.0).contains(&self.proportion) {
            return Err(SeedError::config(format!(
                "bucket proportion must be within [0, 1], got {}",
                self.proportion
            )));
        }
        if self.lo > self.hi {
            return Err(SeedError::config(format!(
                "bucket range is empty: [{}, {}]",
                self.lo, self.hi
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub values: Vec<i64>,
    pub sizes: Vec<usize>,
}

/// Bucket sizes for `n` items; always sums to exactly `n`
///
/// Every bucket but the last gets round(n * proportion) (ties to even). The
/// last bucket takes the remainder. If the remainder goes negative it is
/// clamped to zero and the preceding bucket shrinks to whatever is left.
pub fn partition_sizes(n: usize, buckets: &[Bucket]) -> SeedResult<Vec<usize>> {
    if buckets.is_empty() {
        return Err(SeedError::config("weighted partition needs at least one bucket"));
    }
    for bucket in buckets {
        bucket.validate()?;
    }

    let total = n as i64;
    let last = buckets.len() - 1;

    let mut sizes: Vec<i64> = buckets[..last]
        .iter()
        .map(|b| (total as f64 * b.proportion).round_ties_even() as i64)
        .collect();

    let assigned: i64 = sizes.iter().sum();
    let remainder = total - assigned;

    if remainder >= 0 {
        sizes.push(remainder);
    } else {
        sizes.push(0);
        if last > 0 {
            let before_prev: i64 = sizes[..last - 1].iter().sum();
            sizes[last - 1] = (total - before_prev).max(0);
        }
    }

    // Only reachable when several leading buckets overshoot together
    let mut excess = sizes.iter().sum::<i64>() - total;
    for size in sizes.iter_mut().rev() {
        if excess <= 0 {
            break;
        }
        let cut = excess.min(*size);
        *size -= cut;
        excess -= cut;
    }

    Ok(sizes.into_iter().map(|s| s as usize).collect())
}
