//! Bucket fill strategies.

use std::path::PathBuf;

use crate::config::BucketFill;
use crate::types::Bucket;

/// Trait for distributing an ordered pool of files over buckets.
///
/// Implementations must be deterministic, keep every file exactly once and
/// produce bucket sizes that differ by at most one.
pub trait BucketStrategy {
    /// Distribute `pool` over exactly `n_buckets` buckets.
    fn distribute(&self, pool: Vec<PathBuf>, n_buckets: usize) -> Vec<Bucket>;
}

/// Bucket `i` receives the `i`-th contiguous chunk of the pool.
///
/// The first `len % n` buckets hold one file more than the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContiguousChunks;

impl BucketStrategy for ContiguousChunks {
    fn distribute(&self, pool: Vec<PathBuf>, n_buckets: usize) -> Vec<Bucket> {
        if n_buckets == 0 {
            return Vec::new();
        }

        let base = pool.len() / n_buckets;
        let extra = pool.len() % n_buckets;

        let mut files = pool.into_iter();
        (0..n_buckets)
            .map(|i| {
                let size = base + usize::from(i < extra);
                Bucket {
                    files: files.by_ref().take(size).collect(),
                }
            })
            .collect()
    }
}

/// File `j` of the pool goes to bucket `j % n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl BucketStrategy for RoundRobin {
    fn distribute(&self, pool: Vec<PathBuf>, n_buckets: usize) -> Vec<Bucket> {
        let mut buckets = vec![Bucket::default(); n_buckets];
        if n_buckets == 0 {
            return buckets;
        }
        for (j, path) in pool.into_iter().enumerate() {
            buckets[j % n_buckets].files.push(path);
        }
        buckets
    }
}

impl BucketStrategy for BucketFill {
    fn distribute(&self, pool: Vec<PathBuf>, n_buckets: usize) -> Vec<Bucket> {
        match self {
            Self::Contiguous => ContiguousChunks.distribute(pool, n_buckets),
            Self::RoundRobin => RoundRobin.distribute(pool, n_buckets),
        }
    }
}
