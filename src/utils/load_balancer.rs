//! Batch dispatch for data-parallel passes.
//!
//! Every parallel pass in the pipeline follows the same shape: size the
//! balancer with a total and a batch size, broadcast a worker to every
//! thread of the pool, and have each worker pull `[begin, end)` ranges
//! until the range space is exhausted. Threads block only here and on the
//! final join.

use anyhow::{ensure, Result};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct LoadBalancer {
    next: AtomicU64,
    total: u64,
    batch: u64,
}

impl LoadBalancer {
    pub fn new(total: u64, batch: u64) -> Self {
        assert!(batch > 0);
        LoadBalancer {
            next: AtomicU64::new(0),
            total,
            batch,
        }
    }

    /// Balancer for passes that walk read-graph edges in reverse-complement
    /// pairs at `(2i, 2i+1)`: the batch size must be even so a pair never
    /// splits across batches.
    pub fn new_paired(total: u64, batch: u64) -> Result<Self> {
        ensure!(batch % 2 == 0, "paired passes require an even batch size");
        ensure!(total % 2 == 0, "paired passes require an even item count");
        Ok(Self::new(total, batch))
    }

    /// Hand out the next batch, clamped to the total. Returns `None` once
    /// the range space is exhausted.
    pub fn next_batch(&self) -> Option<(u64, u64)> {
        let begin = self.next.fetch_add(self.batch, Ordering::Relaxed);
        if begin >= self.total {
            None
        } else {
            Some((begin, (begin + self.batch).min(self.total)))
        }
    }
}

/// A dedicated rayon pool plus the broadcast/join idiom used by every
/// parallel pass.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    thread_count: usize,
}

impl WorkerPool {
    /// `thread_count` of zero selects the hardware concurrency.
    pub fn new(thread_count: usize) -> Result<Self> {
        let thread_count = if thread_count == 0 {
            num_cpus::get()
        } else {
            thread_count
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("marker-forge-{i}"))
            .build()?;
        Ok(WorkerPool { pool, thread_count })
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Run `worker(thread_index)` on every pool thread and join. The first
    /// worker error, if any, is returned after all workers finish.
    pub fn run<F>(&self, worker: F) -> Result<()>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        let results = self.pool.broadcast(|ctx| worker(ctx.index()));
        for result in results {
            result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn batches_cover_the_range_exactly_once() {
        let balancer = LoadBalancer::new(1003, 10);
        let mut seen = vec![false; 1003];
        while let Some((begin, end)) = balancer.next_batch() {
            for i in begin..end {
                assert!(!seen[i as usize]);
                seen[i as usize] = true;
            }
        }
        assert!(seen.iter().all(|&x| x));
    }

    #[test]
    fn paired_balancer_rejects_odd_batches() {
        assert!(LoadBalancer::new_paired(100, 11).is_err());
        let balancer = LoadBalancer::new_paired(100, 10).unwrap();
        while let Some((begin, end)) = balancer.next_batch() {
            assert_eq!(begin % 2, 0);
            assert_eq!(end % 2, 0);
        }
    }

    #[test]
    fn pool_runs_workers_over_all_batches() {
        let pool = WorkerPool::new(4).unwrap();
        let balancer = LoadBalancer::new(100_000, 128);
        let sum = AtomicU64::new(0);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                let mut local = 0u64;
                for i in begin..end {
                    local += i;
                }
                sum.fetch_add(local, std::sync::atomic::Ordering::Relaxed);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(
            sum.load(std::sync::atomic::Ordering::Relaxed),
            100_000u64 * 99_999 / 2
        );
    }

    #[test]
    fn pool_propagates_worker_errors() {
        let pool = WorkerPool::new(2).unwrap();
        let err = pool
            .run(|i| {
                if i == 0 {
                    anyhow::bail!("worker failure");
                }
                Ok(())
            })
            .unwrap_err();
        assert!(err.to_string().contains("worker failure"));
    }
}
