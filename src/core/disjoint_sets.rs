//! Lock-free union-find over the flattened marker array.
//!
//! Each element owns 128 bits: the low word is the parent, the high word
//! the rank. Parent and rank are read and CASed as one unit so `unite` is
//! linearizable without locks. Path compression is a single CAS attempt
//! per hop that may fail harmlessly; a global counter records how many
//! compressions advanced a parent, which drives the convergence sweep
//! after all unions are in.
//!
//! After convergence the rank half carries no information, so the backing
//! storage (an arena of `2 * n` u64 words) is compacted in place to one
//! word per element.

use portable_atomic::{AtomicU128, Ordering};
use std::sync::atomic::{AtomicU64, Ordering as StdOrdering};

use crate::storage::MappedVector;

fn pack(rank: u64, parent: u64) -> u128 {
    ((rank as u128) << 64) | parent as u128
}

fn unpack(entry: u128) -> (u64, u64) {
    ((entry >> 64) as u64, entry as u64)
}

pub struct DisjointSets<'a> {
    entries: &'a [AtomicU128],
    /// Incremented each time a compression CAS advances a parent pointer.
    pub parent_updated: AtomicU64,
}

impl<'a> DisjointSets<'a> {
    /// Interpret `table` (an arena of `2 * n` u64 words) as `n` 128-bit
    /// entries and initialize every element as a singleton.
    ///
    /// The arena's data region is 16-byte aligned, which `AtomicU128`
    /// requires.
    pub fn new(table: &'a MappedVector<u64>, n: u64) -> Self {
        assert_eq!(table.len() as u64, 2 * n, "table must hold 2 words per element");
        let ptr = table.as_slice().as_ptr() as *const AtomicU128;
        assert_eq!(ptr as usize % 16, 0);
        let entries = unsafe { std::slice::from_raw_parts(ptr, n as usize) };
        for (i, entry) in entries.iter().enumerate() {
            entry.store(pack(0, i as u64), Ordering::Relaxed);
        }
        DisjointSets {
            entries,
            parent_updated: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parent(&self, i: u64) -> u64 {
        unpack(self.entries[i as usize].load(Ordering::Acquire)).1
    }

    fn rank(&self, i: u64) -> u64 {
        unpack(self.entries[i as usize].load(Ordering::Acquire)).0
    }

    /// Representative of `i`. With `compress`, every hop attempts one CAS
    /// to splice the grandparent in; concurrent compressions of the same
    /// path converge because a failed CAS just means someone else advanced
    /// the pointer first.
    pub fn find(&self, i: u64, compress: bool) -> u64 {
        let mut current = i;
        let mut parent = self.parent(current);
        let mut grandparent = self.parent(parent);
        while parent != grandparent {
            if compress {
                let entry = self.entries[current as usize].load(Ordering::Acquire);
                let (rank, observed_parent) = unpack(entry);
                if observed_parent == parent
                    && self.entries[current as usize]
                        .compare_exchange_weak(
                            entry,
                            pack(rank, grandparent),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    self.parent_updated.fetch_add(1, StdOrdering::Relaxed);
                }
            }
            current = parent;
            parent = grandparent;
            grandparent = self.parent(grandparent);
        }
        parent
    }

    /// Merge the sets containing `a` and `b`, union by rank. Lock-free:
    /// any interleaving of concurrent `unite` calls produces the same
    /// partition.
    pub fn unite(&self, a: u64, b: u64) {
        assert!(a < self.len() && b < self.len(), "element out of range");
        loop {
            let mut a = self.find(a, false);
            let mut b = self.find(b, false);
            if a == b {
                return;
            }

            let mut rank_a = self.rank(a);
            let mut rank_b = self.rank(b);
            // Attach the lower-rank root under the higher-rank one; break
            // rank ties by id so concurrent calls agree on the direction.
            if rank_a > rank_b || (rank_a == rank_b && a > b) {
                std::mem::swap(&mut a, &mut b);
                std::mem::swap(&mut rank_a, &mut rank_b);
            }

            // a is still a root with the observed rank, point it at b.
            if self.entries[a as usize]
                .compare_exchange(
                    pack(rank_a, a),
                    pack(rank_a, b),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                // a moved under us; retry from fresh roots.
                continue;
            }

            if rank_a == rank_b {
                // Bump b's rank. Failure is harmless: either someone
                // already bumped it or b stopped being a root.
                let _ = self.entries[b as usize].compare_exchange(
                    pack(rank_b, b),
                    pack(rank_b + 1, b),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
            return;
        }
    }
}

/// Compact the converged table in place: keep only the parent word of each
/// entry, halving storage. Requires every element's parent to already be
/// its representative.
pub fn compact(table: &mut MappedVector<u64>, n: u64) -> Result<(), crate::storage::StorageError> {
    for i in 0..n as usize {
        let parent = table[2 * i];
        table[i] = parent;
    }
    table.resize(n as usize)?;
    table.unreserve()
}
