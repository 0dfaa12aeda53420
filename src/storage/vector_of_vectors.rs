//! Variable-length memory-mapped arena with deferred sizing.
//!
//! A [`VectorOfVectors`] is a CSR layout: an offset table plus one flat
//! data arena. Two construction modes exist:
//!
//! * **Append** — `append_vector(items)` accumulates vectors one after the
//!   other, single-threaded.
//! * **Two-pass** — `begin_pass1(n)` sizes the offset table; pass 1 counts
//!   items per key (atomic adds from many threads); `begin_pass2()` turns
//!   the counts into offsets by prefix sum and arms per-key write cursors;
//!   pass 2 stores items (per-key atomic cursor decrement, so writes to the
//!   same key from different threads serialize without locks); `end_pass2()`
//!   verifies every cursor reached its floor.
//!
//! Within a key, two-pass stores land in reverse arrival order; every
//! consumer that needs an order sorts the slice afterwards.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use super::{MappedVector, Pod, StorageError};

pub struct VectorOfVectors<T: Pod> {
    offsets: MappedVector<u64>,
    data: MappedVector<T>,
    /// Write cursors, only alive between `begin_pass2` and `end_pass2`.
    cursors: MappedVector<u64>,
    in_pass2: bool,
}

impl<T: Pod> VectorOfVectors<T> {
    pub fn create_new(name: Option<PathBuf>, page_size: usize) -> Result<Self, StorageError> {
        let (toc_name, data_name) = split_names(name);
        let mut offsets = MappedVector::create_new(toc_name, page_size)?;
        offsets.push(0)?;
        Ok(VectorOfVectors {
            offsets,
            data: MappedVector::create_new(data_name, page_size)?,
            cursors: MappedVector::create_new(None, page_size)?,
            in_pass2: false,
        })
    }

    pub fn access_existing_read_only(name: PathBuf) -> Result<Self, StorageError> {
        let (toc_name, data_name) = split_names(Some(name));
        Ok(VectorOfVectors {
            offsets: MappedVector::access_existing_read_only(&toc_name.unwrap())?,
            data: MappedVector::access_existing_read_only(&data_name.unwrap())?,
            cursors: MappedVector::create_new(None, 4096)?,
            in_pass2: false,
        })
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of items across all vectors.
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    pub fn size_of(&self, k: usize) -> usize {
        (self.offsets[k + 1] - self.offsets[k]) as usize
    }

    pub fn slice(&self, k: usize) -> &[T] {
        let begin = self.offsets[k] as usize;
        let end = self.offsets[k + 1] as usize;
        &self.data.as_slice()[begin..end]
    }

    pub fn slice_mut(&mut self, k: usize) -> &mut [T] {
        let begin = self.offsets[k] as usize;
        let end = self.offsets[k + 1] as usize;
        &mut self.data.as_mut_slice()[begin..end]
    }

    /// Mutable slice of vector `k` through a shared reference.
    ///
    /// # Safety
    /// Callers must guarantee that no two threads touch the same key
    /// concurrently; distinct keys reference disjoint data ranges.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut_unsynchronized(&self, k: usize) -> &mut [T] {
        let begin = self.offsets[k] as usize;
        let end = self.offsets[k + 1] as usize;
        let base = self.data.as_slice().as_ptr() as *mut T;
        std::slice::from_raw_parts_mut(base.add(begin), end - begin)
    }

    /// Append one vector (single-threaded accumulation mode).
    pub fn append_vector(&mut self, items: &[T]) -> Result<(), StorageError> {
        self.data.extend_from_slice(items)?;
        self.offsets.push(self.data.len() as u64)?;
        Ok(())
    }

    // ------------------------- two-pass protocol -------------------------

    /// Start pass 1 for `n` keys; all counts start at zero.
    pub fn begin_pass1(&mut self, n: usize) -> Result<(), StorageError> {
        self.offsets.resize(n + 1)?;
        self.offsets.fill(0);
        Ok(())
    }

    pub fn increment_count(&mut self, k: usize) {
        self.increment_count_by(k, 1);
    }

    pub fn increment_count_by(&mut self, k: usize, n: u64) {
        // Counts are kept shifted by one so the prefix sum lands in place.
        self.offsets[k + 1] += n;
    }

    pub fn increment_count_multithreaded(&self, k: usize) {
        self.offsets.as_atomic_slice()[k + 1].fetch_add(1, Ordering::Relaxed);
    }

    /// Prefix-sum the counts into offsets, size the data arena, and arm the
    /// per-key write cursors.
    pub fn begin_pass2(&mut self) -> Result<(), StorageError> {
        let n = self.len();
        let slice = self.offsets.as_mut_slice();
        for k in 0..n {
            slice[k + 1] += slice[k];
        }
        let total = self.offsets[n] as usize;
        self.data.resize(total)?;
        // Cursor for key k starts at the end offset of k and walks down.
        self.cursors.resize(n)?;
        let offsets = self.offsets.as_slice().to_vec();
        for k in 0..n {
            self.cursors[k] = offsets[k + 1];
        }
        self.in_pass2 = true;
        Ok(())
    }

    pub fn store(&mut self, k: usize, value: T) {
        debug_assert!(self.in_pass2);
        let i = self.cursors[k] - 1;
        self.cursors[k] = i;
        debug_assert!(i >= self.offsets[k]);
        let slot = i as usize;
        self.data.as_mut_slice()[slot] = value;
    }

    pub fn store_multithreaded(&self, k: usize, value: T) {
        debug_assert!(self.in_pass2);
        let i = self.cursors.as_atomic_slice()[k].fetch_sub(1, Ordering::Relaxed) - 1;
        debug_assert!(i >= self.offsets[k]);
        // Each fetch_sub claims a distinct slot inside key k's range.
        unsafe { self.data.write_shared(i as usize, value) };
    }

    /// Verify every cursor hit its floor and drop the cursor table.
    pub fn end_pass2(&mut self) -> Result<(), StorageError> {
        debug_assert!(self.in_pass2);
        for k in 0..self.len() {
            assert_eq!(
                self.cursors[k],
                self.offsets[k],
                "two-pass store incomplete for key {k}"
            );
        }
        self.cursors.remove()?;
        self.in_pass2 = false;
        Ok(())
    }

    pub fn unreserve(&mut self) -> Result<(), StorageError> {
        self.offsets.unreserve()?;
        self.data.unreserve()
    }

    pub fn remove(&mut self) -> Result<(), StorageError> {
        self.offsets.remove()?;
        self.data.remove()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        (0..self.len()).map(move |k| self.slice(k))
    }
}

fn split_names(name: Option<PathBuf>) -> (Option<PathBuf>, Option<PathBuf>) {
    match name {
        None => (None, None),
        Some(path) => {
            let mut toc = path.as_os_str().to_owned();
            toc.push(".toc");
            let mut data = path.as_os_str().to_owned();
            data.push(".data");
            (Some(PathBuf::from(toc)), Some(PathBuf::from(data)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_mode_builds_csr() {
        let mut v: VectorOfVectors<u32> = VectorOfVectors::create_new(None, 4096).unwrap();
        v.append_vector(&[1, 2, 3]).unwrap();
        v.append_vector(&[]).unwrap();
        v.append_vector(&[9]).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.slice(0), &[1, 2, 3]);
        assert_eq!(v.slice(1), &[] as &[u32]);
        assert_eq!(v.slice(2), &[9]);
        assert_eq!(v.total_size(), 4);
    }

    #[test]
    fn two_pass_matches_append_up_to_order() {
        let items: Vec<(usize, u32)> =
            vec![(0, 10), (2, 20), (0, 11), (1, 30), (2, 21), (2, 22)];

        let mut v: VectorOfVectors<u32> = VectorOfVectors::create_new(None, 4096).unwrap();
        v.begin_pass1(3).unwrap();
        for &(k, _) in &items {
            v.increment_count(k);
        }
        v.begin_pass2().unwrap();
        for &(k, x) in &items {
            v.store(k, x);
        }
        v.end_pass2().unwrap();

        for k in 0..3 {
            let mut got = v.slice(k).to_vec();
            got.sort_unstable();
            let mut want: Vec<u32> = items
                .iter()
                .filter(|(key, _)| *key == k)
                .map(|&(_, x)| x)
                .collect();
            want.sort_unstable();
            assert_eq!(got, want, "key {k}");
        }
    }

    #[test]
    fn multithreaded_two_pass_is_complete() {
        use std::sync::Arc;

        let n_keys = 64usize;
        let per_thread = 500usize;
        let threads = 4usize;

        let mut v: VectorOfVectors<u64> = VectorOfVectors::create_new(None, 4096).unwrap();
        v.begin_pass1(n_keys).unwrap();
        let shared = Arc::new(v);
        std::thread::scope(|s| {
            for t in 0..threads {
                let v = Arc::clone(&shared);
                s.spawn(move || {
                    for i in 0..per_thread {
                        v.increment_count_multithreaded((t * 7 + i) % n_keys);
                    }
                });
            }
        });
        let mut v = Arc::try_unwrap(shared).ok().unwrap();
        v.begin_pass2().unwrap();
        let shared = Arc::new(v);
        std::thread::scope(|s| {
            for t in 0..threads {
                let v = Arc::clone(&shared);
                s.spawn(move || {
                    for i in 0..per_thread {
                        let k = (t * 7 + i) % n_keys;
                        v.store_multithreaded(k, (t * per_thread + i) as u64);
                    }
                });
            }
        });
        let mut v = Arc::try_unwrap(shared).ok().unwrap();
        v.end_pass2().unwrap();
        assert_eq!(v.total_size(), threads * per_thread);
    }

    #[test]
    fn file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("Spans");
        {
            let mut v: VectorOfVectors<u64> =
                VectorOfVectors::create_new(Some(name.clone()), 4096).unwrap();
            v.append_vector(&[4, 5]).unwrap();
            v.append_vector(&[6]).unwrap();
            v.unreserve().unwrap();
        }
        let v = VectorOfVectors::<u64>::access_existing_read_only(name).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.slice(0), &[4, 5]);
        assert_eq!(v.slice(1), &[6]);
    }
}
