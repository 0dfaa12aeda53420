//! Fixed-length memory-mapped arena.
//!
//! A [`MappedVector`] holds plain-old-data records either in anonymous
//! memory or in a file under the configured large-data prefix. File-backed
//! arenas start with a small header (magic, element size, length) so they
//! can be reopened across runs; the data region starts at a fixed 64-byte
//! offset, which keeps every element type up to 16-byte alignment happy
//! because mappings are page aligned.

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;

use super::{Pod, StorageError};

const MAGIC: u64 = 0x4d46_4152_454e_4131; // "MFARENA1"
const DATA_OFFSET: usize = 64;

#[repr(C)]
#[derive(Copy, Clone)]
struct ArenaHeader {
    magic: u64,
    element_size: u64,
    len: u64,
    reserved: u64,
}

enum Backing {
    Unallocated,
    Anonymous(MmapMut),
    File {
        map: MmapMut,
        file: File,
        path: PathBuf,
    },
    ReadOnly {
        map: Mmap,
        path: PathBuf,
    },
}

impl Default for Backing {
    fn default() -> Self {
        Backing::Unallocated
    }
}

pub struct MappedVector<T: Pod> {
    backing: Backing,
    len: usize,
    capacity: usize,
    page_size: usize,
    _phantom: PhantomData<T>,
}

impl<T: Pod> std::fmt::Debug for MappedVector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedVector")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("page_size", &self.page_size)
            .finish()
    }
}

// The raw-pointer paths below only ever write distinct indices from
// distinct threads (see `write_shared`), everything else takes &mut self.
unsafe impl<T: Pod> Send for MappedVector<T> {}
unsafe impl<T: Pod> Sync for MappedVector<T> {}

impl<T: Pod> MappedVector<T> {
    /// Create an empty arena. `name` of `None` selects anonymous memory;
    /// `Some(path)` creates (truncating) a file-backed arena at `path`.
    pub fn create_new(name: Option<PathBuf>, page_size: usize) -> Result<Self, StorageError> {
        let page_size = page_size.max(4096);
        let backing = match name {
            None => Backing::Unallocated,
            Some(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|source| StorageError::OpenForWrite {
                        name: path.clone(),
                        source,
                    })?;
                file.set_len(round_up(DATA_OFFSET, page_size) as u64)?;
                let mut map = unsafe { MmapOptions::new().map_mut(&file)? };
                write_header::<T>(&mut map, 0);
                Backing::File { map, file, path }
            }
        };
        Ok(MappedVector {
            backing,
            len: 0,
            capacity: 0,
            page_size,
            _phantom: PhantomData,
        })
    }

    /// Open an existing file-backed arena read-only. Fatal (with the array
    /// name) if the file is missing or its header does not match `T`.
    pub fn access_existing_read_only(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path).map_err(|source| StorageError::OpenForRead {
            name: path.to_owned(),
            source,
        })?;
        let map = unsafe { MmapOptions::new().map(&file)? };
        let (len, capacity) = check_header::<T>(&map, path)?;
        Ok(MappedVector {
            backing: Backing::ReadOnly {
                map,
                path: path.to_owned(),
            },
            len,
            capacity,
            page_size: 4096,
            _phantom: PhantomData,
        })
    }

    /// Open an existing file-backed arena for read-write access.
    pub fn access_existing_read_write(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| StorageError::OpenForRead {
                name: path.to_owned(),
                source,
            })?;
        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        let (len, capacity) = check_header::<T>(&map, path)?;
        Ok(MappedVector {
            backing: Backing::File {
                map,
                file,
                path: path.to_owned(),
            },
            len,
            capacity,
            page_size: 4096,
            _phantom: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the length to `n`, growing capacity exactly to `n` if needed.
    /// New elements are zero-initialized (mapped pages start zeroed).
    pub fn resize(&mut self, n: usize) -> Result<(), StorageError> {
        if n > self.capacity {
            self.set_capacity(n)?;
        }
        self.len = n;
        self.sync_header();
        Ok(())
    }

    /// Reserve and size in one step; identical to [`resize`](Self::resize)
    /// but named for call sites that size an arena once up front.
    pub fn reserve_and_resize(&mut self, n: usize) -> Result<(), StorageError> {
        self.resize(n)
    }

    /// Trim capacity down to the current length.
    pub fn unreserve(&mut self) -> Result<(), StorageError> {
        if self.capacity > self.len {
            self.set_capacity(self.len)?;
        }
        Ok(())
    }

    pub fn push(&mut self, value: T) -> Result<(), StorageError> {
        if self.len == self.capacity {
            let grown = (self.capacity * 2).max(16);
            self.set_capacity(grown)?;
        }
        let i = self.len;
        self.len += 1;
        self.as_mut_slice()[i] = value;
        self.sync_header();
        Ok(())
    }

    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<(), StorageError> {
        let old_len = self.len;
        let new_len = old_len + values.len();
        if new_len > self.capacity {
            let grown = new_len.max(self.capacity * 2);
            self.set_capacity(grown)?;
        }
        self.len = new_len;
        self.as_mut_slice()[old_len..].copy_from_slice(values);
        self.sync_header();
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Drop the arena and delete its backing file, if any. Used for all
    /// `tmp-` arenas before the owning pass returns.
    pub fn remove(&mut self) -> Result<(), StorageError> {
        let backing = std::mem::take(&mut self.backing);
        self.len = 0;
        self.capacity = 0;
        match backing {
            Backing::File { map, file, path } => {
                drop(map);
                drop(file);
                std::fs::remove_file(path)?;
            }
            Backing::ReadOnly { map, path } => {
                drop(map);
                std::fs::remove_file(path)?;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        assert!(
            !matches!(self.backing, Backing::ReadOnly { .. }),
            "mutable access to a read-only arena"
        );
        unsafe { std::slice::from_raw_parts_mut(self.data_ptr() as *mut T, self.len) }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Write one element through a shared reference.
    ///
    /// # Safety
    /// Callers must guarantee that no two threads write the same index and
    /// that nobody reads index `i` until the pass joins.
    pub unsafe fn write_shared(&self, i: usize, value: T) {
        debug_assert!(i < self.len);
        debug_assert!(!matches!(self.backing, Backing::ReadOnly { .. }));
        (self.data_ptr() as *mut T).add(i).write(value);
    }

    fn data_ptr(&self) -> *const T {
        let base = match &self.backing {
            Backing::Unallocated => std::ptr::null(),
            Backing::Anonymous(map) => map.as_ptr(),
            Backing::File { map, .. } => map.as_ptr(),
            Backing::ReadOnly { map, .. } => map.as_ptr(),
        };
        if base.is_null() {
            debug_assert_eq!(self.len, 0);
            std::ptr::NonNull::<T>::dangling().as_ptr() as *const T
        } else {
            unsafe { base.add(DATA_OFFSET) as *const T }
        }
    }

    fn set_capacity(&mut self, new_capacity: usize) -> Result<(), StorageError> {
        let bytes = round_up(
            DATA_OFFSET + new_capacity * size_of::<T>(),
            self.page_size,
        );
        let keep = self.len.min(new_capacity);
        match std::mem::take(&mut self.backing) {
            Backing::Unallocated => {
                let map = MmapOptions::new().len(bytes).map_anon()?;
                self.backing = Backing::Anonymous(map);
            }
            Backing::Anonymous(old) => {
                let mut map = MmapOptions::new().len(bytes).map_anon()?;
                let n = (DATA_OFFSET + keep * size_of::<T>()).min(old.len()).min(map.len());
                map[..n].copy_from_slice(&old[..n]);
                self.backing = Backing::Anonymous(map);
            }
            Backing::File { map, file, path } => {
                // The old mapping must be gone before the file shrinks.
                drop(map);
                file.set_len(bytes as u64)?;
                let map = unsafe { MmapOptions::new().map_mut(&file)? };
                self.backing = Backing::File { map, file, path };
            }
            Backing::ReadOnly { .. } => {
                panic!("cannot resize a read-only arena");
            }
        }
        self.capacity = new_capacity;
        self.sync_header();
        Ok(())
    }

    fn sync_header(&mut self) {
        if let Backing::File { map, .. } = &mut self.backing {
            write_header::<T>(map, self.len as u64);
        }
    }
}

impl MappedVector<u64> {
    /// Atomic view of the contents, for counting passes that increment
    /// shared slots from many threads.
    pub fn as_atomic_slice(&self) -> &[AtomicU64] {
        // AtomicU64 has the same layout as u64 and the data region is
        // 8-byte aligned.
        unsafe { std::slice::from_raw_parts(self.data_ptr() as *const AtomicU64, self.len) }
    }
}

impl<T: Pod> std::ops::Index<usize> for MappedVector<T> {
    type Output = T;
    fn index(&self, i: usize) -> &T {
        &self.as_slice()[i]
    }
}

impl<T: Pod> std::ops::IndexMut<usize> for MappedVector<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.as_mut_slice()[i]
    }
}

fn round_up(n: usize, unit: usize) -> usize {
    n.div_ceil(unit) * unit
}

fn write_header<T>(map: &mut MmapMut, len: u64) {
    let header = ArenaHeader {
        magic: MAGIC,
        element_size: size_of::<T>() as u64,
        len,
        reserved: 0,
    };
    let bytes = unsafe {
        std::slice::from_raw_parts(
            &header as *const ArenaHeader as *const u8,
            size_of::<ArenaHeader>(),
        )
    };
    map[..bytes.len()].copy_from_slice(bytes);
}

fn check_header<T>(map: &[u8], path: &Path) -> Result<(usize, usize), StorageError> {
    if map.len() < DATA_OFFSET {
        return Err(StorageError::BadHeader {
            name: path.to_owned(),
        });
    }
    let mut header = ArenaHeader {
        magic: 0,
        element_size: 0,
        len: 0,
        reserved: 0,
    };
    unsafe {
        std::ptr::copy_nonoverlapping(
            map.as_ptr(),
            &mut header as *mut ArenaHeader as *mut u8,
            size_of::<ArenaHeader>(),
        );
    }
    if header.magic != MAGIC {
        return Err(StorageError::BadHeader {
            name: path.to_owned(),
        });
    }
    if header.element_size != size_of::<T>() as u64 {
        return Err(StorageError::ElementSizeMismatch {
            name: path.to_owned(),
            expected: size_of::<T>() as u64,
            found: header.element_size,
        });
    }
    let capacity = (map.len() - DATA_OFFSET) / size_of::<T>().max(1);
    Ok((header.len as usize, capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_push_and_index() {
        let mut v: MappedVector<u64> = MappedVector::create_new(None, 4096).unwrap();
        for i in 0..1000u64 {
            v.push(i * 3).unwrap();
        }
        assert_eq!(v.len(), 1000);
        assert_eq!(v[999], 2997);
        assert_eq!(v.as_slice().iter().sum::<u64>(), 3 * 999 * 1000 / 2);
    }

    #[test]
    fn resize_zero_initializes() {
        let mut v: MappedVector<u32> = MappedVector::create_new(None, 4096).unwrap();
        v.reserve_and_resize(100).unwrap();
        assert!(v.as_slice().iter().all(|&x| x == 0));
        v[50] = 7;
        v.unreserve().unwrap();
        assert_eq!(v[50], 7);
    }

    #[test]
    fn file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Numbers");
        {
            let mut v: MappedVector<u64> =
                MappedVector::create_new(Some(path.clone()), 4096).unwrap();
            v.extend_from_slice(&[5, 6, 7, 8]).unwrap();
            v.unreserve().unwrap();
        }
        let v = MappedVector::<u64>::access_existing_read_only(&path).unwrap();
        assert_eq!(v.as_slice(), &[5, 6, 7, 8]);

        // Element size mismatch is detected on reopen.
        assert!(MappedVector::<u32>::access_existing_read_only(&path).is_err());
    }

    #[test]
    fn missing_array_names_the_file() {
        let err = MappedVector::<u64>::access_existing_read_only(Path::new("/no/such/Array"))
            .unwrap_err();
        assert!(err.to_string().contains("Array"));
    }

    #[test]
    fn remove_deletes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp-Scratch");
        let mut v: MappedVector<u8> = MappedVector::create_new(Some(path.clone()), 4096).unwrap();
        v.push(1).unwrap();
        v.remove().unwrap();
        assert!(!path.exists());
    }
}
