//! Memory-mapped large-array store.
//!
//! Every large array in the pipeline lives in one of these arenas, either
//! anonymous (in-memory) or file-backed under the configured large-data
//! prefix. Temporary arenas are named with a `tmp-` prefix and removed
//! before the pass that owns them returns.

mod mapped_vector;
mod vector_of_vectors;

pub use mapped_vector::MappedVector;
pub use vector_of_vectors::VectorOfVectors;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unable to open array {name:?} for reading")]
    OpenForRead {
        name: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to create array {name:?} for writing")]
    OpenForWrite {
        name: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("array {name:?} holds elements of {found} bytes, expected {expected}")]
    ElementSizeMismatch {
        name: PathBuf,
        expected: u64,
        found: u64,
    },
    #[error("array {name:?} has an unrecognized header")]
    BadHeader { name: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Marker for types that can live in a mapped arena: fixed layout, no
/// pointers, any bit pattern reachable by memcpy.
///
/// # Safety
/// Implementors must be `#[repr(C)]` or `#[repr(transparent)]` with no
/// interior mutability and no invalid bit patterns that the arena could
/// fabricate (zeroed pages are handed out on resize).
pub unsafe trait Pod: Copy + Send + Sync + 'static {}

macro_rules! impl_pod {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Pod for $t {})*
    };
}

impl_pod!(u8, u16, u32, u64, u128, i8, i16, i32, i64, usize, f32, f64);

unsafe impl<T: Pod, const N: usize> Pod for [T; N] {}

/// Naming and sizing context for all large arrays of a run.
///
/// An empty prefix selects anonymous arenas everywhere, which is what the
/// tests use; a prefix like `Data/` makes every array file-backed under
/// that directory, mirroring the on-disk layout of a production run.
#[derive(Clone, Debug)]
pub struct LargeData {
    pub file_name_prefix: String,
    pub page_size: usize,
}

impl LargeData {
    pub fn anonymous() -> Self {
        LargeData {
            file_name_prefix: String::new(),
            page_size: 4096,
        }
    }

    pub fn new(file_name_prefix: impl Into<String>, page_size: usize) -> Self {
        LargeData {
            file_name_prefix: file_name_prefix.into(),
            page_size,
        }
    }

    /// Resolve an array name: `None` (anonymous) when the prefix is empty.
    pub fn name(&self, name: &str) -> Option<PathBuf> {
        if self.file_name_prefix.is_empty() {
            None
        } else {
            Some(PathBuf::from(format!("{}{}", self.file_name_prefix, name)))
        }
    }
}
