//! Marker table: the read-only input mapping every oriented read to its
//! ordered marker sequence.
//!
//! Markers are stored concatenated, indexed by `oriented_read_id.value()`.
//! A global [`MarkerId`] is the position of a marker in that concatenation,
//! which makes marker → (oriented read, ordinal) lookup a binary search
//! over the offset table and the reverse complement of a marker a pure
//! index computation.

use crate::core::ids::{Marker, MarkerId, OrientedReadId};
use crate::storage::{LargeData, StorageError, VectorOfVectors};

pub struct MarkerTable {
    markers: VectorOfVectors<Marker>,
    /// Start of each oriented read's marker range in the concatenation,
    /// plus one trailing entry holding the total. Computed once; the union
    /// pass calls [`marker_id`](Self::marker_id) billions of times.
    offsets: Vec<u64>,
}

impl MarkerTable {
    pub const ARRAY_NAME: &'static str = "Markers";

    /// Open the marker table persisted by the marker-selection stage.
    pub fn access_existing(large_data: &LargeData) -> Result<Self, StorageError> {
        let name = large_data
            .name(Self::ARRAY_NAME)
            .expect("marker table requires a file-backed data directory");
        let markers = VectorOfVectors::access_existing_read_only(name)?;
        let offsets = compute_offsets(&markers);
        Ok(MarkerTable { markers, offsets })
    }

    /// Build a marker table from per-oriented-read marker vectors, indexed
    /// by `oriented_read_id.value()`. Used by tests and by the import
    /// tooling.
    pub fn from_vectors(per_oriented_read: &[Vec<Marker>]) -> Result<Self, StorageError> {
        assert_eq!(
            per_oriented_read.len() % 2,
            0,
            "markers must cover both strands of every read"
        );
        let mut markers = VectorOfVectors::create_new(None, 4096)?;
        for v in per_oriented_read {
            markers.append_vector(v)?;
        }
        let offsets = compute_offsets(&markers);
        Ok(MarkerTable { markers, offsets })
    }

    /// Number of oriented reads (twice the read count).
    pub fn oriented_read_count(&self) -> usize {
        self.markers.len()
    }

    pub fn read_count(&self) -> usize {
        self.markers.len() / 2
    }

    /// Total marker count over all oriented reads.
    pub fn total_count(&self) -> u64 {
        self.markers.total_size() as u64
    }

    pub fn count_of(&self, oriented_read_id: OrientedReadId) -> u32 {
        self.markers.size_of(oriented_read_id.value() as usize) as u32
    }

    pub fn markers_of(&self, oriented_read_id: OrientedReadId) -> &[Marker] {
        self.markers.slice(oriented_read_id.value() as usize)
    }

    /// Global marker id of `(oriented read, ordinal)`.
    pub fn marker_id(&self, oriented_read_id: OrientedReadId, ordinal: u32) -> MarkerId {
        debug_assert!(ordinal < self.count_of(oriented_read_id));
        self.offsets[oriented_read_id.value() as usize] + ordinal as u64
    }

    /// Inverse of [`marker_id`](Self::marker_id).
    pub fn find_marker_id(&self, marker_id: MarkerId) -> (OrientedReadId, u32) {
        debug_assert!(marker_id < self.total_count());
        // partition_point finds the first oriented read starting past the
        // marker; the one before it contains it. The trailing total entry
        // never wins because marker_id < total.
        let value = self.offsets[..self.offsets.len() - 1]
            .partition_point(|&begin| begin <= marker_id)
            - 1;
        let ordinal = (marker_id - self.offsets[value]) as u32;
        (OrientedReadId::from_value(value as u32), ordinal)
    }

    pub fn marker(&self, marker_id: MarkerId) -> Marker {
        let (oriented_read_id, ordinal) = self.find_marker_id(marker_id);
        self.markers_of(oriented_read_id)[ordinal as usize]
    }

    /// The marker id of the same k-mer occurrence seen from the opposite
    /// strand: flip the strand and mirror the ordinal.
    pub fn reverse_complement(&self, marker_id: MarkerId) -> MarkerId {
        let (oriented_read_id, ordinal) = self.find_marker_id(marker_id);
        let count = self.count_of(oriented_read_id);
        self.marker_id(oriented_read_id.flipped(), count - 1 - ordinal)
    }
}

fn compute_offsets(markers: &VectorOfVectors<Marker>) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(markers.len() + 1);
    let mut begin = 0u64;
    for v in 0..markers.len() {
        offsets.push(begin);
        begin += markers.size_of(v) as u64;
    }
    offsets.push(begin);
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MarkerTable {
        // One read: 3 markers forward, 3 markers reverse.
        MarkerTable::from_vectors(&[
            vec![Marker::new(10, 0), Marker::new(11, 5), Marker::new(12, 9)],
            vec![Marker::new(22, 0), Marker::new(21, 4), Marker::new(20, 8)],
        ])
        .unwrap()
    }

    #[test]
    fn marker_id_round_trip() {
        let t = table();
        assert_eq!(t.total_count(), 6);
        for value in 0..2u32 {
            for ordinal in 0..3u32 {
                let id = t.marker_id(OrientedReadId::from_value(value), ordinal);
                assert_eq!(
                    t.find_marker_id(id),
                    (OrientedReadId::from_value(value), ordinal)
                );
            }
        }
    }

    #[test]
    fn reverse_complement_mirrors_ordinal() {
        let t = table();
        let fwd = OrientedReadId::new(0, 0);
        let m0 = t.marker_id(fwd, 0);
        let rc = t.reverse_complement(m0);
        assert_eq!(t.find_marker_id(rc), (OrientedReadId::new(0, 1), 2));
        assert_eq!(t.reverse_complement(rc), m0);
    }
}
