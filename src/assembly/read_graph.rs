//! Read graph input: pairwise alignment edges between oriented reads,
//! per-read flags, and the compressed alignment codec.
//!
//! Read graph edges come in reverse-complement pairs: the edge at index
//! `2i + 1` is the strand-flipped copy of the edge at `2i`. The union pass
//! consumes them two at a time and verifies the pairing.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::core::ids::OrientedReadId;
use crate::storage::{LargeData, MappedVector, Pod, StorageError, VectorOfVectors};

const CROSSES_STRANDS: u8 = 1;
const HAS_INCONSISTENT_ALIGNMENT: u8 = 1 << 1;

/// One edge of the read graph.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct ReadGraphEdge {
    pub oriented_read_ids: [OrientedReadId; 2],
    pub alignment_id: u64,
    flags: u8,
    _pad: [u8; 7],
}

unsafe impl Pod for ReadGraphEdge {}

impl ReadGraphEdge {
    pub fn new(
        oriented_read_ids: [OrientedReadId; 2],
        alignment_id: u64,
        crosses_strands: bool,
        has_inconsistent_alignment: bool,
    ) -> Self {
        let mut flags = 0;
        if crosses_strands {
            flags |= CROSSES_STRANDS;
        }
        if has_inconsistent_alignment {
            flags |= HAS_INCONSISTENT_ALIGNMENT;
        }
        ReadGraphEdge {
            oriented_read_ids,
            alignment_id,
            flags,
            _pad: [0; 7],
        }
    }

    pub fn crosses_strands(&self) -> bool {
        self.flags & CROSSES_STRANDS != 0
    }

    pub fn has_inconsistent_alignment(&self) -> bool {
        self.flags & HAS_INCONSISTENT_ALIGNMENT != 0
    }

    /// The reverse-complement copy of this edge.
    pub fn flipped(&self) -> Self {
        let mut edge = *self;
        edge.oriented_read_ids[0].flip_strand();
        edge.oriented_read_ids[1].flip_strand();
        edge
    }
}

/// Read graph edges, per-read chimeric flags, and the compressed
/// alignments they reference.
pub struct ReadGraph {
    pub edges: MappedVector<ReadGraphEdge>,
    /// One byte per read; bit 0 is the chimeric flag.
    pub read_flags: MappedVector<u8>,
    pub compressed_alignments: VectorOfVectors<u8>,
}

impl ReadGraph {
    pub const EDGES_NAME: &'static str = "ReadGraphEdges";
    pub const READ_FLAGS_NAME: &'static str = "ReadFlags";
    pub const ALIGNMENTS_NAME: &'static str = "CompressedAlignments";

    pub fn access_existing(large_data: &LargeData) -> Result<Self, StorageError> {
        Ok(ReadGraph {
            edges: MappedVector::access_existing_read_only(
                &large_data.name(Self::EDGES_NAME).unwrap(),
            )?,
            read_flags: MappedVector::access_existing_read_only(
                &large_data.name(Self::READ_FLAGS_NAME).unwrap(),
            )?,
            compressed_alignments: VectorOfVectors::access_existing_read_only(
                large_data.name(Self::ALIGNMENTS_NAME).unwrap(),
            )?,
        })
    }

    /// Assemble a read graph from plain vectors. Used by tests and tooling.
    pub fn from_parts(
        edges: &[ReadGraphEdge],
        chimeric: &[bool],
        alignments: &[Vec<[u32; 2]>],
    ) -> Result<Self> {
        let mut edge_store = MappedVector::create_new(None, 4096)?;
        edge_store.extend_from_slice(edges)?;
        let mut read_flags = MappedVector::create_new(None, 4096)?;
        for &is_chimeric in chimeric {
            read_flags.push(is_chimeric as u8)?;
        }
        let mut compressed_alignments = VectorOfVectors::create_new(None, 4096)?;
        for alignment in alignments {
            compressed_alignments.append_vector(&compress_alignment(alignment))?;
        }
        Ok(ReadGraph {
            edges: edge_store,
            read_flags,
            compressed_alignments,
        })
    }

    pub fn is_chimeric(&self, read_id: u32) -> bool {
        self.read_flags[read_id as usize] & 1 != 0
    }

    pub fn alignment(&self, alignment_id: u64) -> Result<Vec<[u32; 2]>> {
        decompress_alignment(self.compressed_alignments.slice(alignment_id as usize))
    }
}

// ------------------------- alignment codec -------------------------
//
// An alignment is an ordered list of (ordinal0, ordinal1) pairs, both
// strictly increasing. The first pair is stored absolute, later pairs as
// deltas against the previous pair; all values are LEB128 varints.

pub fn compress_alignment(ordinals: &[[u32; 2]]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 * ordinals.len());
    let mut previous = [0u32; 2];
    for (i, pair) in ordinals.iter().enumerate() {
        for side in 0..2 {
            let value = if i == 0 {
                pair[side]
            } else {
                pair[side] - previous[side]
            };
            write_varint(&mut bytes, value);
        }
        previous = *pair;
    }
    bytes
}

pub fn decompress_alignment(mut bytes: &[u8]) -> Result<Vec<[u32; 2]>> {
    let mut ordinals = Vec::new();
    let mut previous = [0u32; 2];
    let mut first = true;
    while !bytes.is_empty() {
        let mut pair = [0u32; 2];
        for side in 0..2 {
            let (value, rest) = read_varint(bytes)?;
            bytes = rest;
            pair[side] = if first { value } else { previous[side] + value };
        }
        ordinals.push(pair);
        previous = pair;
        first = false;
    }
    Ok(ordinals)
}

fn write_varint(bytes: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return;
        }
        bytes.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8]) -> Result<(u32, &[u8])> {
    let mut value = 0u32;
    let mut shift = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &bytes[i + 1..]));
        }
        shift += 7;
        if shift >= 32 {
            break;
        }
    }
    bail!("truncated or malformed varint in compressed alignment");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_codec_round_trip() {
        let cases: Vec<Vec<[u32; 2]>> = vec![
            vec![],
            vec![[0, 0]],
            vec![[0, 3], [1, 4], [2, 5], [300, 301]],
            vec![[128, 16384], [129, 16385]],
        ];
        for case in cases {
            let bytes = compress_alignment(&case);
            assert_eq!(decompress_alignment(&bytes).unwrap(), case);
        }
    }

    #[test]
    fn malformed_alignment_is_rejected() {
        // A lone continuation byte never terminates.
        assert!(decompress_alignment(&[0x80]).is_err());
    }

    #[test]
    fn edge_flags_and_flip() {
        let edge = ReadGraphEdge::new(
            [OrientedReadId::new(0, 0), OrientedReadId::new(1, 1)],
            7,
            false,
            true,
        );
        assert!(!edge.crosses_strands());
        assert!(edge.has_inconsistent_alignment());
        let flipped = edge.flipped();
        assert_eq!(
            flipped.oriented_read_ids,
            [OrientedReadId::new(0, 1), OrientedReadId::new(1, 0)]
        );
        assert_eq!(flipped.alignment_id, 7);
    }
}
