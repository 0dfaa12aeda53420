//! Mode-3 assembly graph: segments, pseudo-paths, transitions, links.
//!
//! Segments are maximal linear chains of marker graph edges (every
//! interior vertex has in-degree and out-degree exactly 1, flags
//! ignored). Each oriented read induces a pseudo-path: the ordered list
//! of segment positions its marker graph path visits. Adjacent
//! pseudo-path entries on different segments are transitions; segment
//! pairs with enough transitions become links. Segments and links are
//! what the GFA output carries.

use anyhow::{anyhow, ensure, Result};
use bit_vec::BitVec;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::ids::{EdgeId, OrientedReadId, SegmentId};
use crate::core::MarkerTable;
use crate::storage::{LargeData, MappedVector, Pod, VectorOfVectors};
use crate::utils::load_balancer::LoadBalancer;
use crate::utils::WorkerPool;

/// A marker graph edge reference on a segment path. Packs
/// `edge_id:63, is_virtual:1`; virtual entries stand for gaps bridged by
/// downstream stages and never refer to a real edge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct MarkerGraphEdgeInfo(u64);

unsafe impl Pod for MarkerGraphEdgeInfo {}

impl MarkerGraphEdgeInfo {
    pub fn new(edge_id: EdgeId, is_virtual: bool) -> Self {
        MarkerGraphEdgeInfo((edge_id & 0x7fff_ffff_ffff_ffff) | ((is_virtual as u64) << 63))
    }

    pub fn edge_id(&self) -> EdgeId {
        self.0 & 0x7fff_ffff_ffff_ffff
    }

    pub fn is_virtual(&self) -> bool {
        self.0 >> 63 != 0
    }
}

/// Position of a marker graph edge on its segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct MarkerGraphEdgeTableEntry {
    pub segment_id: SegmentId,
    pub position: u32,
    _pad: u32,
}

unsafe impl Pod for MarkerGraphEdgeTableEntry {}

impl MarkerGraphEdgeTableEntry {
    const INVALID: MarkerGraphEdgeTableEntry = MarkerGraphEdgeTableEntry {
        segment_id: u64::MAX,
        position: u32::MAX,
        _pad: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.segment_id != u64::MAX
    }
}

impl Default for MarkerGraphEdgeTableEntry {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One visit of an oriented read to a segment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct PseudoPathEntry {
    pub segment_id: SegmentId,
    pub position: u32,
    pub ordinals: [u32; 2],
    _pad: u32,
}

unsafe impl Pod for PseudoPathEntry {}

impl PartialOrd for PseudoPathEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PseudoPathEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.segment_id, self.position, self.ordinals)
            .cmp(&(other.segment_id, other.position, other.ordinals))
    }
}

/// A pair of adjacent pseudo-path entries on different segments, with the
/// oriented read that generated it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Transition {
    pub oriented_read_id: OrientedReadId,
    _pad: u32,
    pub entries: [PseudoPathEntry; 2],
}

unsafe impl Pod for Transition {}

/// An inferred connection between two segments.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Link {
    pub segment_id0: SegmentId,
    pub segment_id1: SegmentId,
    pub coverage: u64,
}

unsafe impl Pod for Link {}

/// Per-read oriented read information on a segment, used for segment
/// pair analysis.
#[derive(Clone, Debug, Default)]
pub struct SegmentOrientedReadInformation {
    /// (oriented read, average offset of the segment start relative to
    /// the read's marker ordinals), sorted by oriented read.
    pub infos: Vec<(OrientedReadId, i32)>,
    pub average_coverage: f64,
}

/// Result of comparing the oriented reads of two segments.
#[derive(Clone, Debug, Default)]
pub struct SegmentPairInformation {
    pub total_count: [usize; 2],
    pub common_count: u64,
    /// Estimated offset of segment 1 relative to segment 0, in markers.
    /// Only meaningful when `common_count > 0`.
    pub offset: i64,
    /// Reads present on one segment that should overlap the other but do
    /// not.
    pub unexplained_count: [usize; 2],
    /// Reads present on one segment too short to reach the other.
    pub short_count: [usize; 2],
}

pub struct Mode3AssemblyGraph {
    /// Marker graph path of each segment.
    pub paths: VectorOfVectors<MarkerGraphEdgeInfo>,
    pub marker_graph_edge_table: MappedVector<MarkerGraphEdgeTableEntry>,
    pub links: MappedVector<Link>,
    /// Supporting transitions of each link, parallel to `links`.
    pub transitions: VectorOfVectors<Transition>,
    pub links_by_source: VectorOfVectors<u64>,
    pub links_by_target: VectorOfVectors<u64>,
}

impl Mode3AssemblyGraph {
    pub const PATHS_NAME: &'static str = "Mode3-Paths";
    pub const EDGE_TABLE_NAME: &'static str = "mode3-MarkerGraphEdgeTable";
    pub const LINKS_NAME: &'static str = "Mode3-Links";
    pub const TRANSITIONS_NAME: &'static str = "Mode3-Transitions";
    pub const LINKS_BY_SOURCE_NAME: &'static str = "Mode3-LinksBySource";
    pub const LINKS_BY_TARGET_NAME: &'static str = "Mode3-LinksByTarget";

    /// Build the Mode-3 assembly graph from the marker graph.
    pub fn create(
        graph: &MarkerGraph,
        markers: &MarkerTable,
        min_link_coverage: u64,
        large_data: &LargeData,
        pool: &WorkerPool,
    ) -> Result<Self> {
        let mut mode3 = Mode3AssemblyGraph {
            paths: VectorOfVectors::create_new(
                large_data.name(Self::PATHS_NAME),
                large_data.page_size,
            )?,
            marker_graph_edge_table: MappedVector::create_new(
                large_data.name(Self::EDGE_TABLE_NAME),
                large_data.page_size,
            )?,
            links: MappedVector::create_new(
                large_data.name(Self::LINKS_NAME),
                large_data.page_size,
            )?,
            transitions: VectorOfVectors::create_new(
                large_data.name(Self::TRANSITIONS_NAME),
                large_data.page_size,
            )?,
            links_by_source: VectorOfVectors::create_new(
                large_data.name(Self::LINKS_BY_SOURCE_NAME),
                large_data.page_size,
            )?,
            links_by_target: VectorOfVectors::create_new(
                large_data.name(Self::LINKS_BY_TARGET_NAME),
                large_data.page_size,
            )?,
        };

        mode3.create_segments(graph)?;
        mode3.compute_marker_graph_edge_table(graph, pool)?;

        let mut pseudo_paths = mode3.compute_pseudo_paths(graph, markers, large_data, pool)?;
        let transition_map = find_transitions(&pseudo_paths, markers);
        pseudo_paths.remove()?;

        mode3.create_links(&transition_map, min_link_coverage)?;
        mode3.create_connectivity()?;

        info!(
            segments = mode3.segment_count(),
            links = mode3.links.len(),
            "mode 3 assembly graph constructed"
        );
        Ok(mode3)
    }

    pub fn segment_count(&self) -> u64 {
        self.paths.len() as u64
    }

    pub fn path(&self, segment_id: SegmentId) -> &[MarkerGraphEdgeInfo] {
        self.paths.slice(segment_id as usize)
    }

    /// Each maximal linear chain of marker graph edges becomes a segment.
    /// Every edge lands in exactly one segment; circular chains are
    /// detected and produce one segment holding the whole cycle.
    fn create_segments(&mut self, graph: &MarkerGraph) -> Result<()> {
        let edge_count = graph.edge_count();
        let mut was_found = BitVec::from_elem(edge_count as usize, false);

        let mut next_edges: Vec<EdgeId> = Vec::new();
        let mut previous_edges: Vec<EdgeId> = Vec::new();
        let mut path: Vec<MarkerGraphEdgeInfo> = Vec::new();

        for start_edge_id in 0..edge_count {
            if was_found[start_edge_id as usize] {
                continue;
            }

            // Forward.
            next_edges.clear();
            let mut edge_id = start_edge_id;
            let mut is_circular = false;
            loop {
                let v1 = graph.edges[edge_id as usize].target;
                if graph.edges_by_source.size_of(v1 as usize) != 1
                    || graph.edges_by_target.size_of(v1 as usize) != 1
                {
                    break;
                }
                edge_id = graph.out_edges(v1).next().unwrap();
                if edge_id == start_edge_id {
                    is_circular = true;
                    break;
                }
                ensure!(!was_found[edge_id as usize]);
                next_edges.push(edge_id);
            }

            // Backward.
            previous_edges.clear();
            if !is_circular {
                let mut edge_id = start_edge_id;
                loop {
                    let v0 = graph.edges[edge_id as usize].source;
                    if graph.edges_by_source.size_of(v0 as usize) != 1
                        || graph.edges_by_target.size_of(v0 as usize) != 1
                    {
                        break;
                    }
                    edge_id = graph.in_edges(v0).next().unwrap();
                    ensure!(!was_found[edge_id as usize]);
                    previous_edges.push(edge_id);
                }
            }

            path.clear();
            path.extend(
                previous_edges
                    .iter()
                    .rev()
                    .map(|&e| MarkerGraphEdgeInfo::new(e, false)),
            );
            path.push(MarkerGraphEdgeInfo::new(start_edge_id, false));
            path.extend(next_edges.iter().map(|&e| MarkerGraphEdgeInfo::new(e, false)));

            for info in &path {
                ensure!(!was_found[info.edge_id() as usize]);
                was_found.set(info.edge_id() as usize, true);
            }
            self.paths.append_vector(&path)?;
        }

        ensure!(
            was_found.all(),
            "some marker graph edges were not assigned to a segment"
        );
        self.paths.unreserve()?;
        Ok(())
    }

    /// For every marker graph edge, record the segment and position it
    /// lives at. Filled in parallel over segments.
    fn compute_marker_graph_edge_table(
        &mut self,
        graph: &MarkerGraph,
        pool: &WorkerPool,
    ) -> Result<()> {
        self.marker_graph_edge_table
            .resize(graph.edge_count() as usize)?;
        self.marker_graph_edge_table
            .fill(MarkerGraphEdgeTableEntry::INVALID);

        let table = &self.marker_graph_edge_table;
        let paths = &self.paths;
        let balancer = LoadBalancer::new(self.paths.len() as u64, 100);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for segment_id in begin..end {
                    for (position, info) in paths.slice(segment_id as usize).iter().enumerate() {
                        if info.is_virtual() {
                            continue;
                        }
                        // Each edge belongs to exactly one segment, so
                        // writes never collide.
                        unsafe {
                            table.write_shared(
                                info.edge_id() as usize,
                                MarkerGraphEdgeTableEntry {
                                    segment_id,
                                    position: position as u32,
                                    _pad: 0,
                                },
                            )
                        };
                    }
                }
            }
            Ok(())
        })
    }

    /// Pseudo-paths of all oriented reads, two-pass keyed by the oriented
    /// read value and sorted per read.
    fn compute_pseudo_paths(
        &mut self,
        graph: &MarkerGraph,
        markers: &MarkerTable,
        large_data: &LargeData,
        pool: &WorkerPool,
    ) -> Result<VectorOfVectors<PseudoPathEntry>> {
        let mut pseudo_paths: VectorOfVectors<PseudoPathEntry> = VectorOfVectors::create_new(
            large_data.name("tmp-Mode3-PseudoPaths"),
            large_data.page_size,
        )?;
        let edge_count = graph.edge_count();

        pseudo_paths.begin_pass1(markers.oriented_read_count())?;
        {
            let table = &self.marker_graph_edge_table;
            let balancer = LoadBalancer::new(edge_count, 1000);
            pool.run(|_| {
                while let Some((begin, end)) = balancer.next_batch() {
                    for edge_id in begin..end {
                        ensure!(
                            table[edge_id as usize].is_valid(),
                            "marker graph edge {edge_id} missing from the segment table"
                        );
                        for interval in graph.edge_marker_intervals.slice(edge_id as usize) {
                            pseudo_paths.increment_count_multithreaded(
                                interval.oriented_read_id.value() as usize,
                            );
                        }
                    }
                }
                Ok(())
            })?;
        }
        pseudo_paths.begin_pass2()?;
        {
            let table = &self.marker_graph_edge_table;
            let balancer = LoadBalancer::new(edge_count, 1000);
            pool.run(|_| {
                while let Some((begin, end)) = balancer.next_batch() {
                    for edge_id in begin..end {
                        let entry = table[edge_id as usize];
                        for interval in graph.edge_marker_intervals.slice(edge_id as usize) {
                            pseudo_paths.store_multithreaded(
                                interval.oriented_read_id.value() as usize,
                                PseudoPathEntry {
                                    segment_id: entry.segment_id,
                                    position: entry.position,
                                    ordinals: interval.ordinals,
                                    _pad: 0,
                                },
                            );
                        }
                    }
                }
                Ok(())
            })?;
        }
        pseudo_paths.end_pass2()?;

        // Sort each oriented read's entries into traversal order.
        let balancer = LoadBalancer::new(pseudo_paths.len() as u64, 100);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    // Batches cover disjoint keys.
                    let slice = unsafe { pseudo_paths.slice_mut_unsynchronized(i as usize) };
                    slice.sort_unstable();
                }
            }
            Ok(())
        })?;
        Ok(pseudo_paths)
    }

    /// Create a link for every segment pair with enough transitions, and
    /// store the supporting transitions.
    fn create_links(
        &mut self,
        transition_map: &BTreeMap<(SegmentId, SegmentId), Vec<Transition>>,
        min_link_coverage: u64,
    ) -> Result<()> {
        for (&(segment_id0, segment_id1), transitions) in transition_map {
            let coverage = transitions.len() as u64;
            if coverage < min_link_coverage {
                continue;
            }
            self.links.push(Link {
                segment_id0,
                segment_id1,
                coverage,
            })?;
            self.transitions.append_vector(transitions)?;
        }
        self.links.unreserve()?;
        self.transitions.unreserve()?;
        Ok(())
    }

    /// `links_by_source` / `links_by_target`, two-pass over links.
    fn create_connectivity(&mut self) -> Result<()> {
        let n = self.segment_count() as usize;
        self.links_by_source.begin_pass1(n)?;
        self.links_by_target.begin_pass1(n)?;
        for link in self.links.iter() {
            self.links_by_source
                .increment_count(link.segment_id0 as usize);
            self.links_by_target
                .increment_count(link.segment_id1 as usize);
        }
        // Borrow dance: collect before pass 2 mutates the containers.
        let links: Vec<Link> = self.links.as_slice().to_vec();
        self.links_by_source.begin_pass2()?;
        self.links_by_target.begin_pass2()?;
        for (link_id, link) in links.iter().enumerate() {
            self.links_by_source
                .store(link.segment_id0 as usize, link_id as u64);
            self.links_by_target
                .store(link.segment_id1 as usize, link_id as u64);
        }
        self.links_by_source.end_pass2()?;
        self.links_by_target.end_pass2()?;
        Ok(())
    }

    /// Distinct oriented reads on a segment's path, plus the average edge
    /// coverage of the path.
    pub fn find_oriented_reads_on_segment(
        &self,
        graph: &MarkerGraph,
        segment_id: SegmentId,
    ) -> (Vec<OrientedReadId>, f64) {
        let path = self.path(segment_id);
        let mut oriented_reads: Vec<OrientedReadId> = Vec::new();
        let mut coverage_sum = 0f64;
        for info in path {
            debug_assert!(!info.is_virtual());
            let intervals = graph.edge_marker_intervals.slice(info.edge_id() as usize);
            coverage_sum += intervals.len() as f64;
            for interval in intervals {
                oriented_reads.push(interval.oriented_read_id);
            }
        }
        oriented_reads.sort_unstable();
        oriented_reads.dedup();
        (oriented_reads, coverage_sum / path.len() as f64)
    }

    /// Average offset of each oriented read relative to the segment
    /// start, from the positions and ordinals of the path's intervals.
    pub fn oriented_read_information(
        &self,
        graph: &MarkerGraph,
        segment_id: SegmentId,
    ) -> SegmentOrientedReadInformation {
        let path = self.path(segment_id);
        // oriented read -> (term count, offset sum)
        let mut table: BTreeMap<OrientedReadId, (u64, i64)> = BTreeMap::new();
        let mut coverage_sum = 0f64;
        for (position, info) in path.iter().enumerate() {
            debug_assert!(!info.is_virtual());
            let intervals = graph.edge_marker_intervals.slice(info.edge_id() as usize);
            coverage_sum += intervals.len() as f64;
            for interval in intervals {
                let entry = table.entry(interval.oriented_read_id).or_insert((0, 0));
                entry.0 += 2;
                entry.1 += position as i64 - interval.ordinals[0] as i64;
                entry.1 += (position as i64 + 1) - interval.ordinals[1] as i64;
            }
        }
        SegmentOrientedReadInformation {
            infos: table
                .into_iter()
                .map(|(oriented_read_id, (n, sum))| {
                    (
                        oriented_read_id,
                        (sum as f64 / n as f64).round() as i32,
                    )
                })
                .collect(),
            average_coverage: coverage_sum / path.len() as f64,
        }
    }

    /// Estimate the marker offset between two segments from their common
    /// oriented reads. Returns `(offset, common read count)`; the offset
    /// is meaningless when the count is zero.
    pub fn estimate_offset(
        info0: &SegmentOrientedReadInformation,
        info1: &SegmentOrientedReadInformation,
    ) -> (i64, u64) {
        let mut offset_sum = 0i64;
        let mut common = 0u64;
        let mut it0 = info0.infos.iter().peekable();
        let mut it1 = info1.infos.iter().peekable();
        while let (Some(&&(read0, offset0)), Some(&&(read1, offset1))) = (it0.peek(), it1.peek()) {
            match read0.cmp(&read1) {
                std::cmp::Ordering::Less => {
                    it0.next();
                }
                std::cmp::Ordering::Greater => {
                    it1.next();
                }
                std::cmp::Ordering::Equal => {
                    common += 1;
                    offset_sum += offset0 as i64 - offset1 as i64;
                    it0.next();
                    it1.next();
                }
            }
        }
        if common == 0 {
            (i64::MAX, 0)
        } else {
            (
                (offset_sum as f64 / common as f64).round() as i64,
                common,
            )
        }
    }

    /// Compare the oriented reads of two segments: common count, offset,
    /// and reads unexplained by the offset (present on one segment but
    /// absent from the other although they would overlap it).
    pub fn analyze_segment_pair(
        &self,
        markers: &MarkerTable,
        segment_id0: SegmentId,
        segment_id1: SegmentId,
        info0: &SegmentOrientedReadInformation,
        info1: &SegmentOrientedReadInformation,
    ) -> SegmentPairInformation {
        let mut result = SegmentPairInformation {
            total_count: [info0.infos.len(), info1.infos.len()],
            ..Default::default()
        };
        let (offset, common_count) = Self::estimate_offset(info0, info1);
        result.offset = offset;
        result.common_count = common_count;
        if common_count == 0 {
            return result;
        }

        let length0 = self.paths.size_of(segment_id0 as usize) as i64;
        let length1 = self.paths.size_of(segment_id1 as usize) as i64;

        // Joint walk over the two sorted read lists.
        let (mut i0, mut i1) = (0usize, 0usize);
        while i0 < info0.infos.len() || i1 < info1.infos.len() {
            let next0 = info0.infos.get(i0);
            let next1 = info1.infos.get(i1);
            let only_on_0 = match (next0, next1) {
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(&(read0, _)), Some(&(read1, _))) => {
                    if read0 == read1 {
                        // Common read, nothing to explain.
                        i0 += 1;
                        i1 += 1;
                        continue;
                    }
                    read0 < read1
                }
                (None, None) => unreachable!(),
            };

            if only_on_0 {
                // Present only on segment 0: would it overlap segment 1?
                let (read0, offset0) = info0.infos[i0];
                let read_length = markers.count_of(read0) as i64;
                let begin = offset0 as i64 - offset;
                let end = begin + read_length;
                if begin < length1 && end > 0 {
                    result.unexplained_count[0] += 1;
                } else {
                    result.short_count[0] += 1;
                }
                i0 += 1;
            } else {
                let (read1, offset1) = info1.infos[i1];
                let read_length = markers.count_of(read1) as i64;
                let begin = offset1 as i64 + offset;
                let end = begin + read_length;
                if begin < length0 && end > 0 {
                    result.unexplained_count[1] += 1;
                } else {
                    result.short_count[1] += 1;
                }
                i1 += 1;
            }
        }
        result
    }

    /// GFA v1: one `S` record per segment (no sequence, path length as
    /// `LN`), one `L` record per link.
    pub fn write_gfa(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow!("unable to create GFA file {}: {e}", path.display()))?;
        let mut gfa = std::io::BufWriter::new(file);
        writeln!(gfa, "H\tVN:Z:1.0")?;
        for segment_id in 0..self.segment_count() {
            writeln!(
                gfa,
                "S\t{segment_id}\t*\tLN:i:{}",
                self.paths.size_of(segment_id as usize)
            )?;
        }
        for link in self.links.iter() {
            writeln!(
                gfa,
                "L\t{}\t+\t{}\t+\t0M",
                link.segment_id0, link.segment_id1
            )?;
        }
        gfa.flush()?;
        Ok(())
    }
}

/// Transitions of all oriented reads: adjacent pseudo-path entries whose
/// segments differ, keyed by the segment pair. BTreeMap keeps link order
/// deterministic.
fn find_transitions(
    pseudo_paths: &VectorOfVectors<PseudoPathEntry>,
    markers: &MarkerTable,
) -> BTreeMap<(SegmentId, SegmentId), Vec<Transition>> {
    let mut transition_map: BTreeMap<(SegmentId, SegmentId), Vec<Transition>> = BTreeMap::new();
    for read_id in 0..markers.read_count() as u32 {
        for strand in 0..2u32 {
            let oriented_read_id = OrientedReadId::new(read_id, strand);
            let pseudo_path = pseudo_paths.slice(oriented_read_id.value() as usize);
            for window in pseudo_path.windows(2) {
                let (previous, current) = (window[0], window[1]);
                if previous.segment_id == current.segment_id {
                    continue;
                }
                transition_map
                    .entry((previous.segment_id, current.segment_id))
                    .or_default()
                    .push(Transition {
                        oriented_read_id,
                        _pad: 0,
                        entries: [previous, current],
                    });
            }
        }
    }
    transition_map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_info_packing() {
        let info = MarkerGraphEdgeInfo::new(12345, false);
        assert_eq!(info.edge_id(), 12345);
        assert!(!info.is_virtual());

        let virt = MarkerGraphEdgeInfo::new(7, true);
        assert_eq!(virt.edge_id(), 7);
        assert!(virt.is_virtual());
    }

    #[test]
    fn pseudo_path_entry_ordering() {
        let a = PseudoPathEntry {
            segment_id: 1,
            position: 5,
            ordinals: [0, 1],
            _pad: 0,
        };
        let b = PseudoPathEntry {
            segment_id: 1,
            position: 6,
            ordinals: [0, 1],
            _pad: 0,
        };
        let c = PseudoPathEntry {
            segment_id: 2,
            position: 0,
            ordinals: [0, 1],
            _pad: 0,
        };
        assert!(a < b && b < c);
    }

    #[test]
    fn estimate_offset_on_common_reads() {
        let info0 = SegmentOrientedReadInformation {
            infos: vec![
                (OrientedReadId::new(0, 0), 10),
                (OrientedReadId::new(1, 0), 12),
            ],
            average_coverage: 2.0,
        };
        let info1 = SegmentOrientedReadInformation {
            infos: vec![
                (OrientedReadId::new(0, 0), 4),
                (OrientedReadId::new(2, 0), 0),
            ],
            average_coverage: 2.0,
        };
        let (offset, common) = Mode3AssemblyGraph::estimate_offset(&info0, &info1);
        assert_eq!(common, 1);
        assert_eq!(offset, 6);

        let empty = SegmentOrientedReadInformation::default();
        let (_, common) = Mode3AssemblyGraph::estimate_offset(&info0, &empty);
        assert_eq!(common, 0);
    }
}
