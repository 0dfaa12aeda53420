//! Marker graph vertex construction.
//!
//! Vertices are equivalence classes of markers under alignment-derived
//! merging, computed with the lock-free union-find over all oriented
//! markers. The pass sequence:
//!
//! 1. union pass over read-graph edges (also uniting reverse complements,
//!    which keeps the graph invariant under strand swap);
//! 2. convergence sweeps until path compression stops advancing parents,
//!    then a verification sweep and in-place compaction;
//! 3. set-size histogram, automatic `min_coverage` selection if requested;
//! 4. first renumbering keeping sizes in `[min_coverage, max_coverage]`;
//! 5. marker gathering (two-pass) and per-set sorting;
//! 6. bad-set flagging (duplicate reads, strand coverage floor);
//! 7. second renumbering, final vertex table and marker lists.

use anyhow::{bail, ensure, Context, Result};
use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

use crate::assembly::marker_graph::MarkerGraph;
use crate::assembly::read_graph::ReadGraph;
use crate::core::disjoint_sets::{compact, DisjointSets};
use crate::core::ids::{MarkerId, Uint40, VertexId, INVALID_VERTEX_ID};
use crate::core::MarkerTable;
use crate::diagnostics;
use crate::storage::{LargeData, MappedVector, VectorOfVectors};
use crate::utils::configuration::MarkerGraphConfig;
use crate::utils::load_balancer::LoadBalancer;
use crate::utils::peak_finder;
use crate::utils::WorkerPool;

const BATCH_SIZE: u64 = 10_000;
const CONVERGENCE_PASS_LIMIT: usize = 10;

/// Build the vertices of the global marker graph. Returns the
/// `min_coverage` actually used (relevant when automatic selection is
/// configured).
pub fn create_marker_graph_vertices(
    graph: &mut MarkerGraph,
    markers: &MarkerTable,
    read_graph: &ReadGraph,
    config: &MarkerGraphConfig,
    large_data: &LargeData,
    pool: &WorkerPool,
    csv_dir: Option<&Path>,
) -> Result<u64> {
    let oriented_marker_count = markers.total_count();
    info!(
        oriented_marker_count,
        read_graph_edges = read_graph.edges.len(),
        "computing marker graph vertices"
    );

    // The union-find needs 128 bits per element; allocating the table at
    // twice the element count lets compaction halve it in place later.
    let mut disjoint_set_table: MappedVector<u64> = MappedVector::create_new(
        large_data.name("tmp-DisjointSetTable"),
        large_data.page_size,
    )?;
    disjoint_set_table.reserve_and_resize(2 * oriented_marker_count as usize)?;

    {
        let sets = DisjointSets::new(&disjoint_set_table, oriented_marker_count);

        // Union pass over read-graph edges, two at a time: the edge at
        // 2i + 1 must be the strand-flipped copy of the edge at 2i.
        info!("disjoint set computation begins");
        let balancer = LoadBalancer::new_paired(read_graph.edges.len() as u64, BATCH_SIZE)?;
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in (begin..end).step_by(2) {
                    union_read_graph_edge_pair(&sets, markers, read_graph, i)?;
                }
            }
            Ok(())
        })?;
        info!("disjoint set computation completed");

        // Convergence: repeat compressing sweeps until no parent moves.
        let mut converged = false;
        for pass in 1..=CONVERGENCE_PASS_LIMIT {
            sets.parent_updated.store(0, Ordering::Relaxed);
            let balancer = LoadBalancer::new(oriented_marker_count, BATCH_SIZE);
            pool.run(|_| {
                while let Some((begin, end)) = balancer.next_batch() {
                    for i in begin..end {
                        sets.find(i, true);
                    }
                }
                Ok(())
            })?;
            let updated = sets.parent_updated.load(Ordering::Relaxed);
            info!(pass, updated, "disjoint set convergence iteration");
            if updated == 0 {
                converged = true;
                break;
            }
        }
        if !converged {
            // Convergence takes 2 or 3 passes even on very wide machines;
            // running out of the budget means the structure is corrupt.
            bail!(
                "disjoint set parent information did not converge in {} iterations",
                CONVERGENCE_PASS_LIMIT
            );
        }

        // Verification sweep: every parent is its set representative.
        let balancer = LoadBalancer::new(oriented_marker_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    ensure!(
                        sets.parent(i) == sets.find(i, false),
                        "disjoint set parent of {i} is not its representative"
                    );
                }
            }
            Ok(())
        })?;
    }

    // The representative of entry i now sits in the low word of entry i;
    // keep only those words, halving the table.
    info!("compacting the disjoint set table");
    compact(&mut disjoint_set_table, oriented_marker_count)?;

    // Count the markers in each disjoint set.
    info!("counting markers in each disjoint set");
    let mut work_area: MappedVector<u64> =
        MappedVector::create_new(large_data.name("tmp-WorkArea"), large_data.page_size)?;
    work_area.reserve_and_resize(oriented_marker_count as usize)?;
    work_area.fill(0);
    {
        let counts = work_area.as_atomic_slice();
        let table = disjoint_set_table.as_slice();
        let balancer = LoadBalancer::new(oriented_marker_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    let set_id = table[i as usize] as usize;
                    counts[set_id].fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;
    }

    // Histogram of set sizes, and automatic min_coverage selection.
    let mut histogram: Vec<u64> = Vec::new();
    for &size in work_area.iter() {
        if size == 0 {
            continue;
        }
        if size as usize >= histogram.len() {
            histogram.resize(size as usize + 1, 0);
        }
        histogram[size as usize] += 1;
    }
    if let Some(dir) = csv_dir {
        diagnostics::write_disjoint_sets_histogram(dir, &histogram)?;
    }
    let min_coverage = if config.min_coverage == 0 {
        match peak_finder::find_cutoff(
            &histogram,
            config.peak_finder_min_area_fraction,
            config.peak_finder_area_start_index,
        ) {
            Ok(cutoff) => {
                info!(cutoff, "automatically selected min_coverage");
                cutoff
            }
            Err(error) => {
                warn!(
                    %error,
                    "unable to select min_coverage from the disjoint set size \
                     distribution, using 5"
                );
                5
            }
        }
    } else {
        config.min_coverage
    };

    // First renumbering: keep sets whose size is in range.
    info!("renumbering disjoint sets by coverage");
    let mut set_count: VertexId = 0;
    for w in work_area.as_mut_slice().iter_mut() {
        let size = *w;
        if size < min_coverage || size > config.max_coverage {
            *w = INVALID_VERTEX_ID;
        } else {
            *w = set_count;
            set_count += 1;
        }
    }
    info!(set_count, "kept disjoint sets with coverage in range");

    // Reassign markers to the renumbered sets.
    for i in 0..oriented_marker_count as usize {
        let old = disjoint_set_table[i];
        disjoint_set_table[i] = work_area[old as usize];
    }
    work_area.remove()?;

    // Gather the markers of each surviving set, two-pass, then sort each.
    info!("gathering markers in disjoint sets");
    let mut set_markers: VectorOfVectors<MarkerId> = VectorOfVectors::create_new(
        large_data.name("tmp-DisjointSetMarkers"),
        large_data.page_size,
    )?;
    set_markers.begin_pass1(set_count as usize)?;
    {
        let table = disjoint_set_table.as_slice();
        let balancer = LoadBalancer::new(oriented_marker_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    let set_id = table[i as usize];
                    if set_id != INVALID_VERTEX_ID {
                        set_markers.increment_count_multithreaded(set_id as usize);
                    }
                }
            }
            Ok(())
        })?;
    }
    set_markers.begin_pass2()?;
    {
        let table = disjoint_set_table.as_slice();
        let balancer = LoadBalancer::new(oriented_marker_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    let set_id = table[i as usize];
                    if set_id != INVALID_VERTEX_ID {
                        set_markers.store_multithreaded(set_id as usize, i);
                    }
                }
            }
            Ok(())
        })?;
    }
    set_markers.end_pass2()?;

    {
        let balancer = LoadBalancer::new(set_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for set_id in begin..end {
                    // Batches cover disjoint key ranges, so the mutable
                    // slices never alias.
                    let slice = unsafe { set_markers.slice_mut_unsynchronized(set_id as usize) };
                    slice.sort_unstable();
                }
            }
            Ok(())
        })?;
    }

    // Flag bad sets.
    info!("flagging bad disjoint sets");
    let mut is_bad: MappedVector<u8> = MappedVector::create_new(
        large_data.name("tmp-IsBadDisjointSet"),
        large_data.page_size,
    )?;
    is_bad.reserve_and_resize(set_count as usize)?;
    {
        let balancer = LoadBalancer::new(set_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for set_id in begin..end {
                    let bad = is_bad_set(
                        set_markers.slice(set_id as usize),
                        markers,
                        config.allow_duplicate_markers,
                        config.min_coverage_per_strand,
                    );
                    unsafe { is_bad.write_shared(set_id as usize, bad as u8) };
                }
            }
            Ok(())
        })?;
    }
    let bad_count = is_bad.iter().filter(|&&b| b != 0).count() as u64;
    info!(
        bad_count,
        min_coverage_per_strand = config.min_coverage_per_strand,
        "found bad disjoint sets"
    );

    // Second renumbering, dropping the bad sets.
    let mut final_numbering: MappedVector<u64> =
        MappedVector::create_new(large_data.name("tmp-WorkArea"), large_data.page_size)?;
    final_numbering.reserve_and_resize(set_count as usize)?;
    let mut vertex_count: VertexId = 0;
    for set_id in 0..set_count as usize {
        if is_bad[set_id] != 0 {
            final_numbering[set_id] = INVALID_VERTEX_ID;
        } else {
            final_numbering[set_id] = vertex_count;
            vertex_count += 1;
        }
    }
    ensure!(vertex_count + bad_count == set_count);

    // Final vertex table: the vertex id of every marker.
    info!("assigning vertex ids to markers");
    graph
        .vertex_table
        .reserve_and_resize(oriented_marker_count as usize)?;
    for marker_id in 0..oriented_marker_count as usize {
        let set_id = disjoint_set_table[marker_id];
        graph.vertex_table[marker_id] = if set_id == INVALID_VERTEX_ID {
            Uint40::INVALID
        } else {
            let vertex_id = final_numbering[set_id as usize];
            if vertex_id == INVALID_VERTEX_ID {
                Uint40::INVALID
            } else {
                Uint40::new(vertex_id)
            }
        };
    }
    final_numbering.remove()?;
    disjoint_set_table.remove()?;

    // Store the marker lists of the surviving sets, in order; these are
    // the vertices of the global marker graph.
    info!("gathering the markers of each marker graph vertex");
    for set_id in 0..set_count as usize {
        if is_bad[set_id] != 0 {
            continue;
        }
        graph.vertices.append_vector(set_markers.slice(set_id))?;
    }
    graph.vertices.unreserve()?;

    is_bad.remove()?;
    set_markers.remove()?;

    info!(
        vertex_count = graph.vertex_count(),
        "marker graph vertex construction completed"
    );
    Ok(min_coverage)
}

fn union_read_graph_edge_pair(
    sets: &DisjointSets<'_>,
    markers: &MarkerTable,
    read_graph: &ReadGraph,
    i: u64,
) -> Result<()> {
    let edge = read_graph.edges[i as usize];

    // The next edge must be the reverse complement of this one.
    let next = read_graph.edges[i as usize + 1];
    ensure!(
        next.flipped().oriented_read_ids == edge.oriented_read_ids,
        "read graph edges {i} and {} are not a reverse complement pair",
        i + 1
    );

    if edge.crosses_strands() || edge.has_inconsistent_alignment() {
        return Ok(());
    }
    let [id0, id1] = edge.oriented_read_ids;
    ensure!(id0 < id1, "read graph edge {i} is not normalized");
    if read_graph.is_chimeric(id0.read_id()) || read_graph.is_chimeric(id1.read_id()) {
        return Ok(());
    }

    let alignment = read_graph
        .alignment(edge.alignment_id)
        .with_context(|| format!("alignment {} of read graph edge {i}", edge.alignment_id))?;

    for [ordinal0, ordinal1] in alignment {
        let marker_id0 = markers.marker_id(id0, ordinal0);
        let marker_id1 = markers.marker_id(id1, ordinal1);
        ensure!(
            markers.marker(marker_id0).kmer_id == markers.marker(marker_id1).kmer_id,
            "aligned markers {marker_id0} and {marker_id1} have different k-mer ids"
        );
        sets.unite(marker_id0, marker_id1);

        // Also merge the reverse complemented markers so the marker graph
        // stays invariant under strand swap.
        sets.unite(
            markers.reverse_complement(marker_id0),
            markers.reverse_complement(marker_id1),
        );
    }
    Ok(())
}

/// A set is bad if it holds two markers of the same read (suppressed by
/// `allow_duplicate_markers`) or if either strand contributes fewer than
/// `min_coverage_per_strand` markers.
fn is_bad_set(
    set: &[MarkerId],
    markers: &MarkerTable,
    allow_duplicate_markers: bool,
    min_coverage_per_strand: u64,
) -> bool {
    debug_assert!(!set.is_empty());
    if set.len() == 1 {
        return 1 < min_coverage_per_strand;
    }

    let mut count_by_strand = [0u64; 2];
    let mut previous_read_id = None;
    for &marker_id in set {
        let (oriented_read_id, _) = markers.find_marker_id(marker_id);
        count_by_strand[oriented_read_id.strand() as usize] += 1;

        // The set is sorted by marker id, which groups markers of the
        // same read together.
        if !allow_duplicate_markers {
            if previous_read_id == Some(oriented_read_id.read_id()) {
                return true;
            }
            previous_read_id = Some(oriented_read_id.read_id());
        }
    }
    count_by_strand[0] < min_coverage_per_strand || count_by_strand[1] < min_coverage_per_strand
}
