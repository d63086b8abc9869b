//! Interval projection through a chain's blocks
//!
//! Maps half-open intervals on one axis of a chain record onto the paired
//! axis. For each input interval:
//! 1. Find the blocks whose range on the source axis overlaps it
//! 2. Clip the interval to each block
//! 3. Carry the clipped piece across by the block's offset onto the other axis
//!
//! Blocks hold forward-strand coordinates on both axes. When the two sides
//! run in opposite directions (relative strand `Minus`), the offset is taken
//! from the far end of the destination range instead of its start.
//!
//! Parts of an interval that fall in gaps between blocks are dropped, so an
//! input may map to zero, one or several output pieces, ordered by ascending
//! position on the source axis.

use crate::core::chain::{AlignmentBlock, ChainRecord, Strand};
use crate::core::config::ParallelConfig;
use rayon::prelude::*;
use rust_lapper::{Interval, Lapper};

/// Block lists at or below this length are scanned linearly
pub const LINEAR_SCAN_MAX_BLOCKS: usize = 16;

/// Intervals per parallel work unit
const CHUNK_SIZE: usize = 1024;

/// Half-open `(start, end)` interval
pub type Span = (u64, u64);

/// Which axis of the blocks input intervals are expressed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    /// Input on the target axis, output on the query axis
    #[default]
    Target,
    /// Input on the query axis, output on the target axis
    Query,
}

impl Axis {
    /// `(source_start, source_end, dest_start, dest_end)` of a block for this axis
    #[inline]
    fn sides(self, block: &AlignmentBlock) -> (u64, u64, u64, u64) {
        match self {
            Axis::Target => (block.t_start, block.t_end, block.q_start, block.q_end),
            Axis::Query => (block.q_start, block.q_end, block.t_start, block.t_end),
        }
    }
}

/// Compute the intersection of two half-open intervals
///
/// Returns None if they don't overlap; touching ends do not overlap.
///
/// # Examples
/// ```
/// use chainlift::intersect_intervals;
/// assert_eq!(intersect_intervals(0, 100, 50, 150), Some((50, 100)));
/// assert_eq!(intersect_intervals(0, 50, 50, 100), None);
/// ```
#[inline]
pub fn intersect_intervals(start1: u64, end1: u64, start2: u64, end2: u64) -> Option<Span> {
    let start = start1.max(start2);
    let end = end1.min(end2);
    (start < end).then_some((start, end))
}

/// Map the part of `[start, end)` inside `block` onto the other axis
#[inline]
fn project_through_block(
    axis: Axis,
    strand: Strand,
    block: &AlignmentBlock,
    start: u64,
    end: u64,
) -> Option<Span> {
    let (src_start, src_end, dest_start, dest_end) = axis.sides(block);
    let (clip_start, clip_end) = intersect_intervals(start, end, src_start, src_end)?;
    Some(match strand {
        Strand::Plus => (
            dest_start + (clip_start - src_start),
            dest_start + (clip_end - src_start),
        ),
        Strand::Minus => (
            dest_end - (clip_end - src_start),
            dest_end - (clip_start - src_start),
        ),
    })
}

/// Reference projection by scanning every block
///
/// `strand` is the record's relative strand. Pieces come out in ascending
/// source-axis order whatever order `blocks` is in.
pub fn project_linear(blocks: &[AlignmentBlock], axis: Axis, strand: Strand, intervals: &[Span]) -> Vec<Vec<Span>> {
    intervals
        .iter()
        .map(|&(start, end)| {
            let mut pieces: Vec<(u64, Span)> = blocks
                .iter()
                .filter_map(|block| {
                    let piece = project_through_block(axis, strand, block, start, end)?;
                    Some((axis.sides(block).0, piece))
                })
                .collect();
            pieces.sort_by_key(|&(src_start, _)| src_start);
            pieces.into_iter().map(|(_, piece)| piece).collect()
        })
        .collect()
}

/// Project target-axis intervals onto the query axis
///
/// Scans short block lists directly and builds a [`BlockIndex`] for longer
/// ones; both give the same result. For repeated calls against the same
/// blocks, build a [`BlockIndex`] once instead.
pub fn project_intervals(blocks: &[AlignmentBlock], strand: Strand, intervals: &[Span]) -> Vec<Vec<Span>> {
    if blocks.len() <= LINEAR_SCAN_MAX_BLOCKS {
        project_linear(blocks, Axis::Target, strand, intervals)
    } else {
        BlockIndex::new(blocks, Axis::Target, strand).project(intervals)
    }
}

/// Ordered, binary-searchable index over one record's blocks
///
/// Build once per record and reuse it for every projection call.
#[derive(Clone)]
pub struct BlockIndex {
    axis: Axis,
    strand: Strand,
    blocks: Vec<AlignmentBlock>,
    lapper: Lapper<u64, usize>,
}

impl std::fmt::Debug for BlockIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockIndex")
            .field("axis", &self.axis)
            .field("strand", &self.strand)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl BlockIndex {
    pub fn new(blocks: &[AlignmentBlock], axis: Axis, strand: Strand) -> Self {
        let intervals = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let (start, stop, _, _) = axis.sides(block);
                Interval { start, stop, val: i }
            })
            .collect();

        Self {
            axis,
            strand,
            blocks: blocks.to_vec(),
            lapper: Lapper::new(intervals),
        }
    }

    /// Index a record's blocks for target-to-query projection
    pub fn for_record(record: &ChainRecord) -> Self {
        Self::new(&record.blocks, Axis::Target, record.relative_strand())
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Project a single interval
    pub fn project_one(&self, start: u64, end: u64) -> Vec<Span> {
        if start >= end {
            return Vec::new();
        }
        self.lapper
            .find(start, end)
            .filter_map(|iv| project_through_block(self.axis, self.strand, &self.blocks[iv.val], start, end))
            .collect()
    }

    /// Project every interval, one output list per input in input order
    pub fn project(&self, intervals: &[Span]) -> Vec<Vec<Span>> {
        intervals
            .iter()
            .map(|&(start, end)| self.project_one(start, end))
            .collect()
    }

    /// Like [`project`](Self::project), spread over a worker pool when the
    /// input is large enough for `parallel`
    pub fn project_parallel(
        &self,
        intervals: &[Span],
        pool: Option<&rayon::ThreadPool>,
        parallel: &ParallelConfig,
    ) -> Vec<Vec<Span>> {
        match pool {
            Some(pool) if parallel.should_parallelize(intervals.len()) => pool.install(|| {
                intervals
                    .par_chunks(CHUNK_SIZE)
                    .flat_map_iter(|chunk| self.project(chunk))
                    .collect()
            }),
            _ => self.project(intervals),
        }
    }
}
