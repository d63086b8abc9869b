//! Property-based tests for interval projection
//!
//! The block index must agree with a plain scan of every block, and every
//! projected piece must come from inside a single block.

use chainlift::core::{project_linear, Span};
use chainlift::{flip_interval, parse_chunk, project_intervals, AlignmentBlock, Axis, BlockIndex, ParallelConfig, Strand};
use proptest::prelude::*;

/// Generate ascending, non-overlapping blocks from `(size, dt, dq)` steps
fn arb_blocks() -> impl Strategy<Value = Vec<AlignmentBlock>> {
    (
        0u64..1000,
        0u64..1000,
        prop::collection::vec((1u64..100, 0u64..60, 0u64..60), 0..60),
    )
        .prop_map(|(t_start, q_start, steps)| {
            let mut t = t_start;
            let mut q = q_start;
            steps
                .into_iter()
                .map(|(size, dt, dq)| {
                    let block = AlignmentBlock::new(t, t + size, q, q + size);
                    t += size + dt;
                    q += size + dq;
                    block
                })
                .collect()
        })
}

/// Size of the sequence used to mirror query coordinates onto a `-` strand
const MIRROR_SIZE: u64 = 20000;

/// Same alignment with the query side written on the reverse strand
fn mirror_query(blocks: &[AlignmentBlock]) -> Vec<AlignmentBlock> {
    blocks
        .iter()
        .map(|b| {
            let (q_start, q_end) = flip_interval(MIRROR_SIZE, b.q_start, b.q_end);
            AlignmentBlock::new(b.t_start, b.t_end, q_start, q_end)
        })
        .collect()
}

fn arb_intervals() -> impl Strategy<Value = Vec<Span>> {
    prop::collection::vec((0u64..12000, 0u64..800), 0..50)
        .prop_map(|raw| raw.into_iter().map(|(start, len)| (start, start + len)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Index lookup and linear scan give identical output on both axes
    #[test]
    fn prop_index_matches_linear(blocks in arb_blocks(), intervals in arb_intervals()) {
        let mirrored = mirror_query(&blocks);
        for (blocks, strand) in [(&blocks, Strand::Plus), (&mirrored, Strand::Minus)] {
            for axis in [Axis::Target, Axis::Query] {
                let index = BlockIndex::new(blocks, axis, strand);
                prop_assert_eq!(index.project(&intervals), project_linear(blocks, axis, strand, &intervals));
            }
            prop_assert_eq!(
                project_intervals(blocks, strand, &intervals),
                project_linear(blocks, Axis::Target, strand, &intervals)
            );
        }
    }

    /// A reverse-strand query projects to the flipped forward-strand pieces, in target order
    #[test]
    fn prop_minus_strand_is_flipped_plus(blocks in arb_blocks(), intervals in arb_intervals()) {
        let plus = BlockIndex::new(&blocks, Axis::Target, Strand::Plus).project(&intervals);
        let minus = BlockIndex::new(&mirror_query(&blocks), Axis::Target, Strand::Minus).project(&intervals);

        for (plus_pieces, minus_pieces) in plus.iter().zip(&minus) {
            let flipped: Vec<Span> = plus_pieces
                .iter()
                .map(|&(s, e)| flip_interval(MIRROR_SIZE, s, e))
                .collect();
            prop_assert_eq!(minus_pieces, &flipped);
        }
    }

    /// Pieces are non-empty, ascending, inside a block, and never longer in total than the input
    #[test]
    fn prop_pieces_well_formed(blocks in arb_blocks(), intervals in arb_intervals()) {
        let results = BlockIndex::new(&blocks, Axis::Target, Strand::Plus).project(&intervals);
        prop_assert_eq!(results.len(), intervals.len());

        for ((start, end), pieces) in intervals.iter().zip(&results) {
            let covered: u64 = pieces.iter().map(|(s, e)| e - s).sum();
            prop_assert!(covered <= end - start);

            for window in pieces.windows(2) {
                prop_assert!(window[0].1 <= window[1].0);
            }
            for &(s, e) in pieces {
                prop_assert!(s < e);
                prop_assert!(blocks.iter().any(|b| b.q_start <= s && e <= b.q_end));
            }
        }
    }

    /// Projecting onto the query axis and back returns a sub-interval of the input
    #[test]
    fn prop_round_trip_stays_inside(blocks in arb_blocks(), start in 0u64..12000, len in 1u64..800) {
        let mirrored = mirror_query(&blocks);
        for (blocks, strand) in [(&blocks, Strand::Plus), (&mirrored, Strand::Minus)] {
            let forward = BlockIndex::new(blocks, Axis::Target, strand);
            let backward = BlockIndex::new(blocks, Axis::Query, strand);

            for (q_start, q_end) in forward.project_one(start, start + len) {
                for (t_start, t_end) in backward.project_one(q_start, q_end) {
                    prop_assert!(start <= t_start && t_end <= start + len);
                }
            }
        }
    }

    /// Parallel projection keeps input order
    #[test]
    fn prop_parallel_matches_serial(blocks in arb_blocks(), intervals in arb_intervals()) {
        let parallel = ParallelConfig::new(4)
            .with_max_workers(4)
            .unwrap()
            .with_min_items_for_parallel(1);
        let pool = parallel.build_pool().unwrap();
        let index = BlockIndex::new(&mirror_query(&blocks), Axis::Target, Strand::Minus);

        prop_assert_eq!(
            index.project_parallel(&intervals, pool.as_ref(), &parallel),
            index.project(&intervals)
        );
    }
}

#[test]
fn test_two_block_scenario() {
    let blocks = vec![
        AlignmentBlock::new(100, 200, 1000, 1100),
        AlignmentBlock::new(300, 400, 1200, 1300),
    ];

    let result = project_intervals(&blocks, Strand::Plus, &[(150, 180), (190, 210), (220, 280), (150, 350)]);
    assert_eq!(
        result,
        vec![
            vec![(1050, 1080)],
            vec![(1090, 1100)],
            vec![],
            vec![(1050, 1100), (1200, 1250)],
        ]
    );
}

#[test]
fn test_parsed_record_projection() {
    let record = parse_chunk(b"chain 42 chr1 1000 + 100 400 chr5 2000 + 1000 1300 9\n100 100 100\n100").unwrap();
    let index = BlockIndex::for_record(&record);

    assert_eq!(index.len(), 2);
    assert_eq!(index.project_one(150, 350), vec![(1050, 1100), (1200, 1250)]);
}

#[test]
fn test_minus_strand_record_projects_forward() {
    let record = parse_chunk(b"chain 42 chr1 1000 + 0 50 chr5 2000 - 100 150 9\n50").unwrap();
    assert_eq!(record.blocks, vec![AlignmentBlock::new(0, 50, 1850, 1900)]);

    let pieces = BlockIndex::for_record(&record).project_one(10, 20);
    assert_eq!(pieces, vec![(1880, 1890)]);
}

#[test]
fn test_minus_strand_pieces_follow_target_order() {
    let blocks = vec![
        AlignmentBlock::new(100, 150, 850, 900),
        AlignmentBlock::new(200, 300, 700, 800),
    ];

    let result = project_intervals(&blocks, Strand::Minus, &[(120, 250)]);
    assert_eq!(result, vec![vec![(850, 880), (750, 800)]]);
}
