//! chainlift - streaming chain file reader and interval projection
//!
//! Reads UCSC chain alignment files (plain, gzip or bzip2) with bounded
//! memory, parses records in large parallel batches and projects intervals
//! from the target assembly onto the query assembly.
//!
//! # Features
//!
//! - Streaming tokenizer; gzip inputs up to 16MB are decoded in one go
//! - Batched parsing with a hard per-call record limit
//! - Parallel parsing and projection with rayon, order always preserved
//! - Permissive early score filtering with an authoritative final check
//!
//! # Example
//!
//! ```ignore
//! use chainlift::read_chain_file;
//!
//! let chains = read_chain_file("hg19ToHg38.over.chain.gz", Some(1000))?;
//! for (chain_id, score) in chains.rank_by_score(Some(10)) {
//!     println!("{chain_id}\t{score}");
//! }
//!
//! let index = &chains.block_indexes()[0];
//! let pieces = index.project_one(10_000, 12_000);
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    flip_interval, intersect_intervals, parse_chunk, project_intervals, read_chain_file,
    AlignmentBlock, AlignmentCollection, Axis, BlockIndex, ChainError, ChainReader, ChainRecord,
    ConfigError, LogLevel, ParallelConfig, RecordParseError, SequenceSpan, Strand, TokenizerMode,
};
pub use formats::bed;
