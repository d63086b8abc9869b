//! Core chain file functionality
//!
//! This module contains the chain tokenizer, the batched record parser,
//! the record collection and interval projection.

pub mod batch;
pub mod chain;
pub mod collection;
pub mod config;
mod error;
pub mod io;
pub mod projection;
pub mod tokenizer;

pub use batch::{AssemblyReport, BatchAssembler, DEFAULT_MAX_CHUNKS_PER_CALL};
pub use chain::{
    flip_interval, parse_chunk, parse_many_chunks, record_meets_min_score, AlignmentBlock,
    ChainRecord, ParsedBatch, RecordParseError, RecordParseErrorKind, SequenceSpan, Strand,
    PARSER_HARD_CAPACITY,
};
pub use collection::{read_chain_file, AlignmentCollection, ChainReader};
pub use config::{init_logging, ConfigSummary, LogLevel, ParallelConfig};
pub use error::{ChainError, ConfigError, Result};
pub use io::CompressionFormat;
pub use projection::{
    intersect_intervals, project_intervals, project_linear, Axis, BlockIndex, Span,
    LINEAR_SCAN_MAX_BLOCKS,
};
pub use tokenizer::{header_meets_min_score, ChunkTokenizer, TokenizerMode, HEADER_MARKER};
