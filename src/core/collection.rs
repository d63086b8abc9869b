//! Chain file reading and the resulting record collection
//!
//! `read_chain_file` streams a chain file through the tokenizer and the
//! batch assembler and returns an [`AlignmentCollection`] whose record order
//! equals file order.

use crate::core::batch::{BatchAssembler, DEFAULT_MAX_CHUNKS_PER_CALL};
use crate::core::chain::ChainRecord;
use crate::core::config::ParallelConfig;
use crate::core::error::{ChainError, Result};
use crate::core::projection::{BlockIndex, Span};
use crate::core::tokenizer::{ChunkTokenizer, TokenizerMode};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Parsed chain records from one file, in file order
///
/// Read-only once built; share it freely between projection threads.
/// Block indexes are built on first use and kept for the collection's life.
#[derive(Debug)]
pub struct AlignmentCollection {
    source: PathBuf,
    records: Vec<ChainRecord>,
    omitted: usize,
    filtered: usize,
    indexes: OnceLock<Vec<BlockIndex>>,
}

impl Clone for AlignmentCollection {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            records: self.records.clone(),
            omitted: self.omitted,
            filtered: self.filtered,
            indexes: OnceLock::new(),
        }
    }
}

// The index cache is derived from `records` and takes no part in equality
impl PartialEq for AlignmentCollection {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.records == other.records
            && self.omitted == other.omitted
            && self.filtered == other.filtered
    }
}

impl Eq for AlignmentCollection {}

impl AlignmentCollection {
    pub fn new(records: Vec<ChainRecord>, source: impl Into<PathBuf>) -> Self {
        Self::with_counts(records, source.into(), 0, 0)
    }

    fn with_counts(records: Vec<ChainRecord>, source: PathBuf, omitted: usize, filtered: usize) -> Self {
        Self {
            source,
            records,
            omitted,
            filtered,
            indexes: OnceLock::new(),
        }
    }

    /// Path the records were read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn records(&self) -> &[ChainRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChainRecord> {
        self.records.iter()
    }

    /// Records dropped because they failed to parse
    pub fn omitted(&self) -> usize {
        self.omitted
    }

    /// Records dropped by the score filter after parsing
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Find a record by chain id
    pub fn get(&self, chain_id: u64) -> Option<&ChainRecord> {
        self.records.iter().find(|r| r.chain_id == chain_id)
    }

    /// Records whose target sequence is `name`
    pub fn records_for_target<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ChainRecord> + 'a {
        self.records.iter().filter(move |r| r.target.name == name)
    }

    /// `(chain_id, score)` pairs, highest score first
    ///
    /// Ties keep file order. The collection itself is not reordered.
    pub fn rank_by_score(&self, limit: Option<usize>) -> Vec<(u64, i64)> {
        let mut ranked: Vec<(u64, i64)> = self.records.iter().map(|r| (r.chain_id, r.score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }
        ranked
    }

    /// One target-axis [`BlockIndex`] per record, in collection order
    ///
    /// Built on the first call, then shared by every later projection.
    pub fn block_indexes(&self) -> &[BlockIndex] {
        self.indexes
            .get_or_init(|| self.records.iter().map(BlockIndex::for_record).collect())
    }

    /// Project the same target-axis intervals through every record
    ///
    /// Returns one entry per record (collection order), each holding one
    /// output list per input interval.
    pub fn project_all(
        &self,
        intervals: &[Span],
        pool: Option<&rayon::ThreadPool>,
        parallel: &ParallelConfig,
    ) -> Vec<Vec<Vec<Span>>> {
        let indexes = self.block_indexes();
        let project = |index: &BlockIndex| index.project(intervals);
        match pool {
            Some(pool) if parallel.should_parallelize(indexes.len()) => {
                pool.install(|| indexes.par_iter().map(project).collect())
            }
            _ => indexes.iter().map(project).collect(),
        }
    }

    /// Take ownership of the records
    pub fn into_records(self) -> Vec<ChainRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a AlignmentCollection {
    type Item = &'a ChainRecord;
    type IntoIter = std::slice::Iter<'a, ChainRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Configurable chain file reader
///
/// # Example
/// ```ignore
/// let collection = ChainReader::new()
///     .min_score(1000)
///     .parallel(ParallelConfig::detect())
///     .read("hg38ToMm39.over.chain.gz")?;
/// ```
#[derive(Debug, Clone)]
pub struct ChainReader {
    min_score: Option<i64>,
    mode: TokenizerMode,
    max_chunks_per_call: usize,
    parallel: ParallelConfig,
}

impl Default for ChainReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainReader {
    pub fn new() -> Self {
        Self {
            min_score: None,
            mode: TokenizerMode::Auto,
            max_chunks_per_call: DEFAULT_MAX_CHUNKS_PER_CALL,
            parallel: ParallelConfig::serial(),
        }
    }

    /// Keep only records scoring at least `min_score`
    pub fn min_score(mut self, min_score: i64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn mode(mut self, mode: TokenizerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Chunks per parser call; validated when reading
    pub fn max_chunks_per_call(mut self, max_chunks_per_call: usize) -> Self {
        self.max_chunks_per_call = max_chunks_per_call;
        self
    }

    pub fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Read and parse a `.chain`, `.chain.gz` or `.chain.bz2` file
    ///
    /// # Errors
    /// I/O and decompression failures, an invalid batch size, or a worker
    /// pool that cannot be built. Malformed records are skipped and counted
    /// in [`AlignmentCollection::omitted`].
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<AlignmentCollection> {
        let path = path.as_ref();
        let assembler = BatchAssembler::new(self.max_chunks_per_call, self.min_score, self.parallel)?;
        let tokenizer = ChunkTokenizer::open(path, self.min_score, self.mode)
            .map_err(|e| ChainError::io(path, e))?;

        let report = assembler.assemble_with(tokenizer, |e| ChainError::io(path, e))?;
        let parsed = report.parsed;

        if parsed.failed > 0 {
            warn!("{}: skipped {} malformed chain record(s)", path.display(), parsed.failed);
        }
        info!(
            "Read {} chain record(s) from {} in {} batch(es)",
            parsed.records.len(),
            path.display(),
            report.batches
        );

        Ok(AlignmentCollection::with_counts(
            parsed.records,
            path.to_path_buf(),
            parsed.failed,
            parsed.filtered,
        ))
    }
}

/// Read a chain file with default settings
///
/// Uses every detected core for parsing. Records are in file order; with
/// `min_score`, only records scoring at least that much are returned.
pub fn read_chain_file<P: AsRef<Path>>(path: P, min_score: Option<i64>) -> Result<AlignmentCollection> {
    let mut reader = ChainReader::new().parallel(ParallelConfig::detect());
    if let Some(min_score) = min_score {
        reader = reader.min_score(min_score);
    }
    reader.read(path)
}
