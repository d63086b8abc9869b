//! Batch assembly between the tokenizer and the record parser
//!
//! Chunks are accumulated into batches of at most `max_chunks_per_call` and
//! each full batch is handed to [`parse_many_chunks`] in one call. The batch
//! limit is validated to sit strictly below [`PARSER_HARD_CAPACITY`].

use crate::core::chain::{parse_many_chunks, ParsedBatch, PARSER_HARD_CAPACITY};
use crate::core::config::ParallelConfig;
use crate::core::error::{ChainError, ConfigError};
use log::debug;

/// Default batch size, half of the parser's hard capacity
pub const DEFAULT_MAX_CHUNKS_PER_CALL: usize = 500_000;

/// Result of assembling and parsing a whole chunk stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub parsed: ParsedBatch,
    /// Parser calls made
    pub batches: usize,
    /// Largest number of chunks handed to a single parser call
    pub largest_batch: usize,
}

/// Groups chunks into bounded batches and parses them in order
pub struct BatchAssembler {
    max_chunks_per_call: usize,
    min_score: Option<i64>,
    parallel: ParallelConfig,
    pool: Option<rayon::ThreadPool>,
}

impl BatchAssembler {
    /// Create an assembler
    ///
    /// # Errors
    /// [`ConfigError::InvalidBatchSize`] unless
    /// `1 <= max_chunks_per_call < PARSER_HARD_CAPACITY`.
    pub fn new(
        max_chunks_per_call: usize,
        min_score: Option<i64>,
        parallel: ParallelConfig,
    ) -> Result<Self, ChainError> {
        if max_chunks_per_call == 0 || max_chunks_per_call >= PARSER_HARD_CAPACITY {
            return Err(ConfigError::InvalidBatchSize {
                size: max_chunks_per_call,
                capacity: PARSER_HARD_CAPACITY,
            }
            .into());
        }

        Ok(Self {
            max_chunks_per_call,
            min_score,
            pool: parallel.build_pool()?,
            parallel,
        })
    }

    pub fn max_chunks_per_call(&self) -> usize {
        self.max_chunks_per_call
    }

    /// Parse one batch, in parallel when it is large enough
    fn flush(&self, batch: &mut Vec<Vec<u8>>, report: &mut AssemblyReport) -> Result<(), ChainError> {
        if batch.is_empty() {
            return Ok(());
        }

        let pool = self
            .pool
            .as_ref()
            .filter(|_| self.parallel.should_parallelize(batch.len()));
        debug!(
            "Parsing batch of {} chunks ({})",
            batch.len(),
            if pool.is_some() { "parallel" } else { "serial" }
        );

        let parsed = parse_many_chunks(batch, self.min_score, pool)?;
        report.batches += 1;
        report.largest_batch = report.largest_batch.max(batch.len());
        report.parsed.append(parsed);
        batch.clear();
        Ok(())
    }

    /// Drain `chunks`, parsing every batch and concatenating results in input order
    ///
    /// Stops at the first I/O error from the chunk source.
    pub fn assemble<I>(&self, chunks: I) -> Result<AssemblyReport, ChainError>
    where
        I: IntoIterator<Item = std::io::Result<Vec<u8>>>,
    {
        self.assemble_with(chunks, |e| ChainError::io("<stream>", e))
    }

    /// Like [`assemble`](Self::assemble), mapping chunk-source errors with `on_io_error`
    pub fn assemble_with<I, F>(&self, chunks: I, on_io_error: F) -> Result<AssemblyReport, ChainError>
    where
        I: IntoIterator<Item = std::io::Result<Vec<u8>>>,
        F: Fn(std::io::Error) -> ChainError,
    {
        let mut report = AssemblyReport::default();
        let mut batch: Vec<Vec<u8>> = Vec::new();

        for chunk in chunks {
            batch.push(chunk.map_err(&on_io_error)?);
            if batch.len() >= self.max_chunks_per_call {
                self.flush(&mut batch, &mut report)?;
            }
        }
        self.flush(&mut batch, &mut report)?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: u64) -> Vec<std::io::Result<Vec<u8>>> {
        (0..n)
            .map(|i| Ok(format!("chain {} a 100 + 0 10 b 100 + 0 10 {}\n10", i, i).into_bytes()))
            .collect()
    }

    #[test]
    fn test_rejects_invalid_batch_sizes() {
        let parallel = ParallelConfig::serial();
        assert!(BatchAssembler::new(0, None, parallel).is_err());
        assert!(BatchAssembler::new(PARSER_HARD_CAPACITY, None, parallel).is_err());
        assert!(BatchAssembler::new(PARSER_HARD_CAPACITY - 1, None, parallel).is_ok());
        assert!(BatchAssembler::new(1, None, parallel).is_ok());
    }

    #[test]
    fn test_batches_bounded_and_flushed() {
        let assembler = BatchAssembler::new(3, None, ParallelConfig::serial()).unwrap();
        let report = assembler.assemble(chunks(10)).unwrap();

        assert_eq!(report.batches, 4);
        assert_eq!(report.largest_batch, 3);
        let ids: Vec<u64> = report.parsed.records.iter().map(|r| r.chain_id).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input_makes_no_calls() {
        let assembler = BatchAssembler::new(3, None, ParallelConfig::serial()).unwrap();
        let report = assembler.assemble(Vec::new()).unwrap();
        assert_eq!(report.batches, 0);
        assert!(report.parsed.records.is_empty());
    }

    #[test]
    fn test_min_score_applied() {
        let assembler = BatchAssembler::new(4, Some(7), ParallelConfig::serial()).unwrap();
        let report = assembler.assemble(chunks(10)).unwrap();
        assert_eq!(report.parsed.records.len(), 3);
        assert_eq!(report.parsed.filtered, 7);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let parallel = ParallelConfig::new(4)
            .with_max_workers(4)
            .unwrap()
            .with_min_items_for_parallel(2);
        let serial = BatchAssembler::new(7, None, ParallelConfig::serial())
            .unwrap()
            .assemble(chunks(50))
            .unwrap();
        let threaded = BatchAssembler::new(7, None, parallel)
            .unwrap()
            .assemble(chunks(50))
            .unwrap();
        assert_eq!(serial, threaded);
    }

    #[test]
    fn test_io_error_aborts() {
        let assembler = BatchAssembler::new(2, None, ParallelConfig::serial()).unwrap();
        let mut input = chunks(3);
        input.insert(1, Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated")));
        let err = assembler.assemble(input).unwrap_err();
        assert!(matches!(err, ChainError::Io { .. }));
    }
}
