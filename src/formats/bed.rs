//! BED interval projection
//!
//! Reads BED3+ intervals on the target assembly and projects each one through
//! every chain record on the same target sequence.

use crate::core::io::{open_reader, trim_ascii, ByteLineIterator};
use crate::core::{AlignmentCollection, BlockIndex, ChainRecord, ParallelConfig};
use memchr::memchr;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lines per parallel work unit
const CHUNK_SIZE: usize = 10000;

/// Zero-copy view of the first BED columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedIntervalView<'a> {
    pub chrom: &'a str,
    pub start: u64,
    pub end: u64,
    pub name: Option<&'a str>,
}

impl<'a> BedIntervalView<'a> {
    /// Parse a tab-separated BED line; only the first four columns are read
    pub fn parse(line: &'a [u8]) -> Result<Self, BedParseError> {
        let line = trim_ascii(line);
        if line.is_empty() {
            return Err(BedParseError::EmptyLine);
        }

        let mut fields: [Option<&[u8]>; 4] = [None; 4];
        let mut rest = line;
        for slot in fields.iter_mut() {
            match memchr(b'\t', rest) {
                Some(tab) => {
                    *slot = Some(&rest[..tab]);
                    rest = &rest[tab + 1..];
                }
                None => {
                    *slot = Some(rest);
                    break;
                }
            }
        }

        let found = fields.iter().filter(|f| f.is_some()).count();
        let (Some(chrom), Some(start), Some(end)) = (fields[0], fields[1], fields[2]) else {
            return Err(BedParseError::TooFewFields { expected: 3, found });
        };

        let chrom = std::str::from_utf8(chrom).map_err(|_| BedParseError::InvalidUtf8("chrom"))?;
        let start = parse_coordinate(start, "start")?;
        let end = parse_coordinate(end, "end")?;
        if start > end {
            return Err(BedParseError::InvalidInterval { start, end });
        }
        let name = match fields[3] {
            Some(name) => Some(std::str::from_utf8(name).map_err(|_| BedParseError::InvalidUtf8("name"))?),
            None => None,
        };

        Ok(Self {
            chrom,
            start,
            end,
            name: name.filter(|n| !n.is_empty()),
        })
    }

    /// Label used in projection output: the BED name, else `chrom:start-end`
    pub fn label(&self) -> String {
        match self.name {
            Some(name) => name.to_string(),
            None => format!("{}:{}-{}", self.chrom, self.start, self.end),
        }
    }
}

fn parse_coordinate(field: &[u8], which: &'static str) -> Result<u64, BedParseError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| BedParseError::InvalidNumber(which, String::from_utf8_lossy(field).into_owned()))
}

/// Header and comment lines carry no interval
fn is_header_line(line: &[u8]) -> bool {
    line.is_empty() || line.starts_with(b"#") || line.starts_with(b"track") || line.starts_with(b"browser")
}

/// BED parsing error
#[derive(Debug, thiserror::Error)]
pub enum BedParseError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Too few fields: expected at least {expected}, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Invalid UTF-8 in field: {0}")]
    InvalidUtf8(&'static str),

    #[error("Invalid number in field {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("Start {start} is after end {end}")]
    InvalidInterval { start: u64, end: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Projection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Interval lines read
    pub total: usize,
    /// Intervals with at least one projected piece
    pub projected: usize,
    /// Intervals that fell entirely outside every matching chain
    pub unmapped: usize,
    /// Lines that could not be parsed
    pub failed: usize,
    /// Output lines written
    pub pieces: usize,
}

/// Block indexes of the selected records, grouped by target sequence name
struct TargetIndex<'a> {
    by_target: HashMap<&'a str, Vec<(&'a ChainRecord, &'a BlockIndex)>>,
}

impl<'a> TargetIndex<'a> {
    fn build(collection: &'a AlignmentCollection, chain_id: Option<u64>) -> Self {
        let mut by_target: HashMap<&'a str, Vec<(&'a ChainRecord, &'a BlockIndex)>> = HashMap::new();
        for (record, index) in collection
            .iter()
            .zip(collection.block_indexes())
            .filter(|(r, _)| chain_id.map_or(true, |id| r.chain_id == id))
        {
            by_target
                .entry(record.target.name.as_str())
                .or_default()
                .push((record, index));
        }
        Self { by_target }
    }

    /// Output lines for one interval, in collection order then block order
    fn project(&self, view: &BedIntervalView) -> Vec<String> {
        let Some(candidates) = self.by_target.get(view.chrom) else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        let mut label = None;
        for (record, index) in candidates {
            for (q_start, q_end) in index.project_one(view.start, view.end) {
                let label = label.get_or_insert_with(|| view.label());
                lines.push(format!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.query.name, q_start, q_end, record.chain_id, label
                ));
            }
        }
        lines
    }
}

/// Project every interval in a BED file through the collection's records
///
/// Writes `q_name q_start q_end chain_id label` lines (tab-separated,
/// forward-strand query coordinates) to `output`, or stdout when `None`.
/// With `chain_id`, only that record is used. Output order follows input
/// order regardless of parallelism.
pub fn project_bed<P: AsRef<Path>>(
    input: P,
    output: Option<&Path>,
    collection: &AlignmentCollection,
    chain_id: Option<u64>,
    pool: Option<&rayon::ThreadPool>,
    parallel: &ParallelConfig,
) -> Result<ProjectionStats, BedParseError> {
    let index = TargetIndex::build(collection, chain_id);

    let mut lines = ByteLineIterator::new(open_reader(input.as_ref())?);
    let mut data_lines: Vec<Vec<u8>> = Vec::new();
    while let Some(line) = lines.next_line() {
        let line = trim_ascii(line?);
        if !is_header_line(line) {
            data_lines.push(line.to_vec());
        }
    }

    let projected = AtomicUsize::new(0);
    let unmapped = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let project_chunk = |chunk: &[Vec<u8>]| -> Vec<String> {
        let mut out = Vec::with_capacity(chunk.len());
        for line in chunk {
            match BedIntervalView::parse(line) {
                Ok(view) => {
                    let pieces = index.project(&view);
                    if pieces.is_empty() {
                        unmapped.fetch_add(1, Ordering::Relaxed);
                    } else {
                        projected.fetch_add(1, Ordering::Relaxed);
                        out.extend(pieces);
                    }
                }
                Err(e) => {
                    log::debug!("Skipping BED line: {}", e);
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        out
    };

    let results: Vec<Vec<String>> = match pool {
        Some(pool) if parallel.should_parallelize(data_lines.len()) => {
            pool.install(|| data_lines.par_chunks(CHUNK_SIZE).map(project_chunk).collect())
        }
        _ => data_lines.chunks(CHUNK_SIZE).map(project_chunk).collect(),
    };

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = BufWriter::with_capacity(128 * 1024, sink);
    let mut pieces = 0;
    for line in results.iter().flatten() {
        writeln!(writer, "{}", line)?;
        pieces += 1;
    }
    writer.flush()?;

    Ok(ProjectionStats {
        total: data_lines.len(),
        projected: projected.load(Ordering::Relaxed),
        unmapped: unmapped.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        pieces,
    })
}
