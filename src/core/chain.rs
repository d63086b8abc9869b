//! Chain record parsing
//!
//! Decodes one raw chunk of a UCSC chain file into a [`ChainRecord`].
//!
//! # Chain File Format
//!
//! ```text
//! chain score tName tSize tStrand tStart tEnd qName qSize qStrand qStart qEnd id
//! size dt dq
//! size dt dq
//! size
//! ```
//!
//! - Header line starts with "chain"
//! - Data lines contain: size (alignment block), dt (target gap), dq (query gap)
//! - Last data line has only size (no gaps)
//!
//! Block coordinates are rebuilt by running cumulative offsets from the
//! header start positions, then stored on the forward strand of each
//! sequence. On a `-` side, positions are flipped with [`flip_interval`], so
//! its block starts descend while the other side's ascend.

use crate::core::error::ChainError;
use log::debug;
use rayon::prelude::*;

/// Most chunks a single [`parse_many_chunks`] call accepts
pub const PARSER_HARD_CAPACITY: usize = 1_000_000;

/// Error for a single chain record that could not be decoded
///
/// Local to one record: batch parsing counts it as an omission and moves on.
#[derive(Debug, Clone)]
pub struct RecordParseError {
    /// Human-readable error message
    pub message: String,
    /// Line number within the chunk (1-based), if known
    pub line_number: Option<usize>,
    /// The kind of error that occurred
    pub kind: RecordParseErrorKind,
    /// The problematic content (if available)
    pub content: Option<String>,
}

/// Specific kinds of record parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordParseErrorKind {
    /// Invalid chain header format
    InvalidHeader,
    /// Invalid data line format
    InvalidDataLine,
    /// Invalid strand character (must be '+' or '-')
    InvalidStrand,
    /// Failed to parse a numeric value
    InvalidNumber,
    /// Coordinate validation error (e.g., start > end)
    InvalidCoordinates,
    /// Header with no data lines
    EmptyRecord,
    /// Cumulative offset does not fit in 64 bits
    Overflow,
}

impl std::fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RecordParseError {}

impl RecordParseError {
    fn with_context(
        message: impl Into<String>,
        line_number: Option<usize>,
        kind: RecordParseErrorKind,
        content: Option<&str>,
    ) -> Self {
        Self {
            message: message.into(),
            line_number,
            kind,
            content: content.map(|c| c.chars().take(100).collect()),
        }
    }

    fn invalid_header(message: impl Into<String>, line_number: usize, content: &str) -> Self {
        Self::with_context(message, Some(line_number), RecordParseErrorKind::InvalidHeader, Some(content))
    }

    fn invalid_data_line(message: impl Into<String>, line_number: usize, content: &str) -> Self {
        Self::with_context(message, Some(line_number), RecordParseErrorKind::InvalidDataLine, Some(content))
    }

    fn invalid_strand(strand: &str, line_number: usize) -> Self {
        Self::with_context(
            format!("Invalid strand '{}', expected '+' or '-'", strand),
            Some(line_number),
            RecordParseErrorKind::InvalidStrand,
            None,
        )
    }

    fn invalid_number(field: &str, value: &str, line_number: usize) -> Self {
        Self::with_context(
            format!("Invalid {} value '{}'", field, value),
            Some(line_number),
            RecordParseErrorKind::InvalidNumber,
            None,
        )
    }

    fn invalid_coordinates(message: impl Into<String>, line_number: usize) -> Self {
        Self::with_context(message, Some(line_number), RecordParseErrorKind::InvalidCoordinates, None)
    }

    fn overflow(line_number: usize) -> Self {
        Self::with_context(
            "Cumulative block offset overflows",
            Some(line_number),
            RecordParseErrorKind::Overflow,
            None,
        )
    }

    /// Check if this is a specific kind of error
    pub fn is_kind(&self, kind: RecordParseErrorKind) -> bool {
        self.kind == kind
    }
}

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Strand {
    #[default]
    Plus,
    Minus,
}

impl Strand {
    /// Get the complement strand
    pub fn complement(&self) -> Self {
        match self {
            Strand::Plus => Strand::Minus,
            Strand::Minus => Strand::Plus,
        }
    }

    /// Parse strand from a header field
    ///
    /// # Examples
    /// ```
    /// use chainlift::Strand;
    /// assert_eq!(Strand::from_field("+"), Some(Strand::Plus));
    /// assert_eq!(Strand::from_field("-"), Some(Strand::Minus));
    /// assert_eq!(Strand::from_field("."), None);
    /// assert_eq!(Strand::from_field("++"), None);
    /// ```
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            _ => None,
        }
    }

    /// Convert to char
    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Flip a half-open interval onto the opposite strand of a sequence of `size`
///
/// # Examples
/// ```
/// use chainlift::flip_interval;
/// assert_eq!(flip_interval(1000, 100, 250), (750, 900));
/// assert_eq!(flip_interval(1000, 750, 900), (100, 250));
/// ```
pub fn flip_interval(size: u64, start: u64, end: u64) -> (u64, u64) {
    (size.saturating_sub(end), size.saturating_sub(start))
}

/// One side of a chain header: a region of a named sequence
///
/// `start` and `end` are as written in the header, relative to `strand`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceSpan {
    pub name: String,
    pub size: u64,
    pub strand: Strand,
    pub start: u64,
    pub end: u64,
}

/// A gapless aligned block, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignmentBlock {
    pub t_start: u64,
    pub t_end: u64,
    pub q_start: u64,
    pub q_end: u64,
}

impl AlignmentBlock {
    pub fn new(t_start: u64, t_end: u64, q_start: u64, q_end: u64) -> Self {
        Self {
            t_start,
            t_end,
            q_start,
            q_end,
        }
    }

    /// Number of aligned bases (identical on both axes)
    pub fn size(&self) -> u64 {
        self.t_end - self.t_start
    }
}

/// One parsed chain: header fields plus its ordered blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub chain_id: u64,
    pub score: i64,
    pub target: SequenceSpan,
    pub query: SequenceSpan,
    /// Forward-strand coordinates in file order, never overlapping.
    /// Ascending on a `+` side, descending on a `-` side.
    pub blocks: Vec<AlignmentBlock>,
}

impl ChainRecord {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total aligned bases over all blocks
    pub fn aligned_bases(&self) -> u64 {
        self.blocks.iter().map(AlignmentBlock::size).sum()
    }

    /// `Minus` when target and query run in opposite directions
    pub fn relative_strand(&self) -> Strand {
        if self.target.strand == self.query.strand {
            Strand::Plus
        } else {
            Strand::Minus
        }
    }
}

/// Authoritative score check on a parsed record
pub fn record_meets_min_score(record: &ChainRecord, min_score: i64) -> bool {
    record.score >= min_score
}

/// Parsed header fields, before any blocks are attached
#[derive(Debug)]
struct ChainHeader {
    score: i64,
    target: SequenceSpan,
    query: SequenceSpan,
    chain_id: u64,
}

impl ChainHeader {
    /// Parse a chain header line
    ///
    /// Format: chain score tName tSize tStrand tStart tEnd qName qSize qStrand qStart qEnd id
    fn parse(line: &str, line_number: usize) -> Result<Self, RecordParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() != 13 {
            return Err(RecordParseError::invalid_header(
                format!("Expected 13 fields, got {}", fields.len()),
                line_number,
                line,
            ));
        }

        if fields[0] != "chain" {
            return Err(RecordParseError::invalid_header(
                format!("Expected 'chain' keyword, got '{}'", fields[0]),
                line_number,
                line,
            ));
        }

        let score = parse_score(fields[1])
            .ok_or_else(|| RecordParseError::invalid_number("score", fields[1], line_number))?;
        let target = parse_span(&fields[2..7], "target", line_number)?;
        let query = parse_span(&fields[7..12], "query", line_number)?;
        let chain_id = fields[12]
            .parse::<u64>()
            .map_err(|_| RecordParseError::invalid_number("chain id", fields[12], line_number))?;

        Ok(Self {
            score,
            target,
            query,
            chain_id,
        })
    }
}

/// Integer score, or a finite decimal one rounded down
///
/// Rounding down keeps `score >= min_score` exact for integer thresholds.
fn parse_score(field: &str) -> Option<i64> {
    if let Ok(score) = field.parse::<i64>() {
        return Some(score);
    }
    let value = field.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(value.floor() as i64)
}

/// Parse `name size strand start end` for one side of the header
fn parse_span(fields: &[&str], side: &str, line_number: usize) -> Result<SequenceSpan, RecordParseError> {
    let number = |value: &str, what: &str| {
        value
            .parse::<u64>()
            .map_err(|_| RecordParseError::invalid_number(&format!("{} {}", side, what), value, line_number))
    };

    let size = number(fields[1], "size")?;
    let strand = Strand::from_field(fields[2])
        .ok_or_else(|| RecordParseError::invalid_strand(fields[2], line_number))?;
    let start = number(fields[3], "start")?;
    let end = number(fields[4], "end")?;

    if start > end {
        return Err(RecordParseError::invalid_coordinates(
            format!("{} start ({}) > {} end ({})", side, start, side, end),
            line_number,
        ));
    }
    if end > size {
        return Err(RecordParseError::invalid_coordinates(
            format!("{} end ({}) > {} size ({})", side, end, side, size),
            line_number,
        ));
    }

    Ok(SequenceSpan {
        name: fields[0].to_string(),
        size,
        strand,
        start,
        end,
    })
}

/// Data line in a chain file (size, dt, dq)
#[derive(Debug, Clone, Copy)]
struct DataLine {
    /// Alignment block size (ungapped)
    size: u64,
    /// Gap in target sequence after this block
    target_gap: u64,
    /// Gap in query sequence after this block
    query_gap: u64,
}

impl DataLine {
    /// Parse a data line; only the final line of a record omits the gaps
    fn parse(line: &str, line_number: usize, is_last: bool) -> Result<Self, RecordParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let expected = if is_last { 1 } else { 3 };

        if fields.len() != expected {
            return Err(RecordParseError::invalid_data_line(
                format!("Expected {} field(s), got {}", expected, fields.len()),
                line_number,
                line,
            ));
        }

        let number = |value: &str, what: &str| {
            value
                .parse::<u64>()
                .map_err(|_| RecordParseError::invalid_number(what, value, line_number))
        };

        let size = number(fields[0], "block size")?;
        if size == 0 {
            return Err(RecordParseError::invalid_data_line(
                "Block size must be greater than 0",
                line_number,
                line,
            ));
        }

        if is_last {
            return Ok(Self {
                size,
                target_gap: 0,
                query_gap: 0,
            });
        }

        Ok(Self {
            size,
            target_gap: number(fields[1], "target gap (dt)")?,
            query_gap: number(fields[2], "query gap (dq)")?,
        })
    }
}

/// Strand-relative `[start, end)` on `span` to forward-strand coordinates
fn to_forward(span: &SequenceSpan, start: u64, end: u64) -> (u64, u64) {
    match span.strand {
        Strand::Plus => (start, end),
        Strand::Minus => flip_interval(span.size, start, end),
    }
}

/// Decode one raw chunk (header line plus data lines) into a record
pub fn parse_chunk(chunk: &[u8]) -> Result<ChainRecord, RecordParseError> {
    let text = std::str::from_utf8(chunk).map_err(|e| {
        RecordParseError::with_context(
            format!("Chunk is not valid UTF-8: {}", e),
            None,
            RecordParseErrorKind::InvalidHeader,
            None,
        )
    })?;

    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line.trim()));

    let (header_line_number, header_line) = lines
        .by_ref()
        .find(|(_, line)| !line.is_empty())
        .ok_or_else(|| {
            RecordParseError::with_context("Empty chunk", None, RecordParseErrorKind::InvalidHeader, None)
        })?;
    let header = ChainHeader::parse(header_line, header_line_number)?;

    // a blank line after the first data line ends the record
    let mut data_lines: Vec<(usize, &str)> = Vec::new();
    for (line_number, line) in lines {
        if line.is_empty() {
            if data_lines.is_empty() {
                continue;
            }
            break;
        }
        if !line.starts_with('#') {
            data_lines.push((line_number, line));
        }
    }

    if data_lines.is_empty() {
        return Err(RecordParseError::with_context(
            format!("Chain {} has no alignment blocks", header.chain_id),
            Some(header_line_number),
            RecordParseErrorKind::EmptyRecord,
            None,
        ));
    }

    let mut blocks = Vec::with_capacity(data_lines.len());
    let mut target_pos = header.target.start;
    let mut query_pos = header.query.start;
    let last = data_lines.len() - 1;

    for (i, &(line_number, line)) in data_lines.iter().enumerate() {
        let data = DataLine::parse(line, line_number, i == last)?;

        let target_end = target_pos
            .checked_add(data.size)
            .ok_or_else(|| RecordParseError::overflow(line_number))?;
        let query_end = query_pos
            .checked_add(data.size)
            .ok_or_else(|| RecordParseError::overflow(line_number))?;

        if target_end > header.target.size || query_end > header.query.size {
            return Err(RecordParseError::invalid_coordinates(
                format!(
                    "Block ends past sequence size (target {}/{}, query {}/{})",
                    target_end, header.target.size, query_end, header.query.size
                ),
                line_number,
            ));
        }

        let (t_start, t_end) = to_forward(&header.target, target_pos, target_end);
        let (q_start, q_end) = to_forward(&header.query, query_pos, query_end);
        blocks.push(AlignmentBlock::new(t_start, t_end, q_start, q_end));

        // Update positions for next block
        target_pos = target_end
            .checked_add(data.target_gap)
            .ok_or_else(|| RecordParseError::overflow(line_number))?;
        query_pos = query_end
            .checked_add(data.query_gap)
            .ok_or_else(|| RecordParseError::overflow(line_number))?;
    }

    Ok(ChainRecord {
        chain_id: header.chain_id,
        score: header.score,
        target: header.target,
        query: header.query,
        blocks,
    })
}

/// Records decoded from one or more batches, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub records: Vec<ChainRecord>,
    /// Chunks that failed to parse
    pub failed: usize,
    /// Parsed records rejected by the authoritative score filter
    pub filtered: usize,
}

impl ParsedBatch {
    /// Append another batch, keeping order
    pub fn append(&mut self, other: ParsedBatch) {
        self.records.extend(other.records);
        self.failed += other.failed;
        self.filtered += other.filtered;
    }
}

enum ChunkOutcome {
    Kept(ChainRecord),
    Filtered,
    Failed(RecordParseError),
}

fn parse_and_filter(chunk: &[u8], min_score: Option<i64>) -> ChunkOutcome {
    match parse_chunk(chunk) {
        Ok(record) if min_score.map_or(true, |m| record_meets_min_score(&record, m)) => {
            ChunkOutcome::Kept(record)
        }
        Ok(_) => ChunkOutcome::Filtered,
        Err(e) => ChunkOutcome::Failed(e),
    }
}

/// Parse a batch of chunks, applying the score filter authoritatively
///
/// Chunks that fail to parse or score below `min_score` are left out.
/// With a pool, chunks are decoded in parallel; output order always
/// matches input order.
///
/// # Errors
/// [`ChainError::Capacity`] if `chunks` holds more than
/// [`PARSER_HARD_CAPACITY`] entries. Nothing is parsed in that case.
pub fn parse_many_chunks(
    chunks: &[Vec<u8>],
    min_score: Option<i64>,
    pool: Option<&rayon::ThreadPool>,
) -> Result<ParsedBatch, ChainError> {
    if chunks.len() > PARSER_HARD_CAPACITY {
        return Err(ChainError::Capacity {
            size: chunks.len(),
            capacity: PARSER_HARD_CAPACITY,
        });
    }

    let outcomes: Vec<ChunkOutcome> = match pool {
        Some(pool) => pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| parse_and_filter(chunk, min_score))
                .collect()
        }),
        None => chunks
            .iter()
            .map(|chunk| parse_and_filter(chunk, min_score))
            .collect(),
    };

    let mut batch = ParsedBatch {
        records: Vec::with_capacity(outcomes.len()),
        ..ParsedBatch::default()
    };
    for outcome in outcomes {
        match outcome {
            ChunkOutcome::Kept(record) => batch.records.push(record),
            ChunkOutcome::Filtered => batch.filtered += 1,
            ChunkOutcome::Failed(e) => {
                debug!("Skipping malformed chain record: {}", e);
                batch.failed += 1;
            }
        }
    }

    Ok(batch)
}
