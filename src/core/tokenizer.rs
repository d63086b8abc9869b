//! Chain record tokenizer
//!
//! Splits a (possibly compressed) chain byte stream into raw per-record
//! chunks. A chunk runs from a `chain ` marker at the start of a line up to
//! the next marker or end of stream, trimmed of surrounding whitespace.
//!
//! Two modes produce identical chunk sequences:
//! - whole-buffer: decode everything, then split (small compressed inputs)
//! - streaming: one line at a time, bounded memory regardless of file size

use crate::core::io::{self, ByteLineIterator, CompressionFormat, WHOLE_BUFFER_THRESHOLD};
use log::debug;
use memchr::memmem;
use std::io::BufRead;
use std::path::Path;

/// Literal that opens every chain record
pub const HEADER_MARKER: &[u8] = b"chain ";

/// How the tokenizer reads its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizerMode {
    /// Whole-buffer for compressed files up to 16MB, streaming otherwise
    #[default]
    Auto,
    /// Decode the entire input into memory, then split
    WholeBuffer,
    /// Read line by line
    Streaming,
}

/// Early, permissive score check on a raw header line
///
/// Returns `false` only when the score field parses as an integer below
/// `min_score`. A missing or unparseable score keeps the chunk so the record
/// parser can make the final call.
pub fn header_meets_min_score(header: &[u8], min_score: i64) -> bool {
    let score = header
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty())
        .nth(1)
        .and_then(|field| std::str::from_utf8(field).ok())
        .and_then(|field| field.parse::<i64>().ok());

    match score {
        Some(score) => score >= min_score,
        None => true,
    }
}

/// Lazy iterator over raw chain chunks
///
/// Owns the underlying file or decoder; it is released when the tokenizer
/// is dropped, whether iteration finished or not.
pub struct ChunkTokenizer {
    source: ChunkSource,
    min_score: Option<i64>,
}

enum ChunkSource {
    Whole {
        content: Vec<u8>,
        starts: Vec<usize>,
        next: usize,
    },
    Stream {
        lines: ByteLineIterator<Box<dyn BufRead + Send>>,
        current: Vec<u8>,
        keep: bool,
        done: bool,
    },
}

impl ChunkTokenizer {
    /// Open a chain file, picking a read mode per `mode`
    pub fn open(path: &Path, min_score: Option<i64>, mode: TokenizerMode) -> std::io::Result<Self> {
        let format = CompressionFormat::from_path(path);
        let whole = match mode {
            TokenizerMode::WholeBuffer => true,
            TokenizerMode::Streaming => false,
            TokenizerMode::Auto => {
                format.is_compressed() && std::fs::metadata(path)?.len() <= WHOLE_BUFFER_THRESHOLD
            }
        };

        if whole {
            match io::read_all(path) {
                Ok(content) => {
                    debug!("Tokenizing {} from a single buffer ({} bytes)", path.display(), content.len());
                    return Ok(Self::from_bytes(content, min_score));
                }
                Err(e) if mode == TokenizerMode::Auto => {
                    debug!("Whole-buffer read of {} failed ({}); streaming instead", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Streaming {} ({:?})", path.display(), format);
        Ok(Self::from_reader(io::open_reader(path)?, min_score))
    }

    /// Tokenize an in-memory buffer
    pub fn from_bytes(content: Vec<u8>, min_score: Option<i64>) -> Self {
        let starts = memmem::find_iter(&content, HEADER_MARKER)
            .filter(|&pos| pos == 0 || content[pos - 1] == b'\n')
            .collect();
        Self {
            source: ChunkSource::Whole {
                content,
                starts,
                next: 0,
            },
            min_score,
        }
    }

    /// Tokenize a buffered reader line by line
    pub fn from_reader(reader: Box<dyn BufRead + Send>, min_score: Option<i64>) -> Self {
        Self {
            source: ChunkSource::Stream {
                lines: ByteLineIterator::new(reader),
                current: Vec::new(),
                keep: false,
                done: false,
            },
            min_score,
        }
    }

    /// The mode actually in use (never `Auto`)
    pub fn mode(&self) -> TokenizerMode {
        match self.source {
            ChunkSource::Whole { .. } => TokenizerMode::WholeBuffer,
            ChunkSource::Stream { .. } => TokenizerMode::Streaming,
        }
    }
}

impl Iterator for ChunkTokenizer {
    type Item = std::io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let min_score = self.min_score;
        match &mut self.source {
            ChunkSource::Whole {
                content,
                starts,
                next,
            } => {
                while *next < starts.len() {
                    let begin = starts[*next];
                    let end = starts.get(*next + 1).copied().unwrap_or(content.len());
                    *next += 1;

                    let chunk = io::trim_ascii(&content[begin..end]);
                    let header_end = memchr::memchr(b'\n', chunk).unwrap_or(chunk.len());
                    let keep = min_score
                        .map_or(true, |m| header_meets_min_score(&chunk[..header_end], m));
                    if keep {
                        return Some(Ok(chunk.to_vec()));
                    }
                }
                None
            }
            ChunkSource::Stream {
                lines,
                current,
                keep,
                done,
            } => {
                if *done {
                    return None;
                }
                loop {
                    let line = match lines.next_line() {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            *done = true;
                            return Some(Err(e));
                        }
                        None => {
                            *done = true;
                            if *keep && !current.is_empty() {
                                return Some(Ok(into_trimmed(std::mem::take(current))));
                            }
                            return None;
                        }
                    };

                    if line.starts_with(HEADER_MARKER) {
                        let finished = (*keep && !current.is_empty()).then(|| std::mem::take(current));
                        current.clear();
                        *keep = min_score.map_or(true, |m| header_meets_min_score(line, m));
                        if *keep {
                            current.extend_from_slice(line);
                        }
                        if let Some(chunk) = finished {
                            return Some(Ok(into_trimmed(chunk)));
                        }
                    } else if *keep && !current.is_empty() {
                        // body of a dropped record is never buffered
                        current.extend_from_slice(line);
                    }
                }
            }
        }
    }
}

fn into_trimmed(mut chunk: Vec<u8>) -> Vec<u8> {
    let end = chunk
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    chunk.truncate(end);
    let start = chunk
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(chunk.len());
    chunk.drain(..start);
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CHAINS: &[u8] = b"\
chain 1000 chr1 1000 + 0 100 chr1 1000 + 0 100 1
100

chain 50 chr2 2000 + 0 50 chr2 2000 + 0 50 2
50
";

    fn collect(tokenizer: ChunkTokenizer) -> Vec<Vec<u8>> {
        tokenizer.map(|c| c.unwrap()).collect()
    }

    fn streaming(data: &[u8], min_score: Option<i64>) -> Vec<Vec<u8>> {
        let reader: Box<dyn BufRead + Send> = Box::new(std::io::Cursor::new(data.to_vec()));
        collect(ChunkTokenizer::from_reader(reader, min_score))
    }

    fn whole(data: &[u8], min_score: Option<i64>) -> Vec<Vec<u8>> {
        collect(ChunkTokenizer::from_bytes(data.to_vec(), min_score))
    }

    #[test]
    fn test_header_score_filter() {
        let header = b"chain 500 chr1 1000 + 0 100 chr1 1000 + 0 100 1";
        assert!(header_meets_min_score(header, 500));
        assert!(header_meets_min_score(header, -10));
        assert!(!header_meets_min_score(header, 501));
    }

    #[test]
    fn test_header_score_filter_is_permissive() {
        assert!(header_meets_min_score(b"chain abc chr1", 1_000_000));
        assert!(header_meets_min_score(b"chain 12.5 chr1", 1_000_000));
        assert!(header_meets_min_score(b"chain", 1_000_000));
        assert!(header_meets_min_score(b"", 1_000_000));
    }

    #[test]
    fn test_split_two_chains() {
        for chunks in [whole(TWO_CHAINS, None), streaming(TWO_CHAINS, None)] {
            assert_eq!(chunks.len(), 2);
            assert_eq!(
                chunks[0],
                b"chain 1000 chr1 1000 + 0 100 chr1 1000 + 0 100 1\n100".to_vec()
            );
            assert_eq!(
                chunks[1],
                b"chain 50 chr2 2000 + 0 50 chr2 2000 + 0 50 2\n50".to_vec()
            );
        }
    }

    #[test]
    fn test_min_score_drops_chunks() {
        for chunks in [whole(TWO_CHAINS, Some(100)), streaming(TWO_CHAINS, Some(100))] {
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].starts_with(b"chain 1000 "));
        }
    }

    #[test]
    fn test_marker_only_at_line_start() {
        let data = b"# chain 5 comment\nchain 1 a 10 + 0 5 b 10 + 0 5 7\n5 # not a chain x\n";
        for chunks in [whole(data, None), streaming(data, None)] {
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].starts_with(b"chain 1 a"));
        }
    }

    #[test]
    fn test_leading_garbage_ignored() {
        let data = b"junk line\n\nchain 1 a 10 + 0 5 b 10 + 0 5 7\n5\n";
        assert_eq!(whole(data, None), streaming(data, None));
        assert_eq!(whole(data, None).len(), 1);
    }

    #[test]
    fn test_trailing_data_closes_final_chunk() {
        let data = b"chain 1 a 10 + 0 5 b 10 + 0 5 7\n5\ngarbage without header";
        for chunks in [whole(data, None), streaming(data, None)] {
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].ends_with(b"garbage without header"));
        }
    }

    #[test]
    fn test_unparseable_score_kept() {
        let data = b"chain x a 10 + 0 5 b 10 + 0 5 7\n5\n";
        assert_eq!(whole(data, Some(i64::MAX)).len(), 1);
        assert_eq!(streaming(data, Some(i64::MAX)).len(), 1);
    }

    #[test]
    fn test_crlf_input() {
        let data = b"chain 3 a 10 + 0 5 b 10 + 0 5 7\r\n5\r\n\r\nchain 4 a 10 + 0 5 b 10 + 0 5 8\r\n5\r\n";
        let chunks = whole(data, None);
        assert_eq!(chunks, streaming(data, None));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with(b"\r\n5"));
    }

    #[test]
    fn test_empty_input() {
        assert!(whole(b"", None).is_empty());
        assert!(streaming(b"", None).is_empty());
        assert!(whole(b"\n\n  \n", None).is_empty());
    }

    #[test]
    fn test_mode_reported() {
        assert_eq!(ChunkTokenizer::from_bytes(Vec::new(), None).mode(), TokenizerMode::WholeBuffer);
        let reader: Box<dyn BufRead + Send> = Box::new(std::io::Cursor::new(Vec::new()));
        assert_eq!(ChunkTokenizer::from_reader(reader, None).mode(), TokenizerMode::Streaming);
    }

    #[test]
    fn test_open_missing_file() {
        let result = ChunkTokenizer::open(Path::new("/nonexistent/x.chain"), None, TokenizerMode::Auto);
        assert!(result.is_err());
    }
}
