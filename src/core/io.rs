//! Compressed input handling and byte-line reading
//!
//! Compression is chosen by file suffix. Readers are boxed so the tokenizer
//! can hold one type for plain, gzip and bzip2 sources.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Default buffer size for BufReader (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Compressed files at or below this on-disk size are decoded in one go (16MB)
pub const WHOLE_BUFFER_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Compression format of a chain file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain text (uncompressed)
    Plain,
    /// Gzip compressed (.gz)
    Gzip,
    /// Bzip2 compressed (.bz2)
    Bzip2,
}

impl CompressionFormat {
    /// Select the format from the file suffix (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("gz") => CompressionFormat::Gzip,
            Some("bz2") => CompressionFormat::Bzip2,
            _ => CompressionFormat::Plain,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressionFormat::Plain)
    }
}

/// Open `path` as a buffered, decompressing reader
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    Ok(match CompressionFormat::from_path(path) {
        CompressionFormat::Gzip => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            flate2::read::MultiGzDecoder::new(file),
        )),
        CompressionFormat::Bzip2 => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            bzip2::read::MultiBzDecoder::new(file),
        )),
        CompressionFormat::Plain => Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file)),
    })
}

/// Read and decompress the entire file into memory
pub fn read_all(path: &Path) -> io::Result<Vec<u8>> {
    let mut reader = open_reader(path)?;
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    Ok(content)
}

/// Byte line iterator that reuses one buffer across lines
///
/// Unlike `BufRead::lines`, the line terminator is kept so callers can
/// rebuild the original byte stream exactly.
pub struct ByteLineIterator<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> ByteLineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Read the next line as bytes, terminator included
    pub fn next_line(&mut self) -> Option<io::Result<&[u8]>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None, // EOF
            Ok(_) => Some(Ok(&self.buffer)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Strip ASCII whitespace from both ends of a byte slice
pub fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
