use std::io::SeekFrom;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};

/// A regular file found under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the upload root, `/`-separated.
    pub relative_path: String,
    /// Size in bytes at enumeration time.
    pub size: u64,
    /// Where the bytes are read from.
    pub local_path: PathBuf,
}

impl SourceFile {
    /// Opens the whole file as a size-limited stream.
    pub async fn open(&self) -> std::io::Result<Take<File>> {
        self.open_range(ByteRange::new(0, self.size)).await
    }

    /// Opens `range` of the file as a stream that yields at most `range.len()` bytes.
    pub async fn open_range(&self, range: ByteRange) -> std::io::Result<Take<File>> {
        let mut file = File::open(&self.local_path).await?;
        if range.start > 0 {
            file.seek(SeekFrom::Start(range.start)).await?;
        }
        Ok(file.take(range.len()))
    }
}

/// Half-open byte range `[start, end)` within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Several whole files sent together in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUnit {
    pub entries: Vec<SourceFile>,
    /// Sum of the entry sizes; never above the size budget.
    pub packed_size: u64,
}

/// One byte-range slice of a file larger than the size budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUnit {
    pub file: SourceFile,
    /// Zero-based position of this chunk.
    pub chunk_index: u64,
    /// Number of chunks the file is split into.
    pub chunk_count: u64,
    pub range: ByteRange,
}

/// One network-transferable grouping of file data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadUnit {
    Batch(BatchUnit),
    Chunk(ChunkUnit),
}

impl PayloadUnit {
    /// Number of file bytes this unit carries.
    pub fn byte_len(&self) -> u64 {
        match self {
            PayloadUnit::Batch(batch) => batch.packed_size,
            PayloadUnit::Chunk(chunk) => chunk.range.len(),
        }
    }

    /// Relative path of the first file in the unit, for progress display.
    pub fn lead_path(&self) -> &str {
        match self {
            PayloadUnit::Batch(batch) => batch
                .entries
                .first()
                .map(|f| f.relative_path.as_str())
                .unwrap_or_default(),
            PayloadUnit::Chunk(chunk) => &chunk.file.relative_path,
        }
    }
}
