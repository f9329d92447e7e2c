//! Payload packing.
//!
//! Files strictly smaller than the size budget are packed whole into
//! batches; a batch is closed as soon as the next file would push it over
//! the budget. Every other file is split into `ceil(size / budget)`
//! chunks of `[i * budget, min((i + 1) * budget, size))`.

use std::iter::Fuse;

use crate::TransferError;
use crate::types::{BatchUnit, ByteRange, ChunkUnit, PayloadUnit, SourceFile};

/// Lazily packs a file sequence into payload units.
#[derive(Debug)]
pub struct Packer<I: Iterator<Item = SourceFile>> {
    files: Fuse<I>,
    budget: u64,
    batch: Vec<SourceFile>,
    batch_size: u64,
    chunking: Option<ChunkCursor>,
}

/// Packs `files` under `budget` bytes per unit.
pub fn pack<I>(files: I, budget: u64) -> Result<Packer<I::IntoIter>, TransferError>
where
    I: IntoIterator<Item = SourceFile>,
{
    if budget == 0 {
        return Err(TransferError::InvalidBudget);
    }
    Ok(Packer {
        files: files.into_iter().fuse(),
        budget,
        batch: Vec::new(),
        batch_size: 0,
        chunking: None,
    })
}

impl<I: Iterator<Item = SourceFile>> Packer<I> {
    fn flush_batch(&mut self) -> Option<PayloadUnit> {
        if self.batch.is_empty() {
            return None;
        }
        let entries = std::mem::take(&mut self.batch);
        let packed_size = std::mem::take(&mut self.batch_size);
        Some(PayloadUnit::Batch(BatchUnit {
            entries,
            packed_size,
        }))
    }
}

impl<I: Iterator<Item = SourceFile>> Iterator for Packer<I> {
    type Item = PayloadUnit;

    fn next(&mut self) -> Option<PayloadUnit> {
        loop {
            if let Some(cursor) = self.chunking.as_mut() {
                if let Some(chunk) = cursor.next_chunk(self.budget) {
                    return Some(PayloadUnit::Chunk(chunk));
                }
                self.chunking = None;
            }

            let Some(file) = self.files.next() else {
                return self.flush_batch();
            };

            // A file at or above the budget can never share a unit.
            if file.size >= self.budget {
                self.chunking = Some(ChunkCursor::new(file, self.budget));
                if let Some(batch) = self.flush_batch() {
                    return Some(batch);
                }
                continue;
            }

            let flushed = if self.batch_size + file.size > self.budget {
                self.flush_batch()
            } else {
                None
            };

            self.batch_size += file.size;
            self.batch.push(file);

            if flushed.is_some() {
                return flushed;
            }
        }
    }
}

#[derive(Debug)]
struct ChunkCursor {
    file: SourceFile,
    next_index: u64,
    chunk_count: u64,
}

impl ChunkCursor {
    fn new(file: SourceFile, budget: u64) -> Self {
        let chunk_count = file.size.div_ceil(budget);
        Self {
            file,
            next_index: 0,
            chunk_count,
        }
    }

    fn next_chunk(&mut self, budget: u64) -> Option<ChunkUnit> {
        if self.next_index >= self.chunk_count {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        let start = index * budget;
        let end = (start + budget).min(self.file.size);
        Some(ChunkUnit {
            file: self.file.clone(),
            chunk_index: index,
            chunk_count: self.chunk_count,
            range: ByteRange::new(start, end),
        })
    }
}
