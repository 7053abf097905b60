//! Block file readers.
//!
//! A [`BlockReader`] walks block headers through its own file handle and
//! hands out one [`BlockEntryReader`] per block. Every entry reader opens
//! its own handle, so blocks of one file can be read side by side.

use crate::constants::{BLOCK_HEADER_SIZE, ENTRY_HEADER_SIZE, OFF_BLOCK_SIZE, OFF_ENTRY_COUNT};
use crate::entry::{is_eof, read_entry};
use bytes::Buf;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zyron_common::{Result, ZyronError};
use zyron_index::Layout;

/// Forward cursor over sorted entries.
///
/// `key` and `value` borrow scratch that the next call to `next` reuses,
/// so callers copy what they keep.
pub trait BlockEntryCursor<K, V> {
    /// Advances to the next entry. Returns false when exhausted.
    fn next(&mut self) -> Result<bool>;

    fn key(&self) -> &K;

    fn value(&self) -> &V;

    /// Releases the underlying file handle. Idempotent.
    fn close(&mut self);
}

/// Cursor over the entries of one block.
pub struct BlockEntryReader<L: Layout> {
    layout: Arc<L>,
    reader: Option<BufReader<File>>,
    block_offset: u64,
    block_size: u64,
    entry_count: u64,
    entries_read: u64,
    bytes_read: u64,
    key: L::Key,
    value: L::Value,
    scratch: Vec<u8>,
}

impl<L: Layout> BlockEntryReader<L> {
    fn open(
        layout: Arc<L>,
        path: &Path,
        block_offset: u64,
        block_size: u64,
        entry_count: u64,
        read_buffer_size: usize,
    ) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(block_offset + BLOCK_HEADER_SIZE as u64))?;
        let key = layout.new_key();
        let value = layout.new_value();
        Ok(Self {
            layout,
            reader: Some(BufReader::with_capacity(read_buffer_size, file)),
            block_offset,
            block_size,
            entry_count,
            entries_read: 0,
            bytes_read: 0,
            key,
            value,
            scratch: Vec::new(),
        })
    }

    /// Number of entries in the block.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Size of the block in bytes, including its header.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// File offset of the block header.
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    fn corrupted(&self, reason: String) -> ZyronError {
        ZyronError::BlockCorrupted {
            offset: self.block_offset,
            reason,
        }
    }
}

impl<L: Layout> BlockEntryCursor<L::Key, L::Value> for BlockEntryReader<L> {
    fn next(&mut self) -> Result<bool> {
        if self.entries_read == self.entry_count {
            return Ok(false);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(ZyronError::InvalidState(
                "read from a closed block entry reader".to_string(),
            ));
        };

        let result = read_entry(
            &*self.layout,
            reader,
            &mut self.scratch,
            &mut self.key,
            &mut self.value,
        );
        if let Err(e) = result {
            if is_eof(&e) {
                return Err(self.corrupted(format!(
                    "entry {} of {} truncated",
                    self.entries_read, self.entry_count
                )));
            }
            return Err(e);
        }

        self.entries_read += 1;
        self.bytes_read += (ENTRY_HEADER_SIZE + self.scratch.len()) as u64;
        if self.bytes_read > self.block_size - BLOCK_HEADER_SIZE as u64 {
            return Err(self.corrupted(format!(
                "entries overrun block of {} bytes",
                self.block_size
            )));
        }
        Ok(true)
    }

    fn key(&self) -> &L::Key {
        &self.key
    }

    fn value(&self) -> &L::Value {
        &self.value
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Walks the blocks of one block file.
///
/// Closing the reader leaves already opened entry readers untouched.
pub struct BlockReader<L: Layout> {
    layout: Arc<L>,
    path: PathBuf,
    file: Option<File>,
    file_len: u64,
    offset: u64,
    read_buffer_size: usize,
}

impl<L: Layout> BlockReader<L> {
    /// Opens a block file for reading.
    pub fn open(layout: Arc<L>, path: &Path, read_buffer_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            layout,
            path: path.to_path_buf(),
            file: Some(file),
            file_len,
            offset: 0,
            read_buffer_size,
        })
    }

    /// Returns a reader over the next block, or None past the last block.
    pub fn next_block(&mut self) -> Result<Option<BlockEntryReader<L>>> {
        let offset = self.offset;
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };
        if offset >= self.file_len {
            return Ok(None);
        }
        let corrupted = |reason: String| ZyronError::BlockCorrupted { offset, reason };

        let available = self.file_len - offset;
        if available < BLOCK_HEADER_SIZE as u64 {
            return Err(corrupted(format!("truncated block header of {} bytes", available)));
        }
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut header)?;
        let block_size = (&header[OFF_BLOCK_SIZE..]).get_u64_le();
        let entry_count = (&header[OFF_ENTRY_COUNT..]).get_u64_le();

        if block_size < BLOCK_HEADER_SIZE as u64 || block_size > available {
            return Err(corrupted(format!(
                "block size {} outside {}..={}",
                block_size, BLOCK_HEADER_SIZE, available
            )));
        }
        let max_entries = (block_size - BLOCK_HEADER_SIZE as u64) / ENTRY_HEADER_SIZE as u64;
        if entry_count > max_entries {
            return Err(corrupted(format!(
                "{} entries cannot fit a block of {} bytes",
                entry_count, block_size
            )));
        }

        let reader = BlockEntryReader::open(
            Arc::clone(&self.layout),
            &self.path,
            offset,
            block_size,
            entry_count,
            self.read_buffer_size,
        )?;
        self.offset += block_size;
        Ok(Some(reader))
    }

    /// Releases the header file handle.
    pub fn close(&mut self) {
        self.file = None;
    }
}
