//! Sorted block storage with multi-pass merging.
//!
//! Entries are buffered in memory, sorted by the layout comparator and
//! appended to one file as blocks:
//!
//! Block layout:
//! - block_size: 8 bytes, including this header
//! - entry_count: 8 bytes
//! - entries: framed as `[key_size u16][value_size u16][key][value]`
//!
//! [`BlockStorage::merge`] folds groups of blocks together until one
//! sorted block remains.

use crate::constants::{BLOCK_HEADER_SIZE, MERGE_FILE_SUFFIX};
use crate::entry::{checked_entry_size, write_entry};
use crate::merge::MergingBlockEntryReader;
use crate::reader::{BlockEntryCursor, BlockReader};
use bytes::{BufMut, BytesMut};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zyron_common::{PopulationConfig, Result, ZyronError};
use zyron_index::Layout;

/// Counters for one block storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStorageStats {
    /// Entries accepted by `add`.
    pub entries_added: u64,
    /// Blocks written by flushes.
    pub blocks_flushed: u64,
    /// Completed merge passes.
    pub merge_passes: u64,
    /// Entries rewritten by merge passes.
    pub entries_merged: u64,
}

impl AddAssign for BlockStorageStats {
    fn add_assign(&mut self, other: Self) {
        self.entries_added += other.entries_added;
        self.blocks_flushed += other.blocks_flushed;
        self.merge_passes += other.merge_passes;
        self.entries_merged += other.entries_merged;
    }
}

/// Writer of sorted blocks into one temp file. Dropping it removes the file.
pub struct BlockStorage<L: Layout> {
    layout: Arc<L>,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    buffer: Vec<(L::Key, L::Value)>,
    buffered_bytes: usize,
    block_size: usize,
    read_buffer_size: usize,
    fsync_enabled: bool,
    block_count: u64,
    encode_buf: BytesMut,
    stats: BlockStorageStats,
}

impl<L: Layout> BlockStorage<L> {
    /// Creates the block file at `path`, truncating any previous content.
    pub fn create(layout: Arc<L>, path: &Path, config: &PopulationConfig) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            layout,
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            buffer: Vec::new(),
            buffered_bytes: 0,
            block_size: config.block_size,
            read_buffer_size: config.read_buffer_size,
            fsync_enabled: config.fsync_enabled,
            block_count: 0,
            encode_buf: BytesMut::new(),
            stats: BlockStorageStats::default(),
        })
    }

    /// Buffers a copy of the entry, flushing a block when the buffer is full.
    pub fn add(&mut self, key: &L::Key, value: &L::Value) -> Result<()> {
        if self.writer.is_none() {
            return Err(ZyronError::InvalidState(
                "add to block storage after done_adding".to_string(),
            ));
        }
        let size = checked_entry_size(&*self.layout, key, value)?;

        let mut copy = self.layout.new_key();
        self.layout.copy_key(key, &mut copy);
        self.buffer.push((copy, value.clone()));
        self.buffered_bytes += size;
        self.stats.entries_added += 1;

        if BLOCK_HEADER_SIZE + self.buffered_bytes >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Sorts the buffered entries and appends them as one block.
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(ZyronError::InvalidState("flush of a finished block storage".to_string()));
        };

        let layout = &*self.layout;
        self.buffer.sort_by(|a, b| layout.compare(&a.0, &b.0));

        let block_size = BLOCK_HEADER_SIZE + self.buffered_bytes;
        self.encode_buf.clear();
        self.encode_buf.reserve(block_size);
        self.encode_buf.put_u64_le(block_size as u64);
        self.encode_buf.put_u64_le(self.buffer.len() as u64);
        for (key, value) in &self.buffer {
            write_entry(layout, &mut self.encode_buf, key, value);
        }
        writer.write_all(&self.encode_buf)?;

        debug!(
            path = %self.path.display(),
            entries = self.buffer.len(),
            bytes = block_size,
            "Flushed block"
        );
        self.buffer.clear();
        self.buffered_bytes = 0;
        self.block_count += 1;
        self.stats.blocks_flushed += 1;
        Ok(())
    }

    /// Flushes the last partial block and closes the file for writing.
    ///
    /// Calling it again is a no-op.
    pub fn done_adding(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.flush()?;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            if self.fsync_enabled {
                writer.get_ref().sync_all()?;
            }
        }
        Ok(())
    }

    /// Merges blocks `merge_factor` at a time until at most one remains.
    ///
    /// Each pass writes a sibling file and renames it over the block file.
    pub fn merge(&mut self, merge_factor: usize) -> Result<()> {
        if self.writer.is_some() {
            return Err(ZyronError::InvalidState("merge before done_adding".to_string()));
        }
        if merge_factor < 2 {
            return Err(ZyronError::InvalidParameter {
                name: "merge_factor".to_string(),
                value: merge_factor.to_string(),
            });
        }

        let target = self.merge_path();
        while self.block_count > 1 {
            let blocks_before = self.block_count;
            let (blocks, entries) = self.merge_pass(&target, merge_factor)?;
            fs::rename(&target, &self.path)?;
            self.block_count = blocks;
            self.stats.merge_passes += 1;
            self.stats.entries_merged += entries;
            debug!(
                path = %self.path.display(),
                pass = self.stats.merge_passes,
                blocks_before,
                blocks_after = blocks,
                "Merge pass complete"
            );
        }
        info!(
            path = %self.path.display(),
            passes = self.stats.merge_passes,
            entries = self.stats.entries_added,
            "Block merge complete"
        );
        Ok(())
    }

    /// Writes one merge pass into `target`. Returns the block and entry counts.
    fn merge_pass(&mut self, target: &Path, merge_factor: usize) -> Result<(u64, u64)> {
        let layout = Arc::clone(&self.layout);
        let mut out = BufWriter::new(File::create(target)?);
        let mut blocks =
            BlockReader::open(Arc::clone(&layout), &self.path, self.read_buffer_size)?;
        let mut blocks_written = 0u64;
        let mut entries_written = 0u64;

        loop {
            let mut merger = MergingBlockEntryReader::new(&*layout);
            let mut block_size = BLOCK_HEADER_SIZE as u64;
            let mut entry_count = 0u64;
            let mut sources = 0;
            while sources < merge_factor {
                let Some(block) = blocks.next_block()? else {
                    break;
                };
                block_size += block.block_size() - BLOCK_HEADER_SIZE as u64;
                entry_count += block.entry_count();
                merger.add_source(Box::new(block));
                sources += 1;
            }
            if sources == 0 {
                break;
            }

            self.encode_buf.clear();
            self.encode_buf.put_u64_le(block_size);
            self.encode_buf.put_u64_le(entry_count);
            out.write_all(&self.encode_buf)?;
            while merger.next()? {
                self.encode_buf.clear();
                write_entry(&*layout, &mut self.encode_buf, merger.key(), merger.value());
                out.write_all(&self.encode_buf)?;
            }
            merger.close();

            blocks_written += 1;
            entries_written += entry_count;
        }
        blocks.close();

        out.flush()?;
        if self.fsync_enabled {
            out.get_ref().sync_all()?;
        }
        Ok((blocks_written, entries_written))
    }

    fn merge_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(MERGE_FILE_SUFFIX);
        PathBuf::from(name)
    }

    /// Opens a reader over the finished block file.
    pub fn reader(&self) -> Result<BlockReader<L>> {
        if self.writer.is_some() {
            return Err(ZyronError::InvalidState("read before done_adding".to_string()));
        }
        BlockReader::open(Arc::clone(&self.layout), &self.path, self.read_buffer_size)
    }

    /// Number of blocks currently in the file.
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn stats(&self) -> BlockStorageStats {
        self.stats
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the block file and any merge leftover. Safe to call twice.
    pub fn close(&mut self) -> Result<()> {
        self.writer = None;
        self.buffer.clear();
        remove_if_exists(&self.merge_path())?;
        remove_if_exists(&self.path)
    }
}

impl<L: Layout> Drop for BlockStorage<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove block file");
        }
    }
}

/// Removes a file, ignoring one that does not exist.
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use tempfile::TempDir;
    use zyron_index::{GenericKey, GenericLayout, IdSemantics, IndexKey, NullValue, Value};

    fn config(dir: &TempDir, block_size: usize) -> PopulationConfig {
        PopulationConfig {
            temp_dir: dir.path().to_path_buf(),
            block_size,
            ..PopulationConfig::default()
        }
    }

    fn key(layout: &GenericLayout, entity_id: i64, value: i64) -> GenericKey {
        let mut key = layout.new_key();
        key.initialize_from_values(entity_id, &[Value::Long(value)]).unwrap();
        key
    }

    fn read_all(storage: &BlockStorage<GenericLayout>) -> Vec<Vec<i64>> {
        let mut blocks = Vec::new();
        let mut reader = storage.reader().unwrap();
        while let Some(mut block) = reader.next_block().unwrap() {
            let mut ids = Vec::new();
            while block.next().unwrap() {
                ids.push(block.key().entity_id());
            }
            assert_eq!(ids.len() as u64, block.entry_count());
            blocks.push(ids);
        }
        blocks
    }

    #[test]
    fn test_single_block_is_sorted() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("single.scan");
        let mut storage = BlockStorage::create(Arc::clone(&layout), &path, &config(&dir, 1 << 20))
            .unwrap();
        for v in [5, 3, 9, 1] {
            storage.add(&key(&layout, v, v), &NullValue).unwrap();
        }
        storage.done_adding().unwrap();
        assert_eq!(storage.block_count(), 1);
        assert_eq!(read_all(&storage), vec![vec![1, 3, 5, 9]]);
    }

    #[test]
    fn test_small_blocks_flush_and_merge() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("many.scan");
        // Each Long key frames to 4 + 8 + 1 + 1 + 8 = 22 bytes.
        let block_size = BLOCK_HEADER_SIZE + 22 * 10;
        let config = config(&dir, block_size);
        let mut storage = BlockStorage::create(Arc::clone(&layout), &path, &config).unwrap();

        let mut values: Vec<i64> = (0..1000).collect();
        values.shuffle(&mut rand::thread_rng());
        for v in &values {
            storage.add(&key(&layout, *v, *v), &NullValue).unwrap();
        }
        storage.done_adding().unwrap();
        assert_eq!(storage.block_count(), 100);
        assert_eq!(storage.stats().blocks_flushed, 100);

        storage.merge(3).unwrap();
        assert_eq!(storage.block_count(), 1);
        // 100 -> 34 -> 12 -> 4 -> 2 -> 1
        assert_eq!(storage.stats().merge_passes, 5);
        assert_eq!(storage.stats().entries_merged, 5000);

        let blocks = read_all(&storage);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], (0..1000).collect::<Vec<i64>>());
        assert!(!storage.merge_path().exists());
    }

    #[test]
    fn test_empty_storage_merges_to_nothing() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("empty.scan");
        let mut storage = BlockStorage::create(layout, &path, &config(&dir, 1 << 20)).unwrap();
        storage.done_adding().unwrap();
        storage.merge(8).unwrap();
        assert!(read_all(&storage).is_empty());
        assert_eq!(storage.stats().merge_passes, 0);
    }

    #[test]
    fn test_lifecycle_errors() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("life.scan");
        let mut storage = BlockStorage::create(Arc::clone(&layout), &path, &config(&dir, 1 << 20))
            .unwrap();
        assert!(matches!(storage.merge(2), Err(ZyronError::InvalidState(_))));
        assert!(matches!(storage.reader(), Err(ZyronError::InvalidState(_))));

        storage.done_adding().unwrap();
        storage.done_adding().unwrap();
        let err = storage.add(&key(&layout, 1, 1), &NullValue).unwrap_err();
        assert!(matches!(err, ZyronError::InvalidState(_)));
        assert!(matches!(
            storage.merge(1),
            Err(ZyronError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_close_removes_file() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("gone.scan");
        let mut storage = BlockStorage::create(Arc::clone(&layout), &path, &config(&dir, 1 << 20))
            .unwrap();
        storage.add(&key(&layout, 1, 1), &NullValue).unwrap();
        storage.done_adding().unwrap();
        assert!(path.exists());
        storage.close().unwrap();
        assert!(!path.exists());
        storage.close().unwrap();
    }

    #[test]
    fn test_drop_removes_files() {
        let dir = TempDir::new().unwrap();
        let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
        let path = dir.path().join("dropped.scan");
        let config = config(&dir, BLOCK_HEADER_SIZE + 22 * 2);
        let merge_path = {
            let mut storage = BlockStorage::create(Arc::clone(&layout), &path, &config).unwrap();
            for v in 0..10 {
                storage.add(&key(&layout, v, v), &NullValue).unwrap();
            }
            storage.done_adding().unwrap();
            storage.merge(2).unwrap();
            assert!(path.exists());
            storage.merge_path()
        };
        assert!(!path.exists());
        assert!(!merge_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stats_add_assign() {
        let mut total = BlockStorageStats::default();
        let part = BlockStorageStats {
            entries_added: 3,
            blocks_flushed: 2,
            merge_passes: 1,
            entries_merged: 3,
        };
        total += part;
        total += part;
        assert_eq!(total.entries_added, 6);
        assert_eq!(total.blocks_flushed, 4);
        assert_eq!(total.merge_passes, 2);
        assert_eq!(total.entries_merged, 6);
    }
}
