//! Log of external index updates received while a population scan runs.
//!
//! Record layout:
//! - tag: 1 byte (ADDED, CHANGED, REMOVED or STOP)
//! - ADDED: `[key_size u16][value_size u16][key][value]`
//! - REMOVED: `[key_size u16][key]`
//! - CHANGED: `[key_size u16][old key]` then `[key_size u16][value_size u16][new key][value]`
//!
//! A STOP tag ends the log. Records are replayed in append order.

use crate::constants::{TYPE_ADDED, TYPE_CHANGED, TYPE_REMOVED, TYPE_STOP};
use crate::entry::{
    checked_entry_size, is_eof, read_entry, read_key_frame, write_entry, write_key_frame,
};
use bytes::{BufMut, BytesMut};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use zyron_common::{PopulationConfig, Result, ZyronError};
use zyron_index::Layout;

/// Kind of a logged update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateMode {
    Added = TYPE_ADDED,
    Changed = TYPE_CHANGED,
    Removed = TYPE_REMOVED,
}

impl TryFrom<u8> for UpdateMode {
    type Error = ZyronError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            TYPE_ADDED => Ok(UpdateMode::Added),
            TYPE_CHANGED => Ok(UpdateMode::Changed),
            TYPE_REMOVED => Ok(UpdateMode::Removed),
            _ => Err(ZyronError::UpdateLogCorrupted {
                reason: format!("unknown update tag {:#04x}", value),
            }),
        }
    }
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMode::Added => write!(f, "ADDED"),
            UpdateMode::Changed => write!(f, "CHANGED"),
            UpdateMode::Removed => write!(f, "REMOVED"),
        }
    }
}

/// Append-only writer of the update log. Dropping it removes the file.
pub struct IndexUpdateStorage<L: Layout> {
    layout: Arc<L>,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    read_buffer_size: usize,
    fsync_enabled: bool,
    count: u64,
    encode_buf: BytesMut,
}

impl<L: Layout> IndexUpdateStorage<L> {
    /// Creates the log file at `path`, truncating any previous content.
    pub fn create(layout: Arc<L>, path: &Path, config: &PopulationConfig) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            layout,
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            read_buffer_size: config.read_buffer_size,
            fsync_enabled: config.fsync_enabled,
            count: 0,
            encode_buf: BytesMut::new(),
        })
    }

    pub fn add_added(&mut self, key: &L::Key, value: &L::Value) -> Result<()> {
        checked_entry_size(&*self.layout, key, value)?;
        self.encode_buf.clear();
        self.encode_buf.put_u8(TYPE_ADDED);
        write_entry(&*self.layout, &mut self.encode_buf, key, value);
        self.append()
    }

    pub fn add_removed(&mut self, key: &L::Key) -> Result<()> {
        checked_entry_size(&*self.layout, key, &self.layout.new_value())?;
        self.encode_buf.clear();
        self.encode_buf.put_u8(TYPE_REMOVED);
        write_key_frame(&*self.layout, &mut self.encode_buf, key);
        self.append()
    }

    pub fn add_changed(&mut self, old: &L::Key, new: &L::Key, value: &L::Value) -> Result<()> {
        checked_entry_size(&*self.layout, old, value)?;
        checked_entry_size(&*self.layout, new, value)?;
        self.encode_buf.clear();
        self.encode_buf.put_u8(TYPE_CHANGED);
        write_key_frame(&*self.layout, &mut self.encode_buf, old);
        write_entry(&*self.layout, &mut self.encode_buf, new, value);
        self.append()
    }

    fn append(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ZyronError::InvalidState(
                "update log append after done_adding".to_string(),
            ));
        };
        writer.write_all(&self.encode_buf)?;
        self.count += 1;
        Ok(())
    }

    /// Writes the STOP tag and closes the file for writing. Calling it
    /// again is a no-op.
    pub fn done_adding(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.write_all(&[TYPE_STOP])?;
            writer.flush()?;
            if self.fsync_enabled {
                writer.get_ref().sync_all()?;
            }
        }
        Ok(())
    }

    /// Opens a cursor over the finished log.
    pub fn cursor(&self) -> Result<IndexUpdateCursor<L>> {
        if self.writer.is_some() {
            return Err(ZyronError::InvalidState("read before done_adding".to_string()));
        }
        IndexUpdateCursor::open(Arc::clone(&self.layout), &self.path, self.read_buffer_size)
    }

    /// Number of logged updates.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the log file. Safe to call twice.
    pub fn close(&mut self) -> Result<()> {
        self.writer = None;
        crate::block::remove_if_exists(&self.path)
    }
}

impl<L: Layout> Drop for IndexUpdateStorage<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove update log");
        }
    }
}

/// Reader of the update log in append order.
pub struct IndexUpdateCursor<L: Layout> {
    layout: Arc<L>,
    reader: BufReader<File>,
    mode: UpdateMode,
    key: L::Key,
    key2: L::Key,
    value: L::Value,
    scratch: Vec<u8>,
    finished: bool,
}

impl<L: Layout> IndexUpdateCursor<L> {
    pub fn open(layout: Arc<L>, path: &Path, read_buffer_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let key = layout.new_key();
        let key2 = layout.new_key();
        let value = layout.new_value();
        Ok(Self {
            layout,
            reader: BufReader::with_capacity(read_buffer_size, file),
            mode: UpdateMode::Added,
            key,
            key2,
            value,
            scratch: Vec::new(),
            finished: false,
        })
    }

    /// Advances to the next update. Returns false once STOP has been read.
    pub fn next(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let mut tag = [0u8; 1];
        self.reader.read_exact(&mut tag).map_err(|e| truncated(e.into()))?;
        if tag[0] == TYPE_STOP {
            self.finished = true;
            return Ok(false);
        }

        self.mode = UpdateMode::try_from(tag[0])?;
        let layout = &*self.layout;
        let result = match self.mode {
            UpdateMode::Added => read_entry(
                layout,
                &mut self.reader,
                &mut self.scratch,
                &mut self.key,
                &mut self.value,
            ),
            UpdateMode::Removed => {
                read_key_frame(layout, &mut self.reader, &mut self.scratch, &mut self.key)
            }
            UpdateMode::Changed => {
                read_key_frame(layout, &mut self.reader, &mut self.scratch, &mut self.key)
                    .and_then(|()| {
                        read_entry(
                            layout,
                            &mut self.reader,
                            &mut self.scratch,
                            &mut self.key2,
                            &mut self.value,
                        )
                    })
            }
        };
        result.map_err(truncated)?;
        Ok(true)
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.mode
    }

    /// Key of an added or removed entry, or the old key of a change.
    pub fn key(&self) -> &L::Key {
        &self.key
    }

    /// New key of a change.
    pub fn key2(&self) -> &L::Key {
        &self.key2
    }

    /// Value of an added entry or of the new key of a change.
    pub fn value(&self) -> &L::Value {
        &self.value
    }
}

/// Maps an unexpected end of file to a missing STOP tag.
fn truncated(err: ZyronError) -> ZyronError {
    if is_eof(&err) {
        ZyronError::UpdateLogCorrupted {
            reason: "log ends before stop marker".to_string(),
        }
    } else {
        err
    }
}
