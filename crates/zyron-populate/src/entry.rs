//! Entry framing shared by block files and the update log.
//!
//! Entry layout:
//! - key_size: 2 bytes
//! - value_size: 2 bytes
//! - key: key_size bytes
//! - value: value_size bytes
//!
//! Removed and changed-from keys in the update log carry no value and
//! are framed as `[key_size u16][key]`.

use crate::constants::ENTRY_HEADER_SIZE;
use bytes::{Buf, BufMut};
use std::io::{ErrorKind, Read};
use zyron_common::page::fits_page;
use zyron_common::{Result, ZyronError, MAX_ENTRY_SIZE};
use zyron_index::Layout;

/// Size of the key-only frame header.
pub const KEY_HEADER_SIZE: usize = 2;

/// Returns the framed size of an entry, or `KeyTooLarge` if its key and
/// value would not fit a tree page.
pub fn checked_entry_size<L: Layout>(
    layout: &L,
    key: &L::Key,
    value: &L::Value,
) -> Result<usize> {
    let size = layout.key_size(key) + layout.value_size(value);
    if !fits_page(size) {
        return Err(ZyronError::KeyTooLarge {
            size,
            max: MAX_ENTRY_SIZE,
        });
    }
    Ok(ENTRY_HEADER_SIZE + size)
}

/// Writes a framed entry. The caller checks the size first.
pub fn write_entry<L: Layout, B: BufMut>(layout: &L, buf: &mut B, key: &L::Key, value: &L::Value) {
    buf.put_u16_le(layout.key_size(key) as u16);
    buf.put_u16_le(layout.value_size(value) as u16);
    layout.write_key(buf, key);
    layout.write_value(buf, value);
}

/// Writes a key-only frame. The caller checks the size first.
pub fn write_key_frame<L: Layout, B: BufMut>(layout: &L, buf: &mut B, key: &L::Key) {
    buf.put_u16_le(layout.key_size(key) as u16);
    layout.write_key(buf, key);
}

/// Reads a framed entry into reusable scratch.
pub fn read_entry<L: Layout, R: Read>(
    layout: &L,
    reader: &mut R,
    scratch: &mut Vec<u8>,
    key: &mut L::Key,
    value: &mut L::Value,
) -> Result<()> {
    let mut header = [0u8; ENTRY_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let mut header = &header[..];
    let key_size = header.get_u16_le() as usize;
    let value_size = header.get_u16_le() as usize;

    scratch.clear();
    scratch.resize(key_size + value_size, 0);
    reader.read_exact(scratch)?;
    let mut buf = &scratch[..];
    layout.read_key(&mut buf, key, key_size)?;
    layout.read_value(&mut buf, value, value_size)
}

/// Reads a key-only frame into reusable scratch.
pub fn read_key_frame<L: Layout, R: Read>(
    layout: &L,
    reader: &mut R,
    scratch: &mut Vec<u8>,
    key: &mut L::Key,
) -> Result<()> {
    let mut header = [0u8; KEY_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let key_size = u16::from_le_bytes(header) as usize;

    scratch.clear();
    scratch.resize(key_size, 0);
    reader.read_exact(scratch)?;
    layout.read_key(&mut &scratch[..], key, key_size)
}

/// Returns true if the error is an unexpected end of file.
pub fn is_eof(err: &ZyronError) -> bool {
    matches!(err, ZyronError::Io(e) if e.kind() == ErrorKind::UnexpectedEof)
}
