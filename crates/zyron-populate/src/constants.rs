//! On-disk format constants for population temp files.

// Block file constants

/// Size of a block header in bytes: block size (8) and entry count (8).
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Offset of the block size field in a block header.
pub const OFF_BLOCK_SIZE: usize = 0;

/// Offset of the entry count field in a block header.
pub const OFF_ENTRY_COUNT: usize = 8;

/// Size of an entry header: key size (2) and value size (2).
pub const ENTRY_HEADER_SIZE: usize = 4;

// Update log constants

/// Tag of an added entry.
pub const TYPE_ADDED: u8 = 0;

/// Tag of a changed entry.
pub const TYPE_CHANGED: u8 = 1;

/// Tag of a removed entry.
pub const TYPE_REMOVED: u8 = 2;

/// Tag that terminates the update log.
pub const TYPE_STOP: u8 = 0xFF;

// Temp file naming

/// Suffix of the scan block file.
pub const SCAN_FILE_SUFFIX: &str = ".scan";

/// Suffix of the external update log.
pub const UPDATES_FILE_SUFFIX: &str = ".updates";

/// Suffix of the file a merge pass writes before it replaces the block file.
pub const MERGE_FILE_SUFFIX: &str = ".merge";
