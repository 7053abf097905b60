//! Configuration structures for index population.

use crate::error::{Result, ZyronError};
use crate::page::MAX_ENTRY_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for block-based index population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Directory for temporary block and update log files.
    pub temp_dir: PathBuf,
    /// Size threshold in bytes for one in-memory block before it is sorted and flushed.
    pub block_size: usize,
    /// Number of blocks merged together in one merge pass.
    pub merge_factor: usize,
    /// Read buffer size per block entry reader.
    pub read_buffer_size: usize,
    /// Enable fsync of temporary files after writing.
    pub fsync_enabled: bool,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            block_size: 1024 * 1024, // 1 MB
            merge_factor: 8,
            read_buffer_size: 64 * 1024, // 64 KB
            fsync_enabled: false,
        }
    }
}

impl PopulationConfig {
    /// Smallest block size that still holds one maximum-sized entry.
    pub const MIN_BLOCK_SIZE: usize = MAX_ENTRY_SIZE;

    /// Checks that the configuration can drive a population.
    pub fn validate(&self) -> Result<()> {
        if self.merge_factor < 2 {
            return Err(ZyronError::InvalidParameter {
                name: "merge_factor".to_string(),
                value: self.merge_factor.to_string(),
            });
        }
        if self.block_size < Self::MIN_BLOCK_SIZE {
            return Err(ZyronError::InvalidParameter {
                name: "block_size".to_string(),
                value: self.block_size.to_string(),
            });
        }
        if self.read_buffer_size == 0 {
            return Err(ZyronError::InvalidParameter {
                name: "read_buffer_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ZyronError::ConfigError("temp_dir is empty".to_string()));
        }
        Ok(())
    }
}
