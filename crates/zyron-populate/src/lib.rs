//! Index population for ZyronDB.
//!
//! This crate provides:
//! - Sorted block storage in temp files with multi-pass merging
//! - Block readers and a k-way merging cursor
//! - The external update log replayed after a scan
//! - The block-based populator that drives a tree build

pub mod block;
pub mod constants;
pub mod entry;
pub mod merge;
pub mod populator;
pub mod reader;
pub mod update;

pub use block::{BlockStorage, BlockStorageStats};
pub use merge::MergingBlockEntryReader;
pub use populator::{BlockBasedPopulator, IndexSample, ValueIndexUpdate};
pub use reader::{BlockEntryCursor, BlockEntryReader, BlockReader};
pub use update::{IndexUpdateCursor, IndexUpdateStorage, UpdateMode};
