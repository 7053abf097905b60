//! ZyronDB common types, errors, and utilities for the index crates.
//!
//! This crate provides shared definitions used across all ZyronDB index components.

pub mod config;
pub mod error;
pub mod page;
pub mod types;

pub use config::PopulationConfig;
pub use error::{Result, ZyronError};
pub use page::{BIGGEST_REASONABLE_ARRAY_LENGTH, MAX_ENTRY_SIZE, PAGE_SIZE};
pub use types::ValueGroup;
