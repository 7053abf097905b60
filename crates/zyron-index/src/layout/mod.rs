//! Index layouts.
//!
//! A layout binds the key encoding, the comparator and the entity id
//! policy of one index. Layouts are immutable and shared across threads;
//! keys and values they create are scratch objects owned by one caller.

mod date;
mod generic;
mod number;

pub use date::{DateKey, DateLayout};
pub use generic::GenericLayout;
pub use number::{NumberKey, NumberLayout};

use crate::key::IndexKey;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ZyronError};

/// How entity ids take part in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSemantics {
    /// One entity per value. Ids break ties only when a key asks for it.
    Unique,
    /// Many entities per value. Ids always break ties.
    NonUnique,
}

impl IdSemantics {
    /// Compares entity ids of two keys with equal values.
    pub fn compare_ids<K: IndexKey>(self, a: &K, b: &K) -> Ordering {
        match self {
            IdSemantics::Unique if !a.compare_id() && !b.compare_id() => Ordering::Equal,
            _ => a.entity_id().cmp(&b.entity_id()),
        }
    }
}

impl std::fmt::Display for IdSemantics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdSemantics::Unique => write!(f, "UNIQUE"),
            IdSemantics::NonUnique => write!(f, "NON_UNIQUE"),
        }
    }
}

/// Empty index value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NullValue;

impl NullValue {
    pub const SIZE: usize = 0;
}

/// Key encoding and comparator contract consumed by the tree engine and
/// the population pipeline.
pub trait Layout: Send + Sync {
    type Key: IndexKey;
    type Value: Clone + Default + Send;

    fn new_key(&self) -> Self::Key;

    fn new_value(&self) -> Self::Value {
        Self::Value::default()
    }

    fn semantics(&self) -> IdSemantics;

    /// Orders keys by value only.
    fn compare_value(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Full key order: values, then entity ids per [`IdSemantics`].
    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        match self.compare_value(a, b) {
            Ordering::Equal => self.semantics().compare_ids(a, b),
            ord => ord,
        }
    }

    fn key_size(&self, key: &Self::Key) -> usize;

    fn value_size(&self, value: &Self::Value) -> usize;

    fn write_key<B: BufMut>(&self, buf: &mut B, key: &Self::Key);

    /// Reads a key of `size` bytes. Fails with `KeyCorrupted` if `size`
    /// exceeds the remaining bytes or does not match the decoded key.
    fn read_key<B: Buf>(&self, buf: &mut B, key: &mut Self::Key, size: usize) -> Result<()>;

    fn write_value<B: BufMut>(&self, buf: &mut B, value: &Self::Value);

    fn read_value<B: Buf>(&self, buf: &mut B, value: &mut Self::Value, size: usize) -> Result<()>;

    fn copy_key(&self, from: &Self::Key, into: &mut Self::Key);

    /// Writes into `into` the shortest key that sorts after `left` and not
    /// after `right`.
    fn minimal_splitter(&self, left: &Self::Key, right: &Self::Key, into: &mut Self::Key);

    fn initialize_as_lowest(&self, key: &mut Self::Key);

    fn initialize_as_highest(&self, key: &mut Self::Key);

    /// Returns true if every key has the same encoded size.
    fn fixed_size(&self) -> bool;
}

/// Fails unless `size` bytes remain in `buf`.
pub(crate) fn check_remaining<B: Buf>(buf: &B, size: usize) -> Result<()> {
    if size > buf.remaining() {
        return Err(ZyronError::KeyCorrupted {
            reason: format!("declared size {} exceeds {} remaining bytes", size, buf.remaining()),
        });
    }
    Ok(())
}

/// Reads a value of [`NullValue::SIZE`] bytes.
pub(crate) fn read_null_value(size: usize) -> Result<()> {
    if size != NullValue::SIZE {
        return Err(ZyronError::KeyCorrupted {
            reason: format!("value size {} for an empty value", size),
        });
    }
    Ok(())
}
