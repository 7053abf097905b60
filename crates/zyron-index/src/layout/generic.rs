//! Layout over composite keys of any value types.

use super::{check_remaining, read_null_value, IdSemantics, Layout, NullValue};
use crate::key::GenericKey;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ZyronError};

/// Layout of [`GenericKey`]s with a fixed number of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericLayout {
    slots: usize,
    semantics: IdSemantics,
}

impl GenericLayout {
    pub fn new(slots: usize, semantics: IdSemantics) -> Self {
        Self { slots, semantics }
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }
}

impl Layout for GenericLayout {
    type Key = GenericKey;
    type Value = NullValue;

    fn new_key(&self) -> GenericKey {
        GenericKey::new(self.slots)
    }

    fn semantics(&self) -> IdSemantics {
        self.semantics
    }

    fn compare_value(&self, a: &GenericKey, b: &GenericKey) -> Ordering {
        a.compare_value_to(b)
    }

    fn key_size(&self, key: &GenericKey) -> usize {
        key.size()
    }

    fn value_size(&self, _value: &NullValue) -> usize {
        NullValue::SIZE
    }

    fn write_key<B: BufMut>(&self, buf: &mut B, key: &GenericKey) {
        key.put(buf);
    }

    fn read_key<B: Buf>(&self, buf: &mut B, key: &mut GenericKey, size: usize) -> Result<()> {
        check_remaining(buf, size)?;
        if !key.read(buf, size) {
            return Err(ZyronError::KeyCorrupted {
                reason: format!("{}-column key of {} bytes failed to decode", self.slots, size),
            });
        }
        Ok(())
    }

    fn write_value<B: BufMut>(&self, _buf: &mut B, _value: &NullValue) {}

    fn read_value<B: Buf>(&self, _buf: &mut B, _value: &mut NullValue, size: usize) -> Result<()> {
        read_null_value(size)
    }

    fn copy_key(&self, from: &GenericKey, into: &mut GenericKey) {
        into.copy_from(from);
    }

    fn minimal_splitter(&self, left: &GenericKey, right: &GenericKey, into: &mut GenericKey) {
        GenericKey::minimal_splitter(left, right, into);
    }

    fn initialize_as_lowest(&self, key: &mut GenericKey) {
        key.initialize_as_lowest();
    }

    fn initialize_as_highest(&self, key: &mut GenericKey) {
        key.initialize_as_highest();
    }

    fn fixed_size(&self) -> bool {
        false
    }
}
