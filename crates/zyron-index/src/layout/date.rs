//! Fixed-size layout over a single date column.
//!
//! Key layout (16 bytes):
//! - entity_id: 8 bytes
//! - epoch_day: 8 bytes

use super::{check_remaining, read_null_value, IdSemantics, Layout, NullValue};
use crate::key::{check_value_count, IndexKey, ENTITY_ID_SIZE, HIGHEST_ENTITY_ID, LOWEST_ENTITY_ID};
use crate::state::Inclusion;
use crate::temporal;
use crate::value::Value;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ZyronError};

/// Key of a single date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateKey {
    pub entity_id: i64,
    pub compare_id: bool,
    pub epoch_day: i64,
    pub inclusion: Inclusion,
}

impl DateKey {
    /// Encoded key size.
    pub const SIZE: usize = ENTITY_ID_SIZE + 8;

    pub fn compare_value_to(&self, other: &DateKey) -> Ordering {
        self.epoch_day
            .cmp(&other.epoch_day)
            .then_with(|| self.inclusion.cmp(&other.inclusion))
    }
}

impl IndexKey for DateKey {
    fn entity_id(&self) -> i64 {
        self.entity_id
    }

    fn set_entity_id(&mut self, entity_id: i64) {
        self.entity_id = entity_id;
    }

    fn compare_id(&self) -> bool {
        self.compare_id
    }

    fn set_compare_id(&mut self, compare_id: bool) {
        self.compare_id = compare_id;
    }

    fn initialize_from_values(&mut self, entity_id: i64, values: &[Value]) -> Result<()> {
        check_value_count(1, values)?;
        let date = match &values[0] {
            Value::Date(d) => *d,
            other => {
                return Err(ZyronError::TypeMismatch {
                    expected: "DATE".to_string(),
                    actual: other.type_name().to_string(),
                })
            }
        };
        *self = DateKey {
            entity_id,
            compare_id: false,
            epoch_day: temporal::epoch_day(date),
            inclusion: Inclusion::Neutral,
        };
        Ok(())
    }

    fn as_values(&self) -> Result<Vec<Value>> {
        let date = temporal::date_from_epoch_day(self.epoch_day).ok_or_else(|| {
            ZyronError::KeyCorrupted {
                reason: format!("epoch day {} is out of range", self.epoch_day),
            }
        })?;
        Ok(vec![Value::Date(date)])
    }
}

/// Layout of [`DateKey`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLayout {
    semantics: IdSemantics,
}

impl DateLayout {
    pub fn new(semantics: IdSemantics) -> Self {
        Self { semantics }
    }
}

impl Layout for DateLayout {
    type Key = DateKey;
    type Value = NullValue;

    fn new_key(&self) -> DateKey {
        DateKey::default()
    }

    fn semantics(&self) -> IdSemantics {
        self.semantics
    }

    fn compare_value(&self, a: &DateKey, b: &DateKey) -> Ordering {
        a.compare_value_to(b)
    }

    fn key_size(&self, _key: &DateKey) -> usize {
        DateKey::SIZE
    }

    fn value_size(&self, _value: &NullValue) -> usize {
        NullValue::SIZE
    }

    fn write_key<B: BufMut>(&self, buf: &mut B, key: &DateKey) {
        buf.put_i64_le(key.entity_id);
        buf.put_i64_le(key.epoch_day);
    }

    fn read_key<B: Buf>(&self, buf: &mut B, key: &mut DateKey, size: usize) -> Result<()> {
        check_remaining(buf, size)?;
        if size != DateKey::SIZE {
            return Err(ZyronError::KeyCorrupted {
                reason: format!("date key of {} bytes, expected {}", size, DateKey::SIZE),
            });
        }
        *key = DateKey {
            entity_id: buf.get_i64_le(),
            compare_id: false,
            epoch_day: buf.get_i64_le(),
            inclusion: Inclusion::Neutral,
        };
        Ok(())
    }

    fn write_value<B: BufMut>(&self, _buf: &mut B, _value: &NullValue) {}

    fn read_value<B: Buf>(&self, _buf: &mut B, _value: &mut NullValue, size: usize) -> Result<()> {
        read_null_value(size)
    }

    fn copy_key(&self, from: &DateKey, into: &mut DateKey) {
        *into = *from;
    }

    fn minimal_splitter(&self, left: &DateKey, right: &DateKey, into: &mut DateKey) {
        *into = *right;
        if left.compare_value_to(right) == Ordering::Equal {
            into.compare_id = true;
        } else {
            into.entity_id = LOWEST_ENTITY_ID;
            into.compare_id = false;
        }
    }

    fn initialize_as_lowest(&self, key: &mut DateKey) {
        *key = DateKey {
            entity_id: LOWEST_ENTITY_ID,
            compare_id: false,
            epoch_day: i64::MIN,
            inclusion: Inclusion::Low,
        };
    }

    fn initialize_as_highest(&self, key: &mut DateKey) {
        *key = DateKey {
            entity_id: HIGHEST_ENTITY_ID,
            compare_id: false,
            epoch_day: i64::MAX,
            inclusion: Inclusion::High,
        };
    }

    fn fixed_size(&self) -> bool {
        true
    }
}
