//! Fixed-size layout over a single number column.
//!
//! Key layout (17 bytes):
//! - entity_id: 8 bytes
//! - number_kind: 1 byte
//! - raw_bits: 8 bytes, sign-extended

use super::{check_remaining, read_null_value, IdSemantics, Layout, NullValue};
use crate::key::{check_value_count, IndexKey, ENTITY_ID_SIZE, HIGHEST_ENTITY_ID, LOWEST_ENTITY_ID};
use crate::number::{NumberKind, RawNumber};
use crate::state::Inclusion;
use crate::value::Value;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ZyronError};

/// Key of a single number column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberKey {
    pub entity_id: i64,
    pub compare_id: bool,
    pub number: RawNumber,
    pub inclusion: Inclusion,
}

impl NumberKey {
    /// Encoded key size.
    pub const SIZE: usize = ENTITY_ID_SIZE + 1 + 8;

    /// Orders by number with the two-stage compare, then by inclusion.
    pub fn compare_value_to(&self, other: &NumberKey) -> Ordering {
        self.number
            .compare_lossy_then_exact(other.number)
            .then_with(|| self.inclusion.cmp(&other.inclusion))
    }
}

impl Default for NumberKey {
    fn default() -> Self {
        Self {
            entity_id: 0,
            compare_id: false,
            number: RawNumber::from_i64(0),
            inclusion: Inclusion::Neutral,
        }
    }
}

impl IndexKey for NumberKey {
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
        let number = RawNumber::from_value(&values[0]).ok_or_else(|| ZyronError::TypeMismatch {
            expected: "NUMBER".to_string(),
            actual: values[0].type_name().to_string(),
        })?;
        *self = NumberKey {
            entity_id,
            compare_id: false,
            number,
            inclusion: Inclusion::Neutral,
        };
        Ok(())
    }

    fn as_values(&self) -> Result<Vec<Value>> {
        Ok(vec![self.number.to_value()])
    }
}

/// Layout of [`NumberKey`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberLayout {
    semantics: IdSemantics,
}

impl NumberLayout {
    pub fn new(semantics: IdSemantics) -> Self {
        Self { semantics }
    }
}

impl Layout for NumberLayout {
    type Key = NumberKey;
    type Value = NullValue;

    fn new_key(&self) -> NumberKey {
        NumberKey::default()
    }

    fn semantics(&self) -> IdSemantics {
        self.semantics
    }

    fn compare_value(&self, a: &NumberKey, b: &NumberKey) -> Ordering {
        a.compare_value_to(b)
    }

    fn key_size(&self, _key: &NumberKey) -> usize {
        NumberKey::SIZE
    }

    fn value_size(&self, _value: &NullValue) -> usize {
        NullValue::SIZE
    }

    fn write_key<B: BufMut>(&self, buf: &mut B, key: &NumberKey) {
        buf.put_i64_le(key.entity_id);
        buf.put_u8(key.number.kind as u8);
        buf.put_i64_le(key.number.bits);
    }

    fn read_key<B: Buf>(&self, buf: &mut B, key: &mut NumberKey, size: usize) -> Result<()> {
        check_remaining(buf, size)?;
        if size != NumberKey::SIZE {
            return Err(ZyronError::KeyCorrupted {
                reason: format!("number key of {} bytes, expected {}", size, NumberKey::SIZE),
            });
        }
        let entity_id = buf.get_i64_le();
        let tag = buf.get_u8();
        let kind = NumberKind::from_u8(tag).ok_or_else(|| ZyronError::KeyCorrupted {
            reason: format!("unknown number kind {}", tag),
        })?;
        *key = NumberKey {
            entity_id,
            compare_id: false,
            number: RawNumber::new(buf.get_i64_le(), kind),
            inclusion: Inclusion::Neutral,
        };
        Ok(())
    }

    fn write_value<B: BufMut>(&self, _buf: &mut B, _value: &NullValue) {}

    fn read_value<B: Buf>(&self, _buf: &mut B, _value: &mut NullValue, size: usize) -> Result<()> {
        read_null_value(size)
    }

    fn copy_key(&self, from: &NumberKey, into: &mut NumberKey) {
        *into = *from;
    }

    fn minimal_splitter(&self, left: &NumberKey, right: &NumberKey, into: &mut NumberKey) {
        *into = *right;
        if left.compare_value_to(right) == Ordering::Equal {
            into.compare_id = true;
        } else {
            into.entity_id = LOWEST_ENTITY_ID;
            into.compare_id = false;
        }
    }

    fn initialize_as_lowest(&self, key: &mut NumberKey) {
        *key = NumberKey {
            entity_id: LOWEST_ENTITY_ID,
            compare_id: false,
            number: RawNumber::from_f64(f64::NEG_INFINITY),
            inclusion: Inclusion::Low,
        };
    }

    fn initialize_as_highest(&self, key: &mut NumberKey) {
        *key = NumberKey {
            entity_id: HIGHEST_ENTITY_ID,
            compare_id: false,
            number: RawNumber::from_f64(f64::NAN),
            inclusion: Inclusion::High,
        };
    }

    fn fixed_size(&self) -> bool {
        true
    }
}
