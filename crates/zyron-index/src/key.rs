//! Index keys.
//!
//! Key layout:
//! ```text
//! +--------------------+
//! | entity_id: i64 LE  |
//! +--------------------+
//! | slot 0             |  [type_id][value]
//! | slot 1             |
//! | ...                |
//! +--------------------+
//! ```

use crate::state::{Inclusion, KeySlot};
use crate::value::Value;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ValueGroup, ZyronError};

/// Size of the entity id prefix of every key.
pub const ENTITY_ID_SIZE: usize = 8;

/// Entity id of lower bound keys.
pub const LOWEST_ENTITY_ID: i64 = i64::MIN;

/// Entity id of upper bound keys.
pub const HIGHEST_ENTITY_ID: i64 = i64::MAX;

/// Operations shared by every key kind a layout can produce.
pub trait IndexKey: Send {
    fn entity_id(&self) -> i64;

    fn set_entity_id(&mut self, entity_id: i64);

    /// Returns true if the entity id takes part in ordering.
    fn compare_id(&self) -> bool;

    fn set_compare_id(&mut self, compare_id: bool);

    /// Encodes one value per column and sets the entity id.
    fn initialize_from_values(&mut self, entity_id: i64, values: &[Value]) -> Result<()>;

    /// Materializes all column values.
    fn as_values(&self) -> Result<Vec<Value>>;
}

/// Checks that exactly `expected` values were supplied for a key.
pub(crate) fn check_value_count(expected: usize, values: &[Value]) -> Result<()> {
    if values.len() != expected {
        return Err(ZyronError::InvalidParameter {
            name: "values".to_string(),
            value: format!("{} values for {} key columns", values.len(), expected),
        });
    }
    Ok(())
}

/// Composite key with one [`KeySlot`] per indexed column.
#[derive(Debug, Clone)]
pub struct GenericKey {
    entity_id: i64,
    compare_id: bool,
    slots: Vec<KeySlot>,
}

impl GenericKey {
    /// Creates a key with `slot_count` cleared slots.
    pub fn new(slot_count: usize) -> Self {
        Self {
            entity_id: 0,
            compare_id: false,
            slots: (0..slot_count).map(|_| KeySlot::new()).collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> &KeySlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut KeySlot {
        &mut self.slots[index]
    }

    /// Resets the entity id and clears every slot.
    pub fn initialize(&mut self, entity_id: i64) {
        self.entity_id = entity_id;
        self.compare_id = false;
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Encodes `value` into one slot.
    pub fn init_from_value(
        &mut self,
        slot: usize,
        value: &Value,
        inclusion: Inclusion,
    ) -> Result<()> {
        self.slots[slot].write_value(value, inclusion)
    }

    /// Lower bound of the whole index.
    pub fn initialize_as_lowest(&mut self) {
        self.initialize(LOWEST_ENTITY_ID);
        for slot in &mut self.slots {
            slot.init_value_as_lowest(ValueGroup::Unknown);
        }
    }

    /// Upper bound of the whole index.
    pub fn initialize_as_highest(&mut self) {
        self.initialize(HIGHEST_ENTITY_ID);
        for slot in &mut self.slots {
            slot.init_value_as_highest(ValueGroup::Unknown);
        }
    }

    /// Orders keys by column values only.
    pub fn compare_value_to(&self, other: &GenericKey) -> Ordering {
        self.slots
            .iter()
            .zip(&other.slots)
            .map(|(a, b)| a.compare_value_to(b))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Copies entity id, compare flag and every slot from `other`.
    pub fn copy_from(&mut self, other: &GenericKey) {
        self.entity_id = other.entity_id;
        self.compare_id = other.compare_id;
        self.slots.resize_with(other.slots.len(), KeySlot::new);
        for (to, from) in self.slots.iter_mut().zip(&other.slots) {
            to.copy_from(from);
        }
    }

    /// Encoded size of the key.
    pub fn size(&self) -> usize {
        ENTITY_ID_SIZE + self.slots.iter().map(KeySlot::size).sum::<usize>()
    }

    pub fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64_le(self.entity_id);
        for slot in &self.slots {
            slot.put(buf);
        }
    }

    /// Reads a key of exactly `size` bytes. The caller guarantees that
    /// `size` bytes remain in `buf`.
    pub fn read<B: Buf>(&mut self, buf: &mut B, size: usize) -> bool {
        self.compare_id = false;
        if size < ENTITY_ID_SIZE {
            for slot in &mut self.slots {
                slot.clear();
            }
            return false;
        }
        self.entity_id = buf.get_i64_le();
        let mut budget = size - ENTITY_ID_SIZE;
        for slot in &mut self.slots {
            if !slot.read(buf, &mut budget) {
                return false;
            }
        }
        budget == 0
    }

    /// Writes into `into` the shortest key that sorts after `left` and not
    /// after `right`.
    ///
    /// When the values differ only the columns up to the first difference
    /// matter, so later columns become lowest and the entity id is dropped.
    /// When the values are equal the entity id of `right` is the only
    /// separator and is kept.
    pub fn minimal_splitter(left: &GenericKey, right: &GenericKey, into: &mut GenericKey) {
        into.slots.resize_with(right.slots.len(), KeySlot::new);
        let mut differed = false;
        for (i, target) in into.slots.iter_mut().enumerate() {
            let (l, r) = (&left.slots[i], &right.slots[i]);
            if differed {
                target.init_value_as_lowest(ValueGroup::Unknown);
            } else if l.compare_value_to(r) == Ordering::Equal {
                target.copy_from(r);
            } else {
                target.minimal_splitter(l, r);
                differed = true;
            }
        }
        if differed {
            into.entity_id = LOWEST_ENTITY_ID;
            into.compare_id = false;
        } else {
            into.entity_id = right.entity_id;
            into.compare_id = true;
        }
    }
}

impl IndexKey for GenericKey {
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
        check_value_count(self.slots.len(), values)?;
        self.initialize(entity_id);
        for (slot, value) in self.slots.iter_mut().zip(values) {
            slot.write_value(value, Inclusion::Neutral)?;
        }
        Ok(())
    }

    fn as_values(&self) -> Result<Vec<Value>> {
        self.slots.iter().map(KeySlot::as_value).collect()
    }
}
