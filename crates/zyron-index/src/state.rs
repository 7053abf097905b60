//! Per-column key state.
//!
//! A [`KeySlot`] holds one column of a composite key: the active [`Type`],
//! the inclusion marker used by range bounds, and scratch storage for the
//! encoded value. Scratch buffers survive [`KeySlot::clear`] and array
//! buffers only ever grow, so a key reused across millions of entries
//! stops allocating once it has seen the widest value.

use crate::number::{NumberKind, RawNumber};
use crate::types::{
    take, Element, ElementKind, Type, SIZE_ARRAY_LENGTH, SIZE_NUMBER_KIND, SIZE_STRING_LENGTH,
    TYPE_ID_SIZE,
};
use crate::value::Value;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use zyron_common::{Result, ValueGroup, ZyronError, BIGGEST_REASONABLE_ARRAY_LENGTH};

/// Tie-break marker for slots holding equal values.
///
/// Real values are NEUTRAL. Range bounds use LOW or HIGH to sort just
/// before or just after every entry holding the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Inclusion {
    Low,
    #[default]
    Neutral,
    High,
}

/// Array staging storage. `len` is the logical length; the vectors are the
/// capacity and never shrink.
#[derive(Debug, Clone, Default)]
struct ArrayBuffer {
    len: usize,
    highest: bool,
    number_kind: Option<NumberKind>,
    elements: Vec<Element>,
    texts: Vec<Vec<u8>>,
}

impl ArrayBuffer {
    fn reset(&mut self) {
        self.len = 0;
        self.highest = false;
        self.number_kind = None;
    }

    fn ensure_capacity(&mut self, kind: ElementKind, len: usize) {
        if kind == ElementKind::Text {
            if self.texts.len() < len {
                self.texts.resize_with(len, Vec::new);
            }
        } else if self.elements.len() < len {
            self.elements.resize(len, Element::Empty);
        }
    }

    fn capacity(&self) -> usize {
        self.elements.len().max(self.texts.len())
    }
}

/// One column of a composite key.
#[derive(Debug, Clone, Default)]
pub struct KeySlot {
    ty: Option<Type>,
    inclusion: Inclusion,
    scalar: Element,
    text: Vec<u8>,
    text_ignore_length: bool,
    text_highest: bool,
    array: ArrayBuffer,
}

impl KeySlot {
    /// Creates an empty slot holding no value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active type, or None for a cleared slot.
    pub fn value_type(&self) -> Option<Type> {
        self.ty
    }

    pub fn inclusion(&self) -> Inclusion {
        self.inclusion
    }

    /// Array capacity in elements. Never decreases.
    pub fn capacity(&self) -> usize {
        self.array.capacity()
    }

    /// Removes the value, keeping allocated buffers.
    pub fn clear(&mut self) {
        self.ty = None;
        self.inclusion = Inclusion::Neutral;
        self.scalar = Element::Empty;
        self.text.clear();
        self.text_ignore_length = false;
        self.text_highest = false;
        self.array.reset();
    }

    /// Encodes a value into this slot.
    ///
    /// Points are accepted by clients but have no encoding, and text longer
    /// than a u16 length prefix cannot be stored.
    pub fn write_value(&mut self, value: &Value, inclusion: Inclusion) -> Result<()> {
        self.clear();
        match value {
            Value::Text(s) => {
                check_text_len(s)?;
                self.ty = Some(Type::Text);
                self.text.extend_from_slice(s.as_bytes());
            }
            Value::TextArray(items) => {
                for s in items {
                    check_text_len(s)?;
                }
                self.initialize_array(items.len(), Type::TextArray);
                for (target, s) in self.array.texts.iter_mut().zip(items) {
                    target.clear();
                    target.extend_from_slice(s.as_bytes());
                }
            }
            Value::Point(_) | Value::PointArray(_) => {
                return Err(ZyronError::UnsupportedType(value.type_name().to_string()));
            }
            Value::BooleanArray(v) => {
                self.stage(Type::BooleanArray, None, v, |b| Element::Boolean(*b))
            }
            Value::ByteArray(v) => self.stage(Type::NumberArray, Some(NumberKind::Byte), v, |x| {
                Element::Number(RawNumber::new(*x as i64, NumberKind::Byte))
            }),
            Value::ShortArray(v) => {
                self.stage(Type::NumberArray, Some(NumberKind::Short), v, |x| {
                    Element::Number(RawNumber::new(*x as i64, NumberKind::Short))
                })
            }
            Value::IntArray(v) => self.stage(Type::NumberArray, Some(NumberKind::Int), v, |x| {
                Element::Number(RawNumber::new(*x as i64, NumberKind::Int))
            }),
            Value::LongArray(v) => self.stage(Type::NumberArray, Some(NumberKind::Long), v, |x| {
                Element::Number(RawNumber::from_i64(*x))
            }),
            Value::FloatArray(v) => {
                self.stage(Type::NumberArray, Some(NumberKind::Float), v, |x| {
                    Element::Number(RawNumber::new(x.to_bits() as i32 as i64, NumberKind::Float))
                })
            }
            Value::DoubleArray(v) => {
                self.stage(Type::NumberArray, Some(NumberKind::Double), v, |x| {
                    Element::Number(RawNumber::from_f64(*x))
                })
            }
            Value::DateArray(v) => self.stage(Type::DateArray, None, v, Element::date),
            Value::LocalTimeArray(v) => {
                self.stage(Type::LocalTimeArray, None, v, Element::local_time)
            }
            Value::LocalDateTimeArray(v) => {
                self.stage(Type::LocalDateTimeArray, None, v, Element::local_date_time)
            }
            Value::ZonedTimeArray(v) => {
                self.stage(Type::ZonedTimeArray, None, v, Element::zoned_time)
            }
            Value::ZonedDateTimeArray(v) => {
                self.stage(Type::ZonedDateTimeArray, None, v, Element::zoned_date_time)
            }
            Value::DurationArray(v) => self.stage(Type::DurationArray, None, v, Element::duration),
            scalar => {
                let (kind, element) = Element::from_scalar(scalar)
                    .ok_or_else(|| ZyronError::UnsupportedType(scalar.type_name().to_string()))?;
                self.ty = Some(kind.scalar_type());
                self.scalar = element;
            }
        }
        self.inclusion = inclusion;
        Ok(())
    }

    fn stage<T>(
        &mut self,
        array_type: Type,
        number_kind: Option<NumberKind>,
        items: &[T],
        encode: impl Fn(&T) -> Element,
    ) {
        self.initialize_array(items.len(), array_type);
        self.array.number_kind = number_kind;
        for (target, item) in self.array.elements.iter_mut().zip(items) {
            *target = encode(item);
        }
    }

    /// Prepares the slot for `len` elements of `array_type`, growing the
    /// backing storage if needed. Elements are then written one at a time
    /// with [`KeySlot::write_array_element`].
    pub fn initialize_array(&mut self, len: usize, array_type: Type) {
        debug_assert!(array_type.is_array(), "{} is not an array type", array_type);
        self.clear();
        self.ty = Some(array_type);
        self.array.len = len;
        self.array.ensure_capacity(array_type.element_kind(), len);
    }

    /// Writes one element of an array staged by [`KeySlot::initialize_array`].
    ///
    /// The first number element fixes the number kind of the whole array.
    ///
    /// # Panics
    ///
    /// Panics if no array is staged or `offset` is outside its length.
    pub fn write_array_element(&mut self, offset: usize, value: &Value) -> Result<()> {
        let array_type = match self.ty {
            Some(t) if t.is_array() && offset < self.array.len => t,
            _ => panic!(
                "array element {} written outside staged array (type {:?}, length {})",
                offset, self.ty, self.array.len
            ),
        };
        let mismatch = || ZyronError::TypeMismatch {
            expected: array_type.element_kind().scalar_type().to_string(),
            actual: value.type_name().to_string(),
        };

        let kind = array_type.element_kind();
        if kind == ElementKind::Text {
            let s = value.as_text().ok_or_else(mismatch)?;
            check_text_len(s)?;
            let target = &mut self.array.texts[offset];
            target.clear();
            target.extend_from_slice(s.as_bytes());
            return Ok(());
        }

        let (value_kind, element) = Element::from_scalar(value).ok_or_else(mismatch)?;
        if value_kind != kind {
            return Err(mismatch());
        }
        if let Element::Number(n) = element {
            match self.array.number_kind {
                None => self.array.number_kind = Some(n.kind),
                Some(k) if k != n.kind => {
                    return Err(ZyronError::TypeMismatch {
                        expected: format!("{:?}", k).to_uppercase(),
                        actual: value.type_name().to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        self.array.elements[offset] = element;
        Ok(())
    }

    /// Sets the lowest possible value of `group`. Wildcard groups produce a
    /// bound below every type.
    pub fn init_value_as_lowest(&mut self, group: ValueGroup) {
        Type::lowest_by_value_group(group).init_lowest(self);
    }

    /// Sets the highest possible value of `group`. Wildcard groups produce a
    /// bound above every type.
    pub fn init_value_as_highest(&mut self, group: ValueGroup) {
        Type::highest_by_value_group(group).init_highest(self);
    }

    /// Lower bound of all text starting with `prefix`.
    pub fn init_as_prefix_low(&mut self, prefix: &str) -> Result<()> {
        self.write_value(&Value::Text(prefix.to_string()), Inclusion::Low)?;
        self.text_ignore_length = true;
        Ok(())
    }

    /// Upper bound of all text starting with `prefix`.
    pub fn init_as_prefix_high(&mut self, prefix: &str) -> Result<()> {
        self.write_value(&Value::Text(prefix.to_string()), Inclusion::High)?;
        self.text_ignore_length = true;
        Ok(())
    }

    /// Orders two slots by value, then by inclusion.
    pub fn compare_value_to(&self, other: &KeySlot) -> Ordering {
        let (a, b) = match (self.ty, other.ty) {
            (Some(a), Some(b)) => (a, b),
            (None, None) => return self.inclusion.cmp(&other.inclusion),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        };
        a.compare_order(b)
            .then_with(|| a.compare_value(self, other))
            .then_with(|| self.inclusion.cmp(&other.inclusion))
    }

    /// Compares like [`KeySlot::compare_value_to`], but fails when both
    /// slots hold the same placeholder value with nothing else to order
    /// them by.
    pub fn try_compare_value_to(&self, other: &KeySlot) -> Result<Ordering> {
        if let (Some(a), Some(b)) = (self.ty, other.ty) {
            if a == b && a.is_placeholder() && self.inclusion == other.inclusion {
                return Err(ZyronError::UnsupportedOperation(format!(
                    "comparing two {} values",
                    a
                )));
            }
        }
        Ok(self.compare_value_to(other))
    }

    /// Copies `other` into this slot, growing array storage if needed.
    pub fn copy_from(&mut self, other: &KeySlot) {
        self.clear();
        self.ty = other.ty;
        self.inclusion = other.inclusion;
        if let Some(ty) = other.ty {
            ty.copy_value(self, other);
        }
    }

    /// Encoded size including the type id. Zero for a cleared slot.
    pub fn size(&self) -> usize {
        match self.ty {
            Some(ty) => TYPE_ID_SIZE + ty.value_size(self),
            None => 0,
        }
    }

    /// Encoded size of the value, excluding the type id.
    pub fn value_size(&self) -> usize {
        self.ty.map(|ty| ty.value_size(self)).unwrap_or(0)
    }

    /// Writes type id and value. A cleared slot writes nothing.
    pub fn put<B: BufMut>(&self, buf: &mut B) {
        if let Some(ty) = self.ty {
            buf.put_u8(ty.type_id());
            ty.put_value(self, buf);
        }
    }

    /// Reads type id and value, consuming at most `budget` bytes.
    ///
    /// Returns false on an unknown type id, a value larger than the budget,
    /// or corrupt content. The slot is left cleared on failure.
    pub fn read<B: Buf>(&mut self, buf: &mut B, budget: &mut usize) -> bool {
        if take(budget, TYPE_ID_SIZE).is_none() {
            self.clear();
            return false;
        }
        match Type::from_type_id(buf.get_u8()) {
            Some(ty) => ty.read_value(self, buf, budget),
            None => {
                self.clear();
                false
            }
        }
    }

    /// Materializes the slot as a value.
    pub fn as_value(&self) -> Result<Value> {
        let ty = self
            .ty
            .ok_or_else(|| ZyronError::InvalidState("key slot holds no value".to_string()))?;
        ty.as_value(self)
    }

    /// Writes into `self` the shortest value that sorts after `left` and
    /// not after `right`.
    pub fn minimal_splitter(&mut self, left: &KeySlot, right: &KeySlot) {
        self.copy_from(right);
        if left.ty != right.ty || right.text_highest || right.array.highest {
            return;
        }
        match right.ty {
            Some(Type::Text) => {
                let len = first_difference(&left.text, &right.text);
                self.text.truncate(char_end(&right.text, len));
            }
            Some(ty) if ty.is_array() && !ty.is_placeholder() => {
                let common = left.array.len.min(right.array.len);
                let diff = (0..common)
                    .find(|&i| compare_element(left, right, ty, i) != Ordering::Equal)
                    .unwrap_or(common);
                self.array.len = (diff + 1).min(right.array.len);
            }
            _ => {}
        }
    }
}

fn check_text_len(s: &str) -> Result<()> {
    if s.len() > u16::MAX as usize {
        return Err(ZyronError::KeyTooLarge {
            size: s.len(),
            max: u16::MAX as usize,
        });
    }
    Ok(())
}

/// End of the UTF-8 character starting at byte `at`, clamped to the text.
fn char_end(text: &[u8], at: usize) -> usize {
    let mut end = (at + 1).min(text.len());
    while end < text.len() && (text[end] & 0xC0) == 0x80 {
        end += 1;
    }
    end
}

fn first_difference(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn compare_element(a: &KeySlot, b: &KeySlot, ty: Type, i: usize) -> Ordering {
    if ty == Type::TextArray {
        a.array.texts[i].cmp(&b.array.texts[i])
    } else {
        a.array.elements[i].compare(&b.array.elements[i])
    }
}

fn compare_text(a: &KeySlot, b: &KeySlot) -> Ordering {
    match (a.text_highest, b.text_highest) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let common = a.text.len().min(b.text.len());
    match a.text[..common].cmp(&b.text[..common]) {
        Ordering::Equal if a.text_ignore_length || b.text_ignore_length => Ordering::Equal,
        Ordering::Equal => a.text.len().cmp(&b.text.len()),
        ord => ord,
    }
}

fn compare_arrays(a: &KeySlot, b: &KeySlot, ty: Type) -> Ordering {
    match (a.array.highest, b.array.highest) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let common = a.array.len.min(b.array.len);
    (0..common)
        .map(|i| compare_element(a, b, ty, i))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| a.array.len.cmp(&b.array.len))
}

fn read_text_into<B: Buf>(buf: &mut B, budget: &mut usize, target: &mut Vec<u8>) -> Option<()> {
    take(budget, SIZE_STRING_LENGTH)?;
    let len = buf.get_u16_le() as usize;
    take(budget, len)?;
    target.clear();
    target.resize(len, 0);
    buf.copy_to_slice(target);
    Some(())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ZyronError::KeyCorrupted {
        reason: format!("text is not valid UTF-8: {}", e),
    })
}

fn collect<T>(elements: &[Element], extract: impl Fn(Value) -> Option<T>) -> Option<Vec<T>> {
    elements
        .iter()
        .map(|e| e.to_value().and_then(&extract))
        .collect()
}

// Per-type value contract. Every operation assumes the slot's active type
// is `self`; callers dispatch through the slot.
impl Type {
    /// Encoded value size, excluding the type id.
    pub fn value_size(self, slot: &KeySlot) -> usize {
        let array = &slot.array;
        match self {
            Type::Geometry | Type::GeometryArray => 0,
            Type::Text => SIZE_STRING_LENGTH + slot.text.len(),
            Type::Number => SIZE_NUMBER_KIND + slot.scalar.encoded_width(),
            Type::TextArray => {
                SIZE_ARRAY_LENGTH
                    + array.texts[..array.len]
                        .iter()
                        .map(|t| SIZE_STRING_LENGTH + t.len())
                        .sum::<usize>()
            }
            Type::NumberArray => {
                let width = array.number_kind.unwrap_or(NumberKind::Long).width();
                SIZE_NUMBER_KIND + SIZE_ARRAY_LENGTH + array.len * width
            }
            t if t.is_array() => {
                let width = t.element_kind().fixed_width().unwrap_or(0);
                SIZE_ARRAY_LENGTH + array.len * width
            }
            _ => slot.scalar.encoded_width(),
        }
    }

    /// Copies the value of `from` into `to`. Array storage of `to` grows to
    /// the source length and never shrinks.
    pub fn copy_value(self, to: &mut KeySlot, from: &KeySlot) {
        match self {
            Type::Text => {
                to.text.clear();
                to.text.extend_from_slice(&from.text);
                to.text_ignore_length = from.text_ignore_length;
                to.text_highest = from.text_highest;
            }
            t if t.is_array() => {
                let len = from.array.len;
                to.array.len = len;
                to.array.highest = from.array.highest;
                to.array.number_kind = from.array.number_kind;
                to.array.ensure_capacity(t.element_kind(), len);
                if t == Type::TextArray {
                    let sources = &from.array.texts[..len];
                    for (target, source) in to.array.texts.iter_mut().zip(sources) {
                        target.clear();
                        target.extend_from_slice(source);
                    }
                } else {
                    to.array.elements[..len].copy_from_slice(&from.array.elements[..len]);
                }
            }
            _ => to.scalar = from.scalar,
        }
    }

    /// Compares the values of two slots of this type.
    pub fn compare_value(self, left: &KeySlot, right: &KeySlot) -> Ordering {
        match self {
            Type::Geometry | Type::GeometryArray => Ordering::Equal,
            Type::Text => compare_text(left, right),
            t if t.is_array() => compare_arrays(left, right, t),
            _ => left.scalar.compare(&right.scalar),
        }
    }

    /// Writes the value of `slot`, excluding the type id.
    pub fn put_value<B: BufMut>(self, slot: &KeySlot, buf: &mut B) {
        let array = &slot.array;
        match self {
            Type::Geometry | Type::GeometryArray => {}
            Type::Text => {
                buf.put_u16_le(slot.text.len() as u16);
                buf.put_slice(&slot.text);
            }
            Type::Number => {
                if let Element::Number(n) = slot.scalar {
                    buf.put_u8(n.kind as u8);
                }
                slot.scalar.put(buf);
            }
            Type::TextArray => {
                buf.put_i32_le(array.len as i32);
                for text in &array.texts[..array.len] {
                    buf.put_u16_le(text.len() as u16);
                    buf.put_slice(text);
                }
            }
            t if t.is_array() => {
                if t == Type::NumberArray {
                    buf.put_u8(array.number_kind.unwrap_or(NumberKind::Long) as u8);
                }
                buf.put_i32_le(array.len as i32);
                for element in &array.elements[..array.len] {
                    element.put(buf);
                }
            }
            _ => slot.scalar.put(buf),
        }
    }

    /// Reads a value of this type into `slot`, consuming at most `budget`
    /// bytes. Returns false on size mismatch or corrupt content.
    pub fn read_value<B: Buf>(self, slot: &mut KeySlot, buf: &mut B, budget: &mut usize) -> bool {
        slot.clear();
        slot.ty = Some(self);
        let ok = self.read_payload(slot, buf, budget).is_some();
        if !ok {
            slot.clear();
        }
        ok
    }

    fn read_payload<B: Buf>(
        self,
        slot: &mut KeySlot,
        buf: &mut B,
        budget: &mut usize,
    ) -> Option<()> {
        let kind = self.element_kind();
        match self {
            Type::Geometry | Type::GeometryArray => return None,
            Type::Text => read_text_into(buf, budget, &mut slot.text)?,
            Type::Number => {
                take(budget, SIZE_NUMBER_KIND)?;
                let number_kind = NumberKind::from_u8(buf.get_u8())?;
                slot.scalar = Element::read(kind, number_kind, buf, budget)?;
            }
            t if t.is_array() => {
                let number_kind = if t == Type::NumberArray {
                    take(budget, SIZE_NUMBER_KIND)?;
                    Some(NumberKind::from_u8(buf.get_u8())?)
                } else {
                    None
                };
                take(budget, SIZE_ARRAY_LENGTH)?;
                let len = usize::try_from(buf.get_i32_le()).ok()?;
                if len > BIGGEST_REASONABLE_ARRAY_LENGTH {
                    return None;
                }
                slot.array.len = len;
                slot.array.number_kind = number_kind;
                slot.array.ensure_capacity(kind, len);
                if t == Type::TextArray {
                    for target in &mut slot.array.texts[..len] {
                        read_text_into(buf, budget, target)?;
                    }
                } else {
                    let number_kind = number_kind.unwrap_or(NumberKind::Long);
                    for target in &mut slot.array.elements[..len] {
                        *target = Element::read(kind, number_kind, buf, budget)?;
                    }
                }
            }
            _ => slot.scalar = Element::read(kind, NumberKind::Long, buf, budget)?,
        }
        Some(())
    }

    /// Materializes the value of `slot`.
    pub fn as_value(self, slot: &KeySlot) -> Result<Value> {
        let corrupt = || ZyronError::KeyCorrupted {
            reason: format!("stored {} value is out of range", self),
        };
        let array = &slot.array;
        let elements = &array.elements[..array.len.min(array.elements.len())];
        let value = match self {
            Type::Geometry | Type::GeometryArray => {
                return Err(ZyronError::UnsupportedOperation(format!(
                    "materializing a {} value",
                    self
                )));
            }
            Type::Text => Value::Text(utf8(&slot.text)?),
            Type::TextArray => Value::TextArray(
                array.texts[..array.len]
                    .iter()
                    .map(|t| utf8(t))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Type::NumberArray => match array.number_kind.unwrap_or(NumberKind::Long) {
                NumberKind::Byte => collect(elements, |v| match v {
                    Value::Byte(x) => Some(x),
                    _ => None,
                })
                .map(Value::ByteArray),
                NumberKind::Short => collect(elements, |v| match v {
                    Value::Short(x) => Some(x),
                    _ => None,
                })
                .map(Value::ShortArray),
                NumberKind::Int => collect(elements, |v| match v {
                    Value::Int(x) => Some(x),
                    _ => None,
                })
                .map(Value::IntArray),
                NumberKind::Long => collect(elements, |v| match v {
                    Value::Long(x) => Some(x),
                    _ => None,
                })
                .map(Value::LongArray),
                NumberKind::Float => collect(elements, |v| match v {
                    Value::Float(x) => Some(x),
                    _ => None,
                })
                .map(Value::FloatArray),
                NumberKind::Double => collect(elements, |v| match v {
                    Value::Double(x) => Some(x),
                    _ => None,
                })
                .map(Value::DoubleArray),
            }
            .ok_or_else(corrupt)?,
            Type::BooleanArray => collect(elements, |v| match v {
                Value::Boolean(b) => Some(b),
                _ => None,
            })
            .map(Value::BooleanArray)
            .ok_or_else(corrupt)?,
            Type::DateArray => collect(elements, |v| match v {
                Value::Date(d) => Some(d),
                _ => None,
            })
            .map(Value::DateArray)
            .ok_or_else(corrupt)?,
            Type::LocalTimeArray => collect(elements, |v| match v {
                Value::LocalTime(t) => Some(t),
                _ => None,
            })
            .map(Value::LocalTimeArray)
            .ok_or_else(corrupt)?,
            Type::LocalDateTimeArray => collect(elements, |v| match v {
                Value::LocalDateTime(dt) => Some(dt),
                _ => None,
            })
            .map(Value::LocalDateTimeArray)
            .ok_or_else(corrupt)?,
            Type::ZonedTimeArray => collect(elements, |v| match v {
                Value::ZonedTime(t) => Some(t),
                _ => None,
            })
            .map(Value::ZonedTimeArray)
            .ok_or_else(corrupt)?,
            Type::ZonedDateTimeArray => collect(elements, |v| match v {
                Value::ZonedDateTime(dt) => Some(dt),
                _ => None,
            })
            .map(Value::ZonedDateTimeArray)
            .ok_or_else(corrupt)?,
            Type::DurationArray => collect(elements, |v| match v {
                Value::Duration(d) => Some(d),
                _ => None,
            })
            .map(Value::DurationArray)
            .ok_or_else(corrupt)?,
            _ => slot.scalar.to_value().ok_or_else(corrupt)?,
        };
        Ok(value)
    }

    /// Sets `slot` to the lowest value of this type.
    pub fn init_lowest(self, slot: &mut KeySlot) {
        slot.clear();
        slot.ty = Some(self);
        slot.inclusion = Inclusion::Low;
        if !self.is_array() {
            slot.scalar = Element::lowest(self.element_kind());
        }
    }

    /// Sets `slot` to the highest value of this type.
    pub fn init_highest(self, slot: &mut KeySlot) {
        slot.clear();
        slot.ty = Some(self);
        slot.inclusion = Inclusion::High;
        match self {
            Type::Text => slot.text_highest = true,
            t if t.is_array() => slot.array.highest = true,
            _ => slot.scalar = Element::highest(self.element_kind()),
        }
    }
}
