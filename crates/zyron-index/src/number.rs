//! Raw-bits number encoding and cross-kind number comparison.
//!
//! A number is stored as its kind plus the raw bits of the original value.
//! Integers keep their sign-extended value; floats keep their IEEE-754
//! bit pattern. Nothing is widened on the way in, so a decoded number has
//! exactly the kind and bits it was written with.

use crate::value::Value;
use bytes::{Buf, BufMut};
use std::cmp::Ordering;

/// Kind tag of a stored number. The discriminants are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NumberKind {
    Byte = 0,
    Short = 1,
    Int = 2,
    Long = 3,
    Float = 4,
    Double = 5,
}

impl NumberKind {
    /// Decodes a persisted kind tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NumberKind::Byte),
            1 => Some(NumberKind::Short),
            2 => Some(NumberKind::Int),
            3 => Some(NumberKind::Long),
            4 => Some(NumberKind::Float),
            5 => Some(NumberKind::Double),
            _ => None,
        }
    }

    /// Width in bytes of the raw bits of this kind.
    pub fn width(self) -> usize {
        match self {
            NumberKind::Byte => 1,
            NumberKind::Short => 2,
            NumberKind::Int | NumberKind::Float => 4,
            NumberKind::Long | NumberKind::Double => 8,
        }
    }

    /// Returns true for FLOAT and DOUBLE.
    pub fn is_floating(self) -> bool {
        matches!(self, NumberKind::Float | NumberKind::Double)
    }
}

/// A number as kind plus raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawNumber {
    pub bits: i64,
    pub kind: NumberKind,
}

impl RawNumber {
    pub fn new(bits: i64, kind: NumberKind) -> Self {
        Self { bits, kind }
    }

    pub fn from_i64(v: i64) -> Self {
        Self::new(v, NumberKind::Long)
    }

    pub fn from_f64(v: f64) -> Self {
        Self::new(v.to_bits() as i64, NumberKind::Double)
    }

    /// Encodes a scalar number value. Returns None for non-numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw = match *value {
            Value::Byte(v) => Self::new(v as i64, NumberKind::Byte),
            Value::Short(v) => Self::new(v as i64, NumberKind::Short),
            Value::Int(v) => Self::new(v as i64, NumberKind::Int),
            Value::Long(v) => Self::new(v, NumberKind::Long),
            Value::Float(v) => Self::new(v.to_bits() as i32 as i64, NumberKind::Float),
            Value::Double(v) => Self::from_f64(v),
            _ => return None,
        };
        Some(raw)
    }

    /// Materializes the number with its original kind.
    pub fn to_value(self) -> Value {
        match self.kind {
            NumberKind::Byte => Value::Byte(self.bits as i8),
            NumberKind::Short => Value::Short(self.bits as i16),
            NumberKind::Int => Value::Int(self.bits as i32),
            NumberKind::Long => Value::Long(self.bits),
            NumberKind::Float => Value::Float(f32::from_bits(self.bits as u32)),
            NumberKind::Double => Value::Double(f64::from_bits(self.bits as u64)),
        }
    }

    /// Numeric value as f64. Lossy for longs beyond 2^53.
    pub fn as_f64(self) -> f64 {
        match self.kind {
            NumberKind::Float => f32::from_bits(self.bits as u32) as f64,
            NumberKind::Double => f64::from_bits(self.bits as u64),
            _ => self.bits as f64,
        }
    }

    /// Writes the raw bits using the width of this kind.
    pub fn put_bits<B: BufMut>(&self, buf: &mut B) {
        match self.kind {
            NumberKind::Byte => buf.put_i8(self.bits as i8),
            NumberKind::Short => buf.put_i16_le(self.bits as i16),
            NumberKind::Int | NumberKind::Float => buf.put_i32_le(self.bits as i32),
            NumberKind::Long | NumberKind::Double => buf.put_i64_le(self.bits),
        }
    }

    /// Reads raw bits of the given kind. The caller checks that
    /// `kind.width()` bytes remain.
    pub fn get_bits<B: Buf>(buf: &mut B, kind: NumberKind) -> Self {
        let bits = match kind {
            NumberKind::Byte => buf.get_i8() as i64,
            NumberKind::Short => buf.get_i16_le() as i64,
            NumberKind::Int | NumberKind::Float => buf.get_i32_le() as i64,
            NumberKind::Long | NumberKind::Double => buf.get_i64_le(),
        };
        Self::new(bits, kind)
    }

    /// Exact comparison across kinds.
    ///
    /// Integers compare as i64, floats as f64, and mixed pairs without
    /// rounding the integer side. NaN is greater than every other number.
    pub fn compare_exact(self, other: RawNumber) -> Ordering {
        match (self.kind.is_floating(), other.kind.is_floating()) {
            (true, true) => compare_doubles(self.as_f64(), other.as_f64()),
            (true, false) => compare_double_against_long(self.as_f64(), other.bits),
            (false, true) => compare_double_against_long(other.as_f64(), self.bits).reverse(),
            (false, false) => self.bits.cmp(&other.bits),
        }
    }

    /// Two-stage comparison: a lossy f64 fast path, and the exact
    /// comparison only when the fast path reports equality.
    ///
    /// Widening to f64 is monotonic, so a non-zero fast path result always
    /// agrees with the exact order and the combined result is exact.
    pub fn compare_lossy_then_exact(self, other: RawNumber) -> Ordering {
        match compare_doubles(self.as_f64(), other.as_f64()) {
            Ordering::Equal => self.compare_exact(other),
            ord => ord,
        }
    }
}

/// Total order on f64: NaN is greatest and -0.0 equals 0.0.
///
/// Zeros must compare equal to stay consistent with integer zero.
pub fn compare_doubles(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Compares a double against a long without rounding the long.
fn compare_double_against_long(d: f64, l: i64) -> Ordering {
    // 2^63 is exactly representable; every i64 is below it.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if d.is_nan() {
        return Ordering::Greater;
    }
    if d < -TWO_POW_63 {
        return Ordering::Less;
    }
    if d >= TWO_POW_63 {
        return Ordering::Greater;
    }
    let truncated = d.trunc();
    match (truncated as i64).cmp(&l) {
        Ordering::Equal => {
            if d > truncated {
                Ordering::Greater
            } else if d < truncated {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}
