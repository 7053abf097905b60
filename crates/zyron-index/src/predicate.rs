//! Per-column property predicates.

use crate::state::{Inclusion, KeySlot};
use crate::value::Value;
use std::cmp::Ordering;
use zyron_common::{Result, ValueGroup, ZyronError};

/// Condition on one indexed column.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyPredicate {
    /// Any value.
    Exists,
    /// Values equal to the given one.
    Exact(Value),
    /// Values between optional bounds. The flag marks a bound inclusive.
    Range {
        lower: Option<(Value, bool)>,
        upper: Option<(Value, bool)>,
    },
    StringPrefix(String),
    StringSuffix(String),
    StringContains(String),
}

impl PropertyPredicate {
    /// Value group the predicate applies to. `Unknown` for any group.
    pub fn value_group(&self) -> ValueGroup {
        match self {
            PropertyPredicate::Exists => ValueGroup::Unknown,
            PropertyPredicate::Exact(v) => v.value_group(),
            PropertyPredicate::Range { lower, upper } => lower
                .as_ref()
                .or(upper.as_ref())
                .map(|(v, _)| v.value_group())
                .unwrap_or(ValueGroup::Unknown),
            PropertyPredicate::StringPrefix(_)
            | PropertyPredicate::StringSuffix(_)
            | PropertyPredicate::StringContains(_) => ValueGroup::Text,
        }
    }

    /// Returns true if `value` satisfies the predicate. Values of another
    /// group never match.
    pub fn accepts_value(&self, value: &Value) -> bool {
        let group = self.value_group();
        if group != ValueGroup::Unknown && group != value.value_group() {
            return false;
        }
        match self {
            PropertyPredicate::Exists => true,
            PropertyPredicate::Exact(expected) => {
                compare_values(value, expected) == Some(Ordering::Equal)
            }
            PropertyPredicate::Range { lower, upper } => {
                let above = match lower {
                    Some((bound, inclusive)) => match compare_values(value, bound) {
                        Some(Ordering::Greater) => true,
                        Some(Ordering::Equal) => *inclusive,
                        _ => false,
                    },
                    None => true,
                };
                let below = match upper {
                    Some((bound, inclusive)) => match compare_values(value, bound) {
                        Some(Ordering::Less) => true,
                        Some(Ordering::Equal) => *inclusive,
                        _ => false,
                    },
                    None => true,
                };
                above && below
            }
            PropertyPredicate::StringPrefix(p) => value.as_text().is_some_and(|s| s.starts_with(p)),
            PropertyPredicate::StringSuffix(p) => value.as_text().is_some_and(|s| s.ends_with(p)),
            PropertyPredicate::StringContains(p) => value.as_text().is_some_and(|s| s.contains(p)),
        }
    }

    /// Sets `low` and `high` to the tightest slot bounds enclosing every
    /// value the predicate can accept.
    ///
    /// Suffix and contains predicates cannot narrow a seek and span all
    /// text values.
    pub fn init_bounds(&self, low: &mut KeySlot, high: &mut KeySlot) -> Result<()> {
        match self {
            PropertyPredicate::Exists => {
                low.init_value_as_lowest(ValueGroup::Unknown);
                high.init_value_as_highest(ValueGroup::Unknown);
            }
            PropertyPredicate::Exact(v) => {
                low.write_value(v, Inclusion::Neutral)?;
                high.write_value(v, Inclusion::Neutral)?;
            }
            PropertyPredicate::Range { lower, upper } => {
                if let (Some((l, _)), Some((u, _))) = (lower, upper) {
                    if l.value_group() != u.value_group() {
                        return Err(ZyronError::TypeMismatch {
                            expected: l.value_group().to_string(),
                            actual: u.value_group().to_string(),
                        });
                    }
                }
                let group = self.value_group();
                match lower {
                    Some((v, inclusive)) => {
                        let inclusion = if *inclusive { Inclusion::Low } else { Inclusion::High };
                        low.write_value(v, inclusion)?;
                    }
                    None => low.init_value_as_lowest(group),
                }
                match upper {
                    Some((v, inclusive)) => {
                        let inclusion = if *inclusive { Inclusion::High } else { Inclusion::Low };
                        high.write_value(v, inclusion)?;
                    }
                    None => high.init_value_as_highest(group),
                }
            }
            PropertyPredicate::StringPrefix(p) => {
                low.init_as_prefix_low(p)?;
                high.init_as_prefix_high(p)?;
            }
            PropertyPredicate::StringSuffix(_) | PropertyPredicate::StringContains(_) => {
                low.init_value_as_lowest(ValueGroup::Text);
                high.init_value_as_highest(ValueGroup::Text);
            }
        }
        Ok(())
    }
}

/// Compares two values with index ordering. None if either cannot be
/// encoded.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    let mut left = KeySlot::new();
    let mut right = KeySlot::new();
    left.write_value(a, Inclusion::Neutral).ok()?;
    right.write_value(b, Inclusion::Neutral).ok()?;
    left.try_compare_value_to(&right).ok()
}
