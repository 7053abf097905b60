//! Pull-based adapters from tree hits to index clients.
//!
//! A progressor wraps a [`Seeker`] and hands decoded hits to a client one
//! at a time. Each call to [`IndexProgressor::next`] advances until the
//! client accepts a hit or the seeker is exhausted.

use crate::key::IndexKey;
use crate::layout::Layout;
use crate::predicate::PropertyPredicate;
use crate::tree::Seeker;
use crate::value::Value;
use std::cmp::Ordering;
use std::marker::PhantomData;
use zyron_common::Result;

/// Receiver of entity hits.
pub trait EntityValueClient {
    /// Offers one hit. `values` is present only if [`needs_values`]
    /// returned true. Returns true to accept.
    ///
    /// [`needs_values`]: EntityValueClient::needs_values
    fn accept_entity(&mut self, entity_id: i64, values: Option<&[Value]>) -> bool;

    fn needs_values(&self) -> bool;
}

/// Receiver of distinct value groups.
pub trait DistinctValuesClient {
    /// Offers one group of `count` entries sharing `values`. Returns true
    /// to accept.
    fn accept_distinct(&mut self, count: u64, values: &[Value]) -> bool;
}

/// Pull-based iteration over accepted hits.
pub trait IndexProgressor {
    /// Advances to the next accepted hit. Returns false when exhausted.
    fn next(&mut self) -> Result<bool>;
}

/// Passes every hit to the client, decoding values only on request.
pub struct EntityProgressor<'a, K, V, S, C> {
    seeker: S,
    client: &'a mut C,
    _entry: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V, S, C> EntityProgressor<'a, K, V, S, C>
where
    K: IndexKey,
    S: Seeker<K, V>,
    C: EntityValueClient,
{
    pub fn new(seeker: S, client: &'a mut C) -> Self {
        Self {
            seeker,
            client,
            _entry: PhantomData,
        }
    }
}

impl<K, V, S, C> IndexProgressor for EntityProgressor<'_, K, V, S, C>
where
    K: IndexKey,
    S: Seeker<K, V>,
    C: EntityValueClient,
{
    fn next(&mut self) -> Result<bool> {
        while self.seeker.next()? {
            let key = self.seeker.key();
            let accepted = if self.client.needs_values() {
                let values = key.as_values()?;
                self.client.accept_entity(key.entity_id(), Some(&values))
            } else {
                self.client.accept_entity(key.entity_id(), None)
            };
            if accepted {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Passes only hits whose values satisfy every predicate.
///
/// Predicate `i` applies to column `i`. Values are always decoded.
pub struct FilteringProgressor<'a, K, V, S, C> {
    seeker: S,
    client: &'a mut C,
    predicates: Vec<PropertyPredicate>,
    _entry: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V, S, C> FilteringProgressor<'a, K, V, S, C>
where
    K: IndexKey,
    S: Seeker<K, V>,
    C: EntityValueClient,
{
    pub fn new(seeker: S, client: &'a mut C, predicates: Vec<PropertyPredicate>) -> Self {
        Self {
            seeker,
            client,
            predicates,
            _entry: PhantomData,
        }
    }

    fn accepts(&self, values: &[Value]) -> bool {
        self.predicates
            .iter()
            .zip(values)
            .all(|(predicate, value)| predicate.accepts_value(value))
    }
}

impl<K, V, S, C> IndexProgressor for FilteringProgressor<'_, K, V, S, C>
where
    K: IndexKey,
    S: Seeker<K, V>,
    C: EntityValueClient,
{
    fn next(&mut self) -> Result<bool> {
        while self.seeker.next()? {
            let key = self.seeker.key();
            let values = key.as_values()?;
            if !self.accepts(&values) {
                continue;
            }
            if self.client.accept_entity(key.entity_id(), Some(&values)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Collapses runs of equal values into `(count, values)` groups.
///
/// Hits must arrive in layout order so equal values are adjacent.
pub struct DistinctValuesProgressor<'a, L: Layout, S, C> {
    seeker: S,
    layout: &'a L,
    client: &'a mut C,
    prev: L::Key,
    count: u64,
    has_prev: bool,
    done: bool,
}

impl<'a, L, S, C> DistinctValuesProgressor<'a, L, S, C>
where
    L: Layout,
    S: Seeker<L::Key, L::Value>,
    C: DistinctValuesClient,
{
    pub fn new(seeker: S, layout: &'a L, client: &'a mut C) -> Self {
        Self {
            seeker,
            layout,
            client,
            prev: layout.new_key(),
            count: 0,
            has_prev: false,
            done: false,
        }
    }
}

impl<L, S, C> IndexProgressor for DistinctValuesProgressor<'_, L, S, C>
where
    L: Layout,
    S: Seeker<L::Key, L::Value>,
    C: DistinctValuesClient,
{
    fn next(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        while self.seeker.next()? {
            let key = self.seeker.key();
            if self.has_prev && self.layout.compare_value(&self.prev, key) == Ordering::Equal {
                self.count += 1;
                continue;
            }
            if !self.has_prev {
                self.layout.copy_key(key, &mut self.prev);
                self.has_prev = true;
                self.count = 1;
                continue;
            }

            let values = self.prev.as_values()?;
            let count = self.count;
            self.layout.copy_key(key, &mut self.prev);
            self.count = 1;
            if self.client.accept_distinct(count, &values) {
                return Ok(true);
            }
        }

        self.done = true;
        if !self.has_prev {
            return Ok(false);
        }
        self.has_prev = false;
        let values = self.prev.as_values()?;
        Ok(self.client.accept_distinct(self.count, &values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::GenericKey;
    use crate::layout::{GenericLayout, IdSemantics, NullValue};

    struct VecSeeker {
        keys: Vec<GenericKey>,
        pos: Option<usize>,
        value: NullValue,
    }

    impl VecSeeker {
        fn new(layout: &GenericLayout, rows: &[(i64, Vec<Value>)]) -> Self {
            let keys = rows
                .iter()
                .map(|(id, values)| {
                    let mut key = layout.new_key();
                    key.initialize_from_values(*id, values).unwrap();
                    key
                })
                .collect();
            Self {
                keys,
                pos: None,
                value: NullValue,
            }
        }
    }

    impl Seeker<GenericKey, NullValue> for VecSeeker {
        fn next(&mut self) -> Result<bool> {
            let next = self.pos.map_or(0, |p| p + 1);
            self.pos = Some(next);
            Ok(next < self.keys.len())
        }

        fn key(&self) -> &GenericKey {
            &self.keys[self.pos.unwrap()]
        }

        fn value(&self) -> &NullValue {
            &self.value
        }
    }

    #[derive(Default)]
    struct Collector {
        needs_values: bool,
        reject_odd: bool,
        hits: Vec<(i64, Option<Vec<Value>>)>,
    }

    impl EntityValueClient for Collector {
        fn accept_entity(&mut self, entity_id: i64, values: Option<&[Value]>) -> bool {
            if self.reject_odd && entity_id % 2 == 1 {
                return false;
            }
            self.hits.push((entity_id, values.map(|v| v.to_vec())));
            true
        }

        fn needs_values(&self) -> bool {
            self.needs_values
        }
    }

    #[derive(Default)]
    struct Groups(Vec<(u64, Vec<Value>)>);

    impl DistinctValuesClient for Groups {
        fn accept_distinct(&mut self, count: u64, values: &[Value]) -> bool {
            self.0.push((count, values.to_vec()));
            true
        }
    }

    fn rows(values: &[i64]) -> Vec<(i64, Vec<Value>)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i64, vec![Value::Long(*v)]))
            .collect()
    }

    #[test]
    fn test_entity_progressor_decodes_on_request() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let mut client = Collector::default();
        let mut progressor =
            EntityProgressor::new(VecSeeker::new(&layout, &rows(&[5, 6])), &mut client);
        assert!(progressor.next().unwrap());
        assert!(progressor.next().unwrap());
        assert!(!progressor.next().unwrap());
        assert_eq!(client.hits, vec![(0, None), (1, None)]);

        let mut client = Collector {
            needs_values: true,
            ..Collector::default()
        };
        let mut progressor =
            EntityProgressor::new(VecSeeker::new(&layout, &rows(&[5])), &mut client);
        assert!(progressor.next().unwrap());
        assert_eq!(client.hits, vec![(0, Some(vec![Value::Long(5)]))]);
    }

    #[test]
    fn test_entity_progressor_skips_rejected_hits() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let mut client = Collector {
            reject_odd: true,
            ..Collector::default()
        };
        let mut progressor =
            EntityProgressor::new(VecSeeker::new(&layout, &rows(&[1, 2, 3, 4])), &mut client);
        assert!(progressor.next().unwrap());
        assert!(progressor.next().unwrap());
        assert!(!progressor.next().unwrap());
        let ids: Vec<i64> = client.hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_filtering_progressor_requires_all_predicates() {
        let layout = GenericLayout::new(2, IdSemantics::NonUnique);
        let data = vec![
            (1, vec![Value::Text("apple".into()), Value::Long(3)]),
            (2, vec![Value::Text("apricot".into()), Value::Long(30)]),
            (3, vec![Value::Text("banana".into()), Value::Long(3)]),
        ];
        let predicates = vec![
            PropertyPredicate::StringPrefix("ap".into()),
            PropertyPredicate::Range {
                lower: None,
                upper: Some((Value::Long(10), true)),
            },
        ];
        let mut client = Collector::default();
        let mut progressor =
            FilteringProgressor::new(VecSeeker::new(&layout, &data), &mut client, predicates);
        while progressor.next().unwrap() {}

        assert_eq!(client.hits.len(), 1);
        assert_eq!(client.hits[0].0, 1);
        assert_eq!(client.hits[0].1.as_ref().unwrap()[1], Value::Long(3));
    }

    #[test]
    fn test_distinct_counts_runs() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let mut groups = Groups::default();
        let seeker = VecSeeker::new(&layout, &rows(&[1, 1, 1, 2, 2, 3]));
        let mut progressor = DistinctValuesProgressor::new(seeker, &layout, &mut groups);
        let mut emitted = 0;
        while progressor.next().unwrap() {
            emitted += 1;
        }
        assert_eq!(emitted, 3);
        assert!(!progressor.next().unwrap());

        let counts: Vec<u64> = groups.0.iter().map(|(c, _)| *c).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(groups.0[2].1, vec![Value::Long(3)]);
    }

    #[test]
    fn test_distinct_empty_and_single() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let mut groups = Groups::default();
        let mut progressor =
            DistinctValuesProgressor::new(VecSeeker::new(&layout, &[]), &layout, &mut groups);
        assert!(!progressor.next().unwrap());
        assert!(groups.0.is_empty());

        let mut groups = Groups::default();
        let seeker = VecSeeker::new(&layout, &rows(&[7, 7]));
        let mut progressor = DistinctValuesProgressor::new(seeker, &layout, &mut groups);
        assert!(progressor.next().unwrap());
        assert!(!progressor.next().unwrap());
        assert_eq!(groups.0, vec![(2, vec![Value::Long(7)])]);
    }
}
