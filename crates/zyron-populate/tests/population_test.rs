//! End-to-end population through block storage, merging and update replay.

use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use zyron_common::{PopulationConfig, Result, ZyronError};
use zyron_index::{
    DistinctValuesClient, DistinctValuesProgressor, GenericLayout, IdSemantics, IndexKey,
    IndexProgressor, IndexState, Layout, NumberLayout, Seeker, TreeWriter, Value,
};
use zyron_populate::{BlockBasedPopulator, ValueIndexUpdate};

/// In-memory tree kept in layout order.
struct SortedTree<L: Layout> {
    layout: Arc<L>,
    keys: Vec<L::Key>,
}

impl<L: Layout> SortedTree<L> {
    fn new(layout: Arc<L>) -> Self {
        Self {
            layout,
            keys: Vec::new(),
        }
    }

    fn find(&self, key: &L::Key) -> std::result::Result<usize, usize> {
        self.keys.binary_search_by(|k| self.layout.compare(k, key))
    }

    fn seeker(&self) -> TreeSeeker<'_, L> {
        TreeSeeker {
            keys: &self.keys,
            pos: None,
            value: self.layout.new_value(),
        }
    }
}

impl<L: Layout> TreeWriter<L::Key, L::Value> for SortedTree<L> {
    fn put(&mut self, key: &L::Key, _value: &L::Value) -> Result<Option<i64>> {
        let mut copy = self.layout.new_key();
        self.layout.copy_key(key, &mut copy);
        match self.find(key) {
            Ok(i) => {
                let replaced = std::mem::replace(&mut self.keys[i], copy);
                Ok(Some(replaced.entity_id()))
            }
            Err(i) => {
                self.keys.insert(i, copy);
                Ok(None)
            }
        }
    }

    fn remove(&mut self, key: &L::Key) -> Result<bool> {
        match self.find(key) {
            Ok(i) => {
                self.keys.remove(i);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}

struct TreeSeeker<'a, L: Layout> {
    keys: &'a [L::Key],
    pos: Option<usize>,
    value: L::Value,
}

impl<L: Layout> Seeker<L::Key, L::Value> for TreeSeeker<'_, L> {
    fn next(&mut self) -> Result<bool> {
        let next = self.pos.map_or(0, |p| p + 1);
        self.pos = Some(next);
        Ok(next < self.keys.len())
    }

    fn key(&self) -> &L::Key {
        &self.keys[self.pos.unwrap()]
    }

    fn value(&self) -> &L::Value {
        &self.value
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

fn config(dir: &TempDir) -> PopulationConfig {
    PopulationConfig {
        temp_dir: dir.path().to_path_buf(),
        block_size: PopulationConfig::MIN_BLOCK_SIZE,
        merge_factor: 2,
        read_buffer_size: 4096,
        fsync_enabled: false,
    }
}

fn bucket(id: i64) -> Vec<Value> {
    vec![Value::Text(format!("v{:03}", id % 100))]
}

#[test]
fn test_concurrent_scan_with_external_updates() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
    let populator =
        BlockBasedPopulator::create("by_bucket", Arc::clone(&layout), config(&dir)).unwrap();

    let mut ids: Vec<i64> = (0..10_000).collect();
    ids.shuffle(&mut rand::thread_rng());

    std::thread::scope(|s| {
        for chunk in ids.chunks(2_500) {
            let populator = &populator;
            s.spawn(move || {
                for id in chunk {
                    populator.add(*id, &bucket(*id)).unwrap();
                }
            });
        }
        s.spawn(|| {
            for id in 0..100 {
                let update = ValueIndexUpdate::Removed {
                    entity_id: id,
                    values: bucket(id),
                };
                populator.process_update(&update).unwrap();
            }
            for id in 10_000..10_050 {
                let update = ValueIndexUpdate::Added {
                    entity_id: id,
                    values: bucket(id),
                };
                populator.process_update(&update).unwrap();
            }
            for id in 100..110 {
                let update = ValueIndexUpdate::Changed {
                    entity_id: id,
                    before: bucket(id),
                    after: vec![Value::Text("w".into())],
                };
                populator.process_update(&update).unwrap();
            }
        });
    });

    let mut tree = SortedTree::new(Arc::clone(&layout));
    let sample = populator.scan_completed(&mut tree).unwrap();
    assert_eq!(sample.index_size, 10_000);
    assert_eq!(sample.unique_values, 100);
    assert_eq!(populator.update_count(), 160);
    assert_eq!(populator.header().state(), IndexState::Online);

    assert_eq!(populator.scan_part_count(), 4);
    let stats = populator.scan_stats();
    assert_eq!(stats.entries_added, 10_000);
    assert!(stats.blocks_flushed > 2);
    assert!(stats.merge_passes >= 2);

    assert_eq!(tree.keys.len(), 9_950);
    for pair in tree.keys.windows(2) {
        assert_eq!(layout.compare(&pair[0], &pair[1]), Ordering::Less);
    }

    let mut groups = Groups::default();
    let mut progressor = DistinctValuesProgressor::new(tree.seeker(), &*layout, &mut groups);
    while progressor.next().unwrap() {}
    assert_eq!(groups.0.len(), 101);
    for (count, values) in &groups.0 {
        let expected = match &values[0] {
            Value::Text(t) if t == "w" => 10,
            Value::Text(t) => {
                let bucket: i64 = t[1..].parse().unwrap();
                match bucket {
                    0..=9 => 99,
                    10..=49 => 100,
                    _ => 99,
                }
            }
            other => panic!("unexpected value {:?}", other),
        };
        assert_eq!(*count, expected, "group {:?}", values);
    }
}

#[test]
fn test_unique_number_index_rejects_equal_numbers() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(NumberLayout::new(IdSemantics::Unique));
    let populator =
        BlockBasedPopulator::create("unique", Arc::clone(&layout), config(&dir)).unwrap();
    populator.add(1, &[Value::Int(2)]).unwrap();
    populator.add(2, &[Value::Double(3.5)]).unwrap();
    populator.add(3, &[Value::Double(2.0)]).unwrap();

    let mut tree = SortedTree::new(layout);
    let err = populator.scan_completed(&mut tree).unwrap_err();
    assert!(matches!(err, ZyronError::IndexEntryConflict { existing: 1, added: 3, .. }));

    let header = populator.header();
    assert_eq!(header.state(), IndexState::Failed);
    assert_eq!(header.failure_message(), Some(err.to_string().as_str()));
}

type NumberPopulator = BlockBasedPopulator<NumberLayout>;

fn unique_number_populator(dir: &TempDir) -> (Arc<NumberLayout>, NumberPopulator) {
    let layout = Arc::new(NumberLayout::new(IdSemantics::Unique));
    let populator =
        BlockBasedPopulator::create("unique", Arc::clone(&layout), config(dir)).unwrap();
    (layout, populator)
}

#[test]
fn test_unique_index_rejects_added_update_duplicating_scan() {
    let dir = TempDir::new().unwrap();
    let (layout, populator) = unique_number_populator(&dir);
    populator.add(1, &[Value::Long(5)]).unwrap();
    populator
        .process_update(&ValueIndexUpdate::Added {
            entity_id: 2,
            values: vec![Value::Long(5)],
        })
        .unwrap();

    let mut tree = SortedTree::new(layout);
    let err = populator.scan_completed(&mut tree).unwrap_err();
    assert!(matches!(err, ZyronError::IndexEntryConflict { existing: 1, added: 2, .. }));
    assert_eq!(populator.header().state(), IndexState::Failed);
}

#[test]
fn test_unique_index_rejects_changed_update_onto_taken_value() {
    let dir = TempDir::new().unwrap();
    let (layout, populator) = unique_number_populator(&dir);
    populator.add(1, &[Value::Long(5)]).unwrap();
    populator.add(2, &[Value::Long(6)]).unwrap();
    populator
        .process_update(&ValueIndexUpdate::Changed {
            entity_id: 2,
            before: vec![Value::Long(6)],
            after: vec![Value::Double(5.0)],
        })
        .unwrap();

    let mut tree = SortedTree::new(layout);
    let err = populator.scan_completed(&mut tree).unwrap_err();
    assert!(matches!(err, ZyronError::IndexEntryConflict { existing: 1, added: 2, .. }));
    let header = populator.header();
    assert_eq!(header.state(), IndexState::Failed);
    assert_eq!(header.failure_message(), Some(err.to_string().as_str()));
}

#[test]
fn test_unique_index_replay_allows_freed_and_same_entity_values() {
    let dir = TempDir::new().unwrap();
    let (layout, populator) = unique_number_populator(&dir);
    populator.add(1, &[Value::Long(5)]).unwrap();
    let updates = [
        ValueIndexUpdate::Added {
            entity_id: 1,
            values: vec![Value::Long(5)],
        },
        ValueIndexUpdate::Changed {
            entity_id: 1,
            before: vec![Value::Long(5)],
            after: vec![Value::Long(7)],
        },
        ValueIndexUpdate::Added {
            entity_id: 2,
            values: vec![Value::Long(5)],
        },
    ];
    for update in &updates {
        populator.process_update(update).unwrap();
    }

    let mut tree = SortedTree::new(layout);
    populator.scan_completed(&mut tree).unwrap();
    assert_eq!(populator.header().state(), IndexState::Online);
    let ids: Vec<i64> = tree.keys.iter().map(|k| k.entity_id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn test_unique_index_accepts_distinct_values() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(NumberLayout::new(IdSemantics::Unique));
    let populator =
        BlockBasedPopulator::create("unique", Arc::clone(&layout), config(&dir)).unwrap();
    let mut values: Vec<i64> = (0..2_000).collect();
    values.shuffle(&mut rand::thread_rng());
    for v in &values {
        populator.add(*v + 100, &[Value::Long(*v)]).unwrap();
    }

    let mut tree = SortedTree::new(layout);
    let sample = populator.scan_completed(&mut tree).unwrap();
    assert_eq!(sample.index_size, 2_000);
    assert_eq!(sample.unique_values, 2_000);
    let first: Vec<i64> = tree.keys.iter().take(3).map(|k| k.entity_id).collect();
    assert_eq!(first, vec![100, 101, 102]);
}

#[test]
fn test_oversized_key_fails_only_that_add() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
    let populator = BlockBasedPopulator::create("big", Arc::clone(&layout), config(&dir)).unwrap();
    let huge = vec![Value::Text("x".repeat(10_000))];
    assert!(matches!(
        populator.add(1, &huge),
        Err(ZyronError::KeyTooLarge { .. })
    ));
    populator.add(2, &bucket(2)).unwrap();

    let mut tree = SortedTree::new(layout);
    let sample = populator.scan_completed(&mut tree).unwrap();
    assert_eq!(sample.index_size, 1);
}

#[test]
fn test_temp_files_removed() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
    {
        let populator =
            BlockBasedPopulator::create("tmp", Arc::clone(&layout), config(&dir)).unwrap();
        for id in 0..2_000 {
            populator.add(id, &bucket(id)).unwrap();
        }
        let mut tree = SortedTree::new(Arc::clone(&layout));
        populator.scan_completed(&mut tree).unwrap();
        populator.close().unwrap();
    }
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(GenericLayout::new(1, IdSemantics::NonUnique));
    let mut config = config(&dir);
    config.merge_factor = 1;
    assert!(matches!(
        BlockBasedPopulator::create("bad", layout, config),
        Err(ZyronError::InvalidParameter { .. })
    ));
}
