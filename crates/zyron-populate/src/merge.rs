//! K-way merge over sorted entry cursors.

use crate::reader::BlockEntryCursor;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use zyron_common::Result;
use zyron_index::Layout;

/// Boxed source cursor of a merge.
pub type Source<'a, L> = Box<dyn BlockEntryCursor<<L as Layout>::Key, <L as Layout>::Value> + 'a>;

/// A source positioned on its current entry.
struct HeapEntry<'a, L: Layout> {
    cursor: Source<'a, L>,
    source: usize,
    layout: &'a L,
}

impl<L: Layout> PartialEq for HeapEntry<'_, L> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<L: Layout> Eq for HeapEntry<'_, L> {}

impl<L: Layout> PartialOrd for HeapEntry<'_, L> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<L: Layout> Ord for HeapEntry<'_, L> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the smallest key pops first.
        // Ties go to the earlier source.
        self.layout
            .compare(other.cursor.key(), self.cursor.key())
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges sorted sources into one sorted stream.
///
/// Sources are advanced lazily: `next` moves only the source that produced
/// the previous entry. Every source is closed exactly once, either when it
/// runs dry or when the merger closes.
pub struct MergingBlockEntryReader<'a, L: Layout> {
    layout: &'a L,
    pending: Vec<(usize, Source<'a, L>)>,
    heap: BinaryHeap<HeapEntry<'a, L>>,
    current: Option<HeapEntry<'a, L>>,
    next_source: usize,
    key: L::Key,
    value: L::Value,
    closed: bool,
}

impl<'a, L: Layout> MergingBlockEntryReader<'a, L> {
    pub fn new(layout: &'a L) -> Self {
        Self {
            layout,
            pending: Vec::new(),
            heap: BinaryHeap::new(),
            current: None,
            next_source: 0,
            key: layout.new_key(),
            value: layout.new_value(),
            closed: false,
        }
    }

    /// Takes ownership of a source. Its first entry is read on the next
    /// call to `next`.
    pub fn add_source(&mut self, cursor: Source<'a, L>) {
        self.pending.push((self.next_source, cursor));
        self.next_source += 1;
    }

    /// Number of sources added so far.
    pub fn source_count(&self) -> usize {
        self.next_source
    }

    /// Advances `cursor` and queues it, or closes it when exhausted or failed.
    fn advance(&mut self, source: usize, mut cursor: Source<'a, L>) -> Result<()> {
        match cursor.next() {
            Ok(true) => {
                self.heap.push(HeapEntry {
                    cursor,
                    source,
                    layout: self.layout,
                });
                Ok(())
            }
            Ok(false) => {
                cursor.close();
                Ok(())
            }
            Err(e) => {
                cursor.close();
                Err(e)
            }
        }
    }
}

impl<L: Layout> BlockEntryCursor<L::Key, L::Value> for MergingBlockEntryReader<'_, L> {
    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if let Some(entry) = self.current.take() {
            self.advance(entry.source, entry.cursor)?;
        }
        while let Some((source, cursor)) = self.pending.pop() {
            self.advance(source, cursor)?;
        }

        let Some(entry) = self.heap.pop() else {
            return Ok(false);
        };
        self.layout.copy_key(entry.cursor.key(), &mut self.key);
        self.value.clone_from(entry.cursor.value());
        self.current = Some(entry);
        Ok(true)
    }

    fn key(&self) -> &L::Key {
        &self.key
    }

    fn value(&self) -> &L::Value {
        &self.value
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut entry) = self.current.take() {
            entry.cursor.close();
        }
        for mut entry in self.heap.drain() {
            entry.cursor.close();
        }
        for (_, mut cursor) in self.pending.drain(..) {
            cursor.close();
        }
    }
}

impl<L: Layout> Drop for MergingBlockEntryReader<'_, L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use zyron_common::ZyronError;
    use zyron_index::{GenericKey, GenericLayout, IdSemantics, IndexKey, NullValue, Value};

    /// In-memory source that counts closes.
    struct VecCursor {
        keys: Vec<GenericKey>,
        pos: usize,
        current: GenericKey,
        closes: Arc<AtomicUsize>,
        fail_at: Option<usize>,
    }

    impl VecCursor {
        fn new(layout: &GenericLayout, values: &[i64], closes: &Arc<AtomicUsize>) -> Self {
            let keys = values
                .iter()
                .map(|v| {
                    let mut key = layout.new_key();
                    key.initialize_from_values(*v, &[Value::Long(*v)]).unwrap();
                    key
                })
                .collect();
            Self {
                keys,
                pos: 0,
                current: layout.new_key(),
                closes: Arc::clone(closes),
                fail_at: None,
            }
        }
    }

    impl BlockEntryCursor<GenericKey, NullValue> for VecCursor {
        fn next(&mut self) -> Result<bool> {
            if self.fail_at == Some(self.pos) {
                return Err(ZyronError::Internal("injected".to_string()));
            }
            match self.keys.get(self.pos) {
                Some(key) => {
                    self.current.copy_from(key);
                    self.pos += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn key(&self) -> &GenericKey {
            &self.current
        }

        fn value(&self) -> &NullValue {
            &NullValue
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn drain(merger: &mut MergingBlockEntryReader<'_, GenericLayout>) -> Vec<i64> {
        let mut out = Vec::new();
        while merger.next().unwrap() {
            out.push(merger.key().entity_id());
        }
        out
    }

    #[test]
    fn test_merges_interleaved_blocks() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let closes = Arc::new(AtomicUsize::new(0));
        let mut merger = MergingBlockEntryReader::new(&layout);
        for block in [[1, 4, 7], [2, 5, 8], [3, 6, 9]] {
            merger.add_source(Box::new(VecCursor::new(&layout, &block, &closes)));
        }
        assert_eq!(drain(&mut merger), (1..=9).collect::<Vec<i64>>());
        assert!(!merger.next().unwrap());
        merger.close();
        merger.close();
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn test_close_before_exhaustion_closes_each_source_once() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut merger = MergingBlockEntryReader::new(&layout);
            merger.add_source(Box::new(VecCursor::new(&layout, &[1], &closes)));
            merger.add_source(Box::new(VecCursor::new(&layout, &[2, 3, 4], &closes)));
            merger.add_source(Box::new(VecCursor::new(&layout, &[5, 6], &closes)));
            merger.add_source(Box::new(VecCursor::new(&layout, &[], &closes)));
            assert!(merger.next().unwrap());
            assert!(merger.next().unwrap());
            assert_eq!(merger.key().entity_id(), 2);
            // The empty source and the single-entry source ran dry.
            assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
        }
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 4);
    }

    #[test]
    fn test_equal_keys_prefer_earlier_source() {
        let layout = GenericLayout::new(1, IdSemantics::Unique);
        let closes = Arc::new(AtomicUsize::new(0));
        let mut merger = MergingBlockEntryReader::new(&layout);
        let mut first = VecCursor::new(&layout, &[], &closes);
        let mut second = VecCursor::new(&layout, &[], &closes);
        for (cursor, id) in [(&mut first, 10), (&mut second, 20)] {
            let mut key = layout.new_key();
            key.initialize_from_values(id, &[Value::Long(7)]).unwrap();
            cursor.keys.push(key);
        }
        merger.add_source(Box::new(second));
        merger.add_source(Box::new(first));
        assert_eq!(drain(&mut merger), vec![20, 10]);
    }

    #[test]
    fn test_source_error_is_returned_and_source_closed() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let closes = Arc::new(AtomicUsize::new(0));
        let mut merger = MergingBlockEntryReader::new(&layout);
        let mut failing = VecCursor::new(&layout, &[1, 2], &closes);
        failing.fail_at = Some(1);
        merger.add_source(Box::new(failing));
        merger.add_source(Box::new(VecCursor::new(&layout, &[3], &closes)));

        assert!(merger.next().unwrap());
        assert!(merger.next().is_err());
        drop(merger);
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_merges_nest() {
        let layout = GenericLayout::new(1, IdSemantics::NonUnique);
        let closes = Arc::new(AtomicUsize::new(0));
        let mut inner = MergingBlockEntryReader::new(&layout);
        inner.add_source(Box::new(VecCursor::new(&layout, &[1, 5], &closes)));
        inner.add_source(Box::new(VecCursor::new(&layout, &[3], &closes)));

        let mut outer = MergingBlockEntryReader::new(&layout);
        outer.add_source(Box::new(inner));
        outer.add_source(Box::new(VecCursor::new(&layout, &[2, 4], &closes)));
        assert_eq!(outer.source_count(), 2);
        assert_eq!(drain(&mut outer), vec![1, 2, 3, 4, 5]);
        outer.close();
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 3);
    }
}
