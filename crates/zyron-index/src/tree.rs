//! Interfaces of the ordered tree engine consumed by index code.

use zyron_common::Result;

/// Forward cursor over tree entries.
///
/// `key` and `value` borrow scratch state that the next call to `next`
/// overwrites.
pub trait Seeker<K, V> {
    /// Moves to the next entry. Returns false when exhausted.
    fn next(&mut self) -> Result<bool>;

    fn key(&self) -> &K;

    fn value(&self) -> &V;
}

/// Write access to a tree.
pub trait TreeWriter<K, V> {
    /// Inserts or overwrites the entry for `key`. Returns the entity id of
    /// the entry it overwrote, if any.
    fn put(&mut self, key: &K, value: &V) -> Result<Option<i64>>;

    /// Removes the entry for `key`. Returns false if it was absent.
    fn remove(&mut self, key: &K) -> Result<bool>;
}
