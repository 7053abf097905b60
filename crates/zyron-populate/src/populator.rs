//! Block-based index population.
//!
//! A population runs in two phases. During the scan, entity values are
//! added to sorted block storage and concurrent external updates are
//! appended to an update log. Each scanning thread writes its own block
//! storage. When the scan completes, every storage is merged and all of
//! them are read back through one merging reader and bulk inserted into
//! the tree. The update log is then replayed in order on top. Updates
//! arriving after completion are rejected so the replay sees every update
//! exactly once.

use crate::block::{BlockStorage, BlockStorageStats};
use crate::constants::{SCAN_FILE_SUFFIX, UPDATES_FILE_SUFFIX};
use crate::merge::MergingBlockEntryReader;
use crate::reader::BlockEntryCursor;
use crate::update::{IndexUpdateStorage, UpdateMode};
use parking_lot::{Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};
use zyron_common::{PopulationConfig, Result, ZyronError};
use zyron_index::{IdSemantics, IndexHeader, IndexKey, Layout, TreeWriter, Value};

/// External change to indexed values of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueIndexUpdate {
    Added { entity_id: i64, values: Vec<Value> },
    Removed { entity_id: i64, values: Vec<Value> },
    Changed { entity_id: i64, before: Vec<Value>, after: Vec<Value> },
}

impl ValueIndexUpdate {
    pub fn entity_id(&self) -> i64 {
        match self {
            ValueIndexUpdate::Added { entity_id, .. }
            | ValueIndexUpdate::Removed { entity_id, .. }
            | ValueIndexUpdate::Changed { entity_id, .. } => *entity_id,
        }
    }
}

/// Statistics gathered from the merged scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSample {
    /// Entries bulk inserted from the scan.
    pub index_size: u64,
    /// Distinct values among them.
    pub unique_values: u64,
    /// Entries the sample was taken from.
    pub sample_size: u64,
}

type ScanPart<L> = Arc<Mutex<BlockStorage<L>>>;

/// Scan storages, one per adding thread, in creation order.
struct ScanParts<L: Layout> {
    by_thread: HashMap<ThreadId, ScanPart<L>>,
    parts: Vec<ScanPart<L>>,
}

/// Builds one index from a scan plus concurrent updates.
pub struct BlockBasedPopulator<L: Layout> {
    name: String,
    layout: Arc<L>,
    config: PopulationConfig,
    scan: Mutex<ScanParts<L>>,
    updates: Mutex<IndexUpdateStorage<L>>,
    scan_completed: AtomicBool,
    header: Mutex<IndexHeader>,
}

impl<L: Layout> BlockBasedPopulator<L> {
    /// Creates the update log for index `name` under `config.temp_dir`.
    /// Scan storages are created on first add from each thread.
    pub fn create(name: &str, layout: Arc<L>, config: PopulationConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.temp_dir)?;
        let updates_path = config.temp_dir.join(format!("{}{}", name, UPDATES_FILE_SUFFIX));
        let updates = IndexUpdateStorage::create(Arc::clone(&layout), &updates_path, &config)?;

        info!(
            index = name,
            semantics = %layout.semantics(),
            temp_dir = %config.temp_dir.display(),
            "Index population started"
        );
        Ok(Self {
            name: name.to_string(),
            layout,
            config,
            scan: Mutex::new(ScanParts {
                by_thread: HashMap::new(),
                parts: Vec::new(),
            }),
            updates: Mutex::new(updates),
            scan_completed: AtomicBool::new(false),
            header: Mutex::new(IndexHeader::populating()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds the values of one scanned entity to the calling thread's
    /// storage.
    pub fn add(&self, entity_id: i64, values: &[Value]) -> Result<()> {
        if self.scan_completed.load(AtomicOrdering::Acquire) {
            return Err(self.completed_error(format!(
                "scan of index {} already completed",
                self.name
            )));
        }
        let mut key = self.layout.new_key();
        key.initialize_from_values(entity_id, values)?;
        let value = self.layout.new_value();
        let part = self.scan_part()?;
        let mut storage = part.lock();
        storage.add(&key, &value)
    }

    /// Returns the storage of the calling thread, creating it on first use.
    fn scan_part(&self) -> Result<ScanPart<L>> {
        let thread = thread::current().id();
        let mut scan = self.scan.lock();
        if let Some(part) = scan.by_thread.get(&thread) {
            return Ok(Arc::clone(part));
        }
        // Checked under the registry lock so build never misses a part.
        if self.scan_completed.load(AtomicOrdering::Acquire) {
            return Err(self.completed_error(format!(
                "scan of index {} already completed",
                self.name
            )));
        }

        let number = scan.parts.len();
        let path = self
            .config
            .temp_dir
            .join(format!("{}{}.{}", self.name, SCAN_FILE_SUFFIX, number));
        let storage = BlockStorage::create(Arc::clone(&self.layout), &path, &self.config)?;
        debug!(index = %self.name, part = number, path = %path.display(), "Scan storage created");

        let part = Arc::new(Mutex::new(storage));
        scan.parts.push(Arc::clone(&part));
        scan.by_thread.insert(thread, Arc::clone(&part));
        Ok(part)
    }

    /// Logs an external update for replay after the scan.
    pub fn process_update(&self, update: &ValueIndexUpdate) -> Result<()> {
        let mut updates = self.updates.lock();
        if self.scan_completed.load(AtomicOrdering::Acquire) {
            return Err(self.completed_error(format!(
                "update for entity {} after scan of index {} completed",
                update.entity_id(),
                self.name
            )));
        }

        let layout = &*self.layout;
        let value = layout.new_value();
        match update {
            ValueIndexUpdate::Added { entity_id, values } => {
                let mut key = layout.new_key();
                key.initialize_from_values(*entity_id, values)?;
                updates.add_added(&key, &value)
            }
            ValueIndexUpdate::Removed { entity_id, values } => {
                let mut key = layout.new_key();
                key.initialize_from_values(*entity_id, values)?;
                updates.add_removed(&key)
            }
            ValueIndexUpdate::Changed {
                entity_id,
                before,
                after,
            } => {
                let mut old = layout.new_key();
                let mut new = layout.new_key();
                old.initialize_from_values(*entity_id, before)?;
                new.initialize_from_values(*entity_id, after)?;
                updates.add_changed(&old, &new, &value)
            }
        }
    }

    /// Error for a call made after the scan completed. A failed population
    /// reports its failure instead.
    fn completed_error(&self, message: String) -> ZyronError {
        match self.header.lock().check_not_failed() {
            Err(failed) => failed,
            Ok(()) => ZyronError::InvalidState(message),
        }
    }

    /// Finishes the population into `tree`.
    ///
    /// On success the header becomes ONLINE. On any failure it becomes
    /// FAILED with the error message and the error is returned.
    pub fn scan_completed<W>(&self, tree: &mut W) -> Result<IndexSample>
    where
        W: TreeWriter<L::Key, L::Value>,
    {
        {
            // Holding the log lock orders the flag against process_update.
            let _updates = self.updates.lock();
            if self.scan_completed.swap(true, AtomicOrdering::AcqRel) {
                return Err(self.completed_error(format!(
                    "scan of index {} completed twice",
                    self.name
                )));
            }
        }

        match self.build(tree) {
            Ok(sample) => {
                self.header.lock().mark_online()?;
                info!(
                    index = %self.name,
                    entries = sample.index_size,
                    unique_values = sample.unique_values,
                    "Index population complete"
                );
                Ok(sample)
            }
            Err(e) => {
                warn!(index = %self.name, error = %e, "Index population failed");
                if let Err(mark) = self.header.lock().mark_failed(e.to_string()) {
                    warn!(index = %self.name, error = %mark, "Could not mark index failed");
                }
                Err(e)
            }
        }
    }

    fn build<W>(&self, tree: &mut W) -> Result<IndexSample>
    where
        W: TreeWriter<L::Key, L::Value>,
    {
        let parts = self.scan.lock().parts.clone();
        let mut storages: Vec<MutexGuard<'_, BlockStorage<L>>> =
            parts.iter().map(|part| part.lock()).collect();
        for storage in storages.iter_mut() {
            storage.done_adding()?;
            storage.merge(self.config.merge_factor)?;
        }
        let storages: Vec<&BlockStorage<L>> = storages.iter().map(|s| &**s).collect();
        let sample = self.insert_scan(&storages, tree)?;
        debug!(
            index = %self.name,
            parts = storages.len(),
            entries = sample.index_size,
            "Scan entries inserted"
        );

        let mut updates = self.updates.lock();
        updates.done_adding()?;
        let replayed = self.replay_updates(&updates, tree)?;
        debug!(index = %self.name, updates = replayed, "Update log replayed");
        Ok(sample)
    }

    /// Bulk inserts the merged scan storages, rejecting duplicate values in
    /// a unique index.
    fn insert_scan<W>(&self, scan: &[&BlockStorage<L>], tree: &mut W) -> Result<IndexSample>
    where
        W: TreeWriter<L::Key, L::Value>,
    {
        let layout = &*self.layout;
        let unique = layout.semantics() == IdSemantics::Unique;
        let mut merger = MergingBlockEntryReader::new(layout);
        for storage in scan {
            let mut blocks = storage.reader()?;
            while let Some(block) = blocks.next_block()? {
                merger.add_source(Box::new(block));
            }
            blocks.close();
        }

        let mut sample = IndexSample::default();
        let mut prev = layout.new_key();
        let mut has_prev = false;
        while merger.next()? {
            let key = merger.key();
            let same_value = has_prev && layout.compare_value(&prev, key) == Ordering::Equal;
            if same_value && unique && prev.entity_id() != key.entity_id() {
                return Err(ZyronError::IndexEntryConflict {
                    existing: prev.entity_id(),
                    added: key.entity_id(),
                    value: describe(key),
                });
            }
            if !same_value {
                sample.unique_values += 1;
            }
            tree.put(key, merger.value())?;
            sample.index_size += 1;
            layout.copy_key(key, &mut prev);
            has_prev = true;
        }
        merger.close();
        sample.sample_size = sample.index_size;
        Ok(sample)
    }

    /// Applies logged updates in order. Returns the number applied.
    ///
    /// In a unique index an added value that overwrites another entity's
    /// entry is a conflict.
    fn replay_updates<W>(&self, updates: &IndexUpdateStorage<L>, tree: &mut W) -> Result<u64>
    where
        W: TreeWriter<L::Key, L::Value>,
    {
        let unique = self.layout.semantics() == IdSemantics::Unique;
        let mut cursor = updates.cursor()?;
        let mut applied = 0u64;
        while cursor.next()? {
            match cursor.update_mode() {
                UpdateMode::Added => {
                    let replaced = tree.put(cursor.key(), cursor.value())?;
                    check_replaced(unique, replaced, cursor.key())?;
                }
                UpdateMode::Removed => {
                    tree.remove(cursor.key())?;
                }
                UpdateMode::Changed => {
                    tree.remove(cursor.key())?;
                    let replaced = tree.put(cursor.key2(), cursor.value())?;
                    check_replaced(unique, replaced, cursor.key2())?;
                }
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Snapshot of the index header.
    pub fn header(&self) -> IndexHeader {
        self.header.lock().clone()
    }

    /// Counters summed over every scan storage.
    pub fn scan_stats(&self) -> BlockStorageStats {
        let scan = self.scan.lock();
        let mut stats = BlockStorageStats::default();
        for part in &scan.parts {
            stats += part.lock().stats();
        }
        stats
    }

    /// Number of scan storages created so far.
    pub fn scan_part_count(&self) -> usize {
        self.scan.lock().parts.len()
    }

    /// Number of external updates logged.
    pub fn update_count(&self) -> u64 {
        self.updates.lock().count()
    }

    /// Removes the temp files. Safe to call twice.
    pub fn close(&self) -> Result<()> {
        let mut result = Ok(());
        for part in &self.scan.lock().parts {
            let closed = part.lock().close();
            result = result.and(closed);
        }
        let updates = self.updates.lock().close();
        result.and(updates)
    }
}

impl<L: Layout> Drop for BlockBasedPopulator<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(index = %self.name, error = %e, "Failed to remove population temp files");
        }
    }
}

/// Fails when a put in a unique index overwrote another entity's entry.
fn check_replaced<K: IndexKey>(unique: bool, replaced: Option<i64>, key: &K) -> Result<()> {
    match replaced {
        Some(existing) if unique && existing != key.entity_id() => {
            Err(ZyronError::IndexEntryConflict {
                existing,
                added: key.entity_id(),
                value: describe(key),
            })
        }
        _ => Ok(()),
    }
}

/// Renders the values of a key for error messages.
fn describe<K: IndexKey>(key: &K) -> String {
    match key.as_values() {
        Ok(values) => {
            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Err(_) => "<undecodable>".to_string(),
    }
}
