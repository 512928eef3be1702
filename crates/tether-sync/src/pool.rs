//! Codec object pool: bounded free lists of wire records so high-frequency
//! encode/decode does not churn the allocator.
//!
//! One sub-pool per record kind, each behind its own lock, since encode and
//! decode run concurrently from the local-submit and remote-apply paths.
//! A pool miss allocates fresh; releasing into a full sub-pool just drops
//! the record.

use std::sync::Mutex;
use std::sync::PoisonError;

use crate::codec::{FlatEntry, TreePayload};
use crate::entity::{ItemTypeId, LocalId};

/// Default per-kind pool capacity.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Reusable
// ---------------------------------------------------------------------------

/// A record that can be recycled through a [`RecordPool`].
pub trait Reusable: Default {
    /// Clears every composite field. Invariant of `release`: a record is
    /// reset before it is pooled, so no field from a previous payload can
    /// leak into the next use.
    fn reset(&mut self);
}

impl Reusable for FlatEntry {
    fn reset(&mut self) {
        self.instance_id = LocalId(0);
        self.type_id = ItemTypeId(0);
        self.attributes.clear();
        self.slot_contents.clear();
        self.container_contents.clear();
        self.locked_positions.clear();
    }
}

impl Reusable for TreePayload {
    fn reset(&mut self) {
        self.root = LocalId(0);
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// RecordPool
// ---------------------------------------------------------------------------

/// A bounded free list of one record kind.
#[derive(Debug)]
pub struct RecordPool<T: Reusable> {
    free: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Reusable> RecordPool<T> {
    /// Creates a pool that retains at most `capacity` free records.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes a record from the free list, or allocates a fresh default.
    pub fn acquire(&self) -> T {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    /// Resets a record and returns it to the free list. Over-capacity
    /// releases drop the record instead.
    pub fn release(&self, mut record: T) {
        record.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(record);
        }
    }

    /// Number of records currently on the free list.
    pub fn pooled(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ---------------------------------------------------------------------------
// CodecObjectPool
// ---------------------------------------------------------------------------

/// Free-list occupancy, for diagnostics overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Pooled flat entries.
    pub pooled_entries: usize,
    /// Pooled payload shells.
    pub pooled_payloads: usize,
}

/// The sub-pools used by the tree codec: flat entries and payload shells.
/// Attribute, slot, and container records ride inside an entry's vectors and
/// keep their capacity across the entry's reset.
#[derive(Debug)]
pub struct CodecObjectPool {
    entries: RecordPool<FlatEntry>,
    payloads: RecordPool<TreePayload>,
}

impl CodecObjectPool {
    /// Creates a pool with [`DEFAULT_POOL_CAPACITY`] per record kind.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Creates a pool retaining at most `capacity` free records per kind.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RecordPool::new(capacity),
            payloads: RecordPool::new(capacity),
        }
    }

    /// Takes a cleared flat entry.
    pub fn acquire_entry(&self) -> FlatEntry {
        self.entries.acquire()
    }

    /// Recycles one flat entry.
    pub fn release_entry(&self, entry: FlatEntry) {
        self.entries.release(entry);
    }

    /// Takes a cleared payload shell.
    pub fn acquire_payload(&self) -> TreePayload {
        self.payloads.acquire()
    }

    /// Recycles a whole payload: its entries go back to the entry pool, the
    /// shell to the payload pool.
    pub fn release_payload(&self, mut payload: TreePayload) {
        for entry in payload.entries.drain(..) {
            self.entries.release(entry);
        }
        self.payloads.release(payload);
    }

    /// Current free-list occupancy.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pooled_entries: self.entries.pooled(),
            pooled_payloads: self.payloads.pooled(),
        }
    }
}

impl Default for CodecObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeRecord, WireValue};

    fn dirty_entry() -> FlatEntry {
        let mut entry = FlatEntry {
            instance_id: LocalId(42),
            type_id: ItemTypeId(7),
            ..Default::default()
        };
        entry.attributes.push(AttributeRecord {
            key: "count".into(),
            value: WireValue::Int(5),
        });
        entry.locked_positions.push(3);
        entry
    }

    #[test]
    fn test_release_resets_composite_fields() {
        let pool = CodecObjectPool::new();
        pool.release_entry(dirty_entry());

        let recycled = pool.acquire_entry();
        assert_eq!(recycled.instance_id, LocalId(0));
        assert_eq!(recycled.type_id, ItemTypeId(0));
        assert!(recycled.attributes.is_empty());
        assert!(recycled.locked_positions.is_empty());
    }

    #[test]
    fn test_acquire_prefers_pooled_record() {
        let pool = CodecObjectPool::new();
        assert_eq!(pool.stats().pooled_entries, 0);

        pool.release_entry(dirty_entry());
        assert_eq!(pool.stats().pooled_entries, 1);

        let _entry = pool.acquire_entry();
        assert_eq!(pool.stats().pooled_entries, 0);
    }

    #[test]
    fn test_over_capacity_release_drops_record() {
        let pool = CodecObjectPool::with_capacity(2);
        for _ in 0..5 {
            pool.release_entry(FlatEntry::default());
        }
        assert_eq!(pool.stats().pooled_entries, 2);
    }

    #[test]
    fn test_miss_allocates_fresh() {
        let pool = CodecObjectPool::with_capacity(0);
        // Cap of zero: nothing is ever pooled, acquire still works.
        pool.release_entry(dirty_entry());
        assert_eq!(pool.stats().pooled_entries, 0);
        let entry = pool.acquire_entry();
        assert!(entry.attributes.is_empty());
    }

    #[test]
    fn test_release_payload_recycles_entries() {
        let pool = CodecObjectPool::new();
        let mut payload = TreePayload {
            root: LocalId(1),
            entries: Vec::new(),
        };
        payload.entries.push(dirty_entry());
        payload.entries.push(dirty_entry());

        pool.release_payload(payload);
        let stats = pool.stats();
        assert_eq!(stats.pooled_entries, 2);
        assert_eq!(stats.pooled_payloads, 1);

        let payload = pool.acquire_payload();
        assert_eq!(payload.root, LocalId(0));
        assert!(payload.entries.is_empty());
    }

    #[test]
    fn test_concurrent_acquire_release() {
        use std::sync::Arc;

        let pool = Arc::new(CodecObjectPool::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    let entry = pool.acquire_entry();
                    pool.release_entry(entry);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.stats().pooled_entries <= DEFAULT_POOL_CAPACITY);
    }
}
