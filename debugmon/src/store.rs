//! Bounded, insertion-ordered entry store.
//!
//! A [`Store`] keeps at most `capacity` entries. Each [`add`](Store::add)
//! assigns a fresh [`EntryId`], appends the entry at the tail and, once the
//! store is over capacity, evicts the oldest entry from the head. Reads come
//! in three shapes:
//!
//! - [`latest`](Store::latest): newest first, for an initial page load
//! - [`since`](Store::since): everything after a cursor, oldest first, for polling
//! - [`get`](Store::get): a single entry by id
//!
//! Push consumers use [`subscribe_add`](Store::subscribe_add) and
//! [`subscribe_clear`](Store::subscribe_clear) instead of polling.
//!
//! # Design
//!
//! The ordered structure is a `VecDeque` of shared entries. The id index
//! maps each id to its absolute insertion position; subtracting the position
//! of the current head gives the deque offset, so lookup, append and
//! eviction are all O(1). Both live behind one `RwLock` and are only ever
//! modified together. Producers serialize on a separate mutex while an id
//! is generated, and take the write lock only to push and evict, so readers
//! never wait on a stalled generator. Notifications are sent after both
//! locks are released, so a subscriber may call back into the store.
//!
//! # Example
//!
//! ```rust
//! use debugmon::id::{EntryId, SequenceGenerator};
//! use debugmon::store::Store;
//!
//! # fn main() -> debugmon::Result<()> {
//! let store = Store::with_generator(3, SequenceGenerator::new());
//! let first = store.add("a")?;
//! for payload in ["b", "c", "d"] {
//!     store.add(payload)?;
//! }
//!
//! assert_eq!(store.len(), 3);
//! assert!(store.get(first).is_none()); // evicted
//!
//! let newer: Vec<_> = store.since(first).iter().map(|e| *e.payload()).collect();
//! assert_eq!(newer, ["b", "c", "d"]);
//!
//! let newest: Vec<_> = store.latest(2).iter().map(|e| e.id()).collect();
//! assert_eq!(newest, [EntryId::new(4), EntryId::new(3)]);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::Result;
use crate::event::{Broadcaster, Cleared, DEFAULT_SUBSCRIBER_BUFFER, Subscription};
use crate::id::{EntryId, IdGenerator, SnowflakeGenerator};

/// Capacity used when a store is configured with zero capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One stored record. Entries are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<P> {
    id: EntryId,
    payload: P,
}

impl<P> Entry<P> {
    /// Returns the entry id.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Returns the stored payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// Construction options for a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum number of retained entries; zero selects [`DEFAULT_CAPACITY`].
    pub capacity: usize,
    /// Per-subscriber notification queue length; zero selects
    /// [`DEFAULT_SUBSCRIBER_BUFFER`].
    pub subscriber_buffer: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// The order structure and id index, always updated as a pair.
struct Entries<P> {
    order: VecDeque<Arc<Entry<P>>>,
    /// Id to absolute insertion position.
    index: HashMap<EntryId, usize>,
    /// Absolute insertion position of `order[0]`.
    head: usize,
}

impl<P> Entries<P> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            // Large capacities grow on demand.
            order: VecDeque::with_capacity(capacity.min(1024)),
            index: HashMap::with_capacity(capacity.min(1024)),
            head: 0,
        }
    }

    fn push(&mut self, entry: Arc<Entry<P>>) {
        self.index.insert(entry.id, self.head + self.order.len());
        self.order.push_back(entry);
    }

    fn evict_oldest(&mut self) -> Option<Arc<Entry<P>>> {
        let oldest = self.order.pop_front()?;
        self.index.remove(&oldest.id);
        self.head += 1;
        Some(oldest)
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        self.index.get(&id).map(|absolute| absolute - self.head)
    }

    fn clear(&mut self) -> usize {
        let removed = self.order.len();
        self.order.clear();
        self.index.clear();
        self.head = 0;
        removed
    }
}

/// Bounded, concurrent, append-only entry store.
///
/// `P` is the payload type; the store never inspects it. `G` is the id
/// strategy and is fixed per store, so every id a store issues is
/// comparable with every other.
///
/// # Thread Safety
///
/// All methods take `&self`. Writers serialize on a producer mutex for the
/// whole generate-insert-evict sequence, so stored order matches id order.
/// The entry lock is held exclusively only for insert and evict; readers
/// share it. Share a store between threads with `Arc<Store<P, G>>`.
pub struct Store<P, G = SnowflakeGenerator> {
    capacity: usize,
    /// Held by `add` and `clear`; always taken before `entries`.
    add_lock: Mutex<()>,
    entries: RwLock<Entries<P>>,
    generator: G,
    added: Broadcaster<Arc<Entry<P>>>,
    cleared: Broadcaster<Cleared>,
}

impl<P, G> std::fmt::Debug for Store<P, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.read().order.len())
            .field("added", &self.added)
            .field("cleared", &self.cleared)
            .finish_non_exhaustive()
    }
}

impl<P: Send + Sync + 'static> Store<P> {
    /// Creates a store with Snowflake ids.
    ///
    /// A `capacity` of zero selects [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self::with_generator(capacity, SnowflakeGenerator::new())
    }

    /// Creates a store with Snowflake ids from explicit options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self::with_options_and_generator(options, SnowflakeGenerator::new())
    }
}

impl<P: Send + Sync + 'static, G: IdGenerator> Store<P, G> {
    /// Creates a store using the given id generator.
    pub fn with_generator(capacity: usize, generator: G) -> Self {
        Self::with_options_and_generator(
            StoreOptions {
                capacity,
                ..StoreOptions::default()
            },
            generator,
        )
    }

    /// Creates a store from explicit options and an id generator.
    pub fn with_options_and_generator(options: StoreOptions, generator: G) -> Self {
        let capacity = if options.capacity == 0 {
            tracing::debug!(default = DEFAULT_CAPACITY, "zero store capacity, using default");
            DEFAULT_CAPACITY
        } else {
            options.capacity
        };

        Self {
            capacity,
            add_lock: Mutex::new(()),
            entries: RwLock::new(Entries::with_capacity(capacity)),
            generator,
            added: Broadcaster::new(options.subscriber_buffer),
            cleared: Broadcaster::new(options.subscriber_buffer),
        }
    }

    /// Stores a payload and returns its newly assigned id.
    ///
    /// Evicts the oldest entry when the store is over capacity, then
    /// notifies add subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`](crate::error::IdError) if the generator cannot
    /// produce an id. Nothing is stored in that case.
    pub fn add(&self, payload: P) -> Result<EntryId> {
        let entry = {
            let _producer = self.add_lock.lock();
            let id = self.generator.next_id()?;
            let entry = Arc::new(Entry { id, payload });

            let mut entries = self.entries.write();
            entries.push(Arc::clone(&entry));
            if entries.order.len() > self.capacity {
                if let Some(evicted) = entries.evict_oldest() {
                    tracing::trace!(id = %evicted.id, "evicted oldest entry");
                }
            }
            entry
        };

        tracing::trace!(id = %entry.id, "entry added");
        self.added.notify(&entry);
        Ok(entry.id)
    }

    /// Returns up to `n` of the most recent entries, newest first.
    pub fn latest(&self, n: usize) -> Vec<Arc<Entry<P>>> {
        let entries = self.entries.read();
        entries.order.iter().rev().take(n).cloned().collect()
    }

    /// Returns every retained entry with an id greater than `cursor`,
    /// oldest first.
    ///
    /// [`EntryId::ZERO`] returns everything. A cursor that has been evicted
    /// (or was never issued) still yields exactly the retained entries
    /// after it.
    pub fn since(&self, cursor: EntryId) -> Vec<Arc<Entry<P>>> {
        let entries = self.entries.read();
        let start = match entries.position(cursor) {
            Some(position) => position + 1,
            None => entries.order.partition_point(|entry| entry.id <= cursor),
        };
        entries.order.range(start..).cloned().collect()
    }

    /// Looks up a retained entry by id.
    pub fn get(&self, id: EntryId) -> Option<Arc<Entry<P>>> {
        let entries = self.entries.read();
        let position = entries.position(id)?;
        entries.order.get(position).cloned()
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    /// Returns whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().order.is_empty()
    }

    /// Returns the maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the queue length given to each new subscriber.
    pub fn subscriber_buffer(&self) -> usize {
        self.added.buffer()
    }

    /// Returns the id of the oldest retained entry.
    pub fn oldest_id(&self) -> Option<EntryId> {
        self.entries.read().order.front().map(|entry| entry.id)
    }

    /// Returns the id of the newest retained entry.
    pub fn newest_id(&self) -> Option<EntryId> {
        self.entries.read().order.back().map(|entry| entry.id)
    }

    /// Removes every entry and resets the id generator.
    ///
    /// Returns the number of removed entries. Clear subscribers are notified
    /// after the store has been emptied.
    pub fn clear(&self) -> usize {
        let removed = {
            let _producer = self.add_lock.lock();
            let mut entries = self.entries.write();
            let removed = entries.clear();
            self.generator.reset();
            removed
        };

        tracing::debug!(removed, "store cleared");
        self.cleared.notify(&Cleared { removed });
        removed
    }

    /// Subscribes to newly added entries.
    pub fn subscribe_add(&self) -> Subscription<Arc<Entry<P>>> {
        self.added.subscribe()
    }

    /// Subscribes to clear signals.
    pub fn subscribe_clear(&self) -> Subscription<Cleared> {
        self.cleared.subscribe()
    }

    /// Returns the number of live add subscribers.
    pub fn add_subscriber_count(&self) -> usize {
        self.added.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DebugMonitorError, IdError};
    use crate::event::TryRecvError;
    use crate::id::SequenceGenerator;

    fn counter_store<P: Send + Sync + 'static>(capacity: usize) -> Store<P, SequenceGenerator> {
        Store::with_generator(capacity, SequenceGenerator::new())
    }

    fn ids<P>(entries: &[Arc<Entry<P>>]) -> Vec<i64> {
        entries.iter().map(|entry| entry.id().get()).collect()
    }

    /// Generator that always fails, standing in for an entropy-backed source.
    struct FailingGenerator;

    impl IdGenerator for FailingGenerator {
        fn next_id(&self) -> std::result::Result<EntryId, IdError> {
            Err(IdError::ClockBeforeEpoch {
                now_ms: 0,
                epoch_ms: 1,
            })
        }

        fn reset(&self) {}
    }

    #[test]
    fn test_empty_store() {
        let store = counter_store::<&str>(10);

        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.latest(5).is_empty());
        assert!(store.since(EntryId::ZERO).is_empty());
        assert_eq!(store.oldest_id(), None);
        assert_eq!(store.newest_id(), None);
    }

    #[test]
    fn test_capacity_three_scenario() {
        let store = counter_store(3);
        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        store.add("c").unwrap();
        store.add("d").unwrap();

        assert_eq!(store.len(), 3);

        let latest: Vec<_> = store.latest(10).iter().map(|e| *e.payload()).collect();
        assert_eq!(latest, ["d", "c", "b"]);

        let since: Vec<_> = store.since(a).iter().map(|e| *e.payload()).collect();
        assert_eq!(since, ["b", "c", "d"]);

        assert!(store.get(a).is_none());
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let store = counter_store(0);
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);

        for i in 0..=DEFAULT_CAPACITY {
            store.add(i).unwrap();
        }
        assert_eq!(store.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_latest_order_and_bounds() {
        let store = counter_store(10);
        for i in 0..5 {
            store.add(i).unwrap();
        }

        assert_eq!(ids(&store.latest(3)), [5, 4, 3]);
        assert_eq!(ids(&store.latest(5)), [5, 4, 3, 2, 1]);
        assert_eq!(ids(&store.latest(100)), [5, 4, 3, 2, 1]);
        assert!(store.latest(0).is_empty());
    }

    #[test]
    fn test_since_retained_cursor() {
        let store = counter_store(10);
        for i in 0..5 {
            store.add(i).unwrap();
        }

        assert_eq!(ids(&store.since(EntryId::ZERO)), [1, 2, 3, 4, 5]);
        assert_eq!(ids(&store.since(EntryId::new(2))), [3, 4, 5]);
        assert!(store.since(EntryId::new(5)).is_empty());
        assert!(store.since(EntryId::new(99)).is_empty());
    }

    #[test]
    fn test_since_evicted_cursor() {
        let store = counter_store(3);
        for i in 0..6 {
            store.add(i).unwrap();
        }

        // Retained: 4, 5, 6.
        assert_eq!(ids(&store.since(EntryId::new(1))), [4, 5, 6]);
        assert_eq!(ids(&store.since(EntryId::new(3))), [4, 5, 6]);
        assert_eq!(ids(&store.since(EntryId::new(-7))), [4, 5, 6]);
    }

    #[test]
    fn test_since_sparse_ids() {
        // Snowflake ids are not contiguous; cursors between ids still work.
        let store: Store<u32> = Store::new(10);
        let first = store.add(1).unwrap();
        let second = store.add(2).unwrap();
        store.add(3).unwrap();

        let between = EntryId::new(first.get() + 1);
        let result = store.since(between);
        let expected_start = if between < second { 2 } else { 3 };
        assert_eq!(*result[0].payload(), expected_start);
    }

    #[test]
    fn test_get_by_id() {
        let store = counter_store(2);
        let first = store.add("first").unwrap();
        let second = store.add("second").unwrap();

        assert_eq!(*store.get(first).unwrap().payload(), "first");
        assert_eq!(store.get(second).unwrap().id(), second);

        store.add("third").unwrap();
        assert!(store.get(first).is_none());
        assert!(store.get(EntryId::new(404)).is_none());
    }

    #[test]
    fn test_index_tracks_positions_across_many_evictions() {
        let store = counter_store(4);
        for i in 0..1000 {
            store.add(i).unwrap();
        }
        for id in 997..=1000 {
            let entry = store.get(EntryId::new(id)).unwrap();
            assert_eq!(entry.id().get(), id);
            assert_eq!(*entry.payload(), id - 1);
        }
        assert_eq!(store.oldest_id(), Some(EntryId::new(997)));
        assert_eq!(store.newest_id(), Some(EntryId::new(1000)));
    }

    #[test]
    fn test_clear_resets_counter_ids() {
        let store = counter_store(10);
        for i in 0..4 {
            store.add(i).unwrap();
        }

        assert_eq!(store.clear(), 4);
        assert!(store.is_empty());
        assert!(store.since(EntryId::ZERO).is_empty());
        assert!(store.get(EntryId::new(1)).is_none());

        assert_eq!(store.add(42).unwrap(), EntryId::new(1));
        assert_eq!(ids(&store.since(EntryId::ZERO)), [1]);
    }

    #[test]
    fn test_clear_keeps_snowflake_ids_increasing() {
        let store: Store<u32> = Store::new(10);
        let before = store.add(1).unwrap();
        store.clear();
        let after = store.add(2).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_failed_id_generation_stores_nothing() {
        let store = Store::with_generator(4, FailingGenerator);
        let result = store.add("lost");

        assert!(matches!(result, Err(DebugMonitorError::Id(_))));
        assert!(store.is_empty());
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn test_reads_do_not_wait_on_id_generation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::{Duration, Instant};

        // First reading is 300 ms ahead; later readings follow real time,
        // so the second id has to wait for the clock to catch up.
        let base = crate::id::ID_EPOCH_MS + 1_000_000;
        let start = Instant::now();
        let calls = AtomicUsize::new(0);
        let clock = move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                base + 300
            } else {
                base + start.elapsed().as_millis() as i64
            }
        };
        let store = Arc::new(Store::with_generator(
            10,
            SnowflakeGenerator::with_clock(clock),
        ));
        let first = store.add(1).unwrap();

        let producer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.add(2).unwrap())
        };
        std::thread::sleep(Duration::from_millis(30));

        let read_started = Instant::now();
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest(5).len(), 1);
        assert!(store.get(first).is_some());
        let waited = read_started.elapsed();
        assert!(
            waited < Duration::from_millis(100),
            "reads waited {waited:?} behind id generation"
        );

        let second = producer.join().unwrap();
        assert!(second > first);
        assert_eq!(ids(&store.since(EntryId::ZERO)), [first.get(), second.get()]);
    }

    #[test]
    fn test_add_notifies_subscriber() {
        let store = counter_store(4);
        let mut subscription = store.subscribe_add();

        let id = store.add("hello").unwrap();
        let entry = subscription.try_recv().unwrap();

        assert_eq!(entry.id(), id);
        assert_eq!(*entry.payload(), "hello");
    }

    #[test]
    fn test_clear_notifies_subscriber() {
        let store = counter_store(4);
        let mut cleared = store.subscribe_clear();
        store.add(1).unwrap();
        store.add(2).unwrap();

        store.clear();
        assert_eq!(cleared.try_recv(), Ok(Cleared { removed: 2 }));
        assert_eq!(cleared.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_subscriber_may_reenter_store() {
        let store = Arc::new(counter_store(4));
        let mut subscription = store.subscribe_add();
        store.add("x").unwrap();

        let entry = subscription.try_recv().unwrap();
        // Reads do not deadlock against the producer that notified us.
        assert_eq!(store.get(entry.id()).unwrap().id(), entry.id());
        store.add("y").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_entry_serializes_id_and_payload() {
        let store = counter_store(1);
        store.add(serde_json::json!({"method": "GET"})).unwrap();
        let entry = store.latest(1).remove(0);

        let json = serde_json::to_value(&*entry).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "payload": {"method": "GET"}}));
    }
}
