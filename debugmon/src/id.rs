//! Entry id generation.
//!
//! Every entry stored in a [`Store`](crate::store::Store) is tagged with an
//! [`EntryId`] produced by an [`IdGenerator`]. Two generators are provided:
//!
//! - [`SequenceGenerator`]: an atomic counter yielding 1, 2, 3, ...
//! - [`SnowflakeGenerator`]: a time-ordered 64-bit id, the store default
//!
//! # Snowflake Layout
//!
//! ```text
//!  63 62                                            12 11          0
//! ┌──┬───────────────────────────────────────────────┬─────────────┐
//! │ 0│ milliseconds since ID_EPOCH_MS (51 bits)      │ sequence    │
//! └──┴───────────────────────────────────────────────┴─────────────┘
//! ```
//!
//! The sequence counts ids issued within one millisecond. When it would
//! overflow, generation waits for the next millisecond. When the wall clock
//! steps backward, generation waits until it has caught up with the last
//! issued timestamp. Either way a single generator never issues a duplicate
//! or a smaller id.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Custom epoch for Snowflake ids: 2024-01-01T00:00:00Z in Unix milliseconds.
pub const ID_EPOCH_MS: i64 = 1_704_067_200_000;

/// Number of low bits holding the per-millisecond sequence.
pub const SEQUENCE_BITS: u32 = 12;

/// Largest sequence value within one millisecond.
pub const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;

/// Sleep between clock reads while waiting out a backward clock step.
const BACKWARD_CLOCK_POLL: Duration = Duration::from_millis(1);

/// Identifier of a stored entry.
///
/// Ids issued by one store are strictly increasing in insertion order, so an
/// id doubles as a pagination cursor: "everything after this id".
/// [`EntryId::ZERO`] sorts before every issued id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// The cursor that precedes every entry.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw id value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for EntryId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Source of entry ids for a store.
///
/// Implementations provide their own mutual exclusion so that a generator
/// can be shared between threads. A store calls [`next_id`](Self::next_id)
/// while holding its write lock, so ids are also ordered with respect to
/// insertion.
pub trait IdGenerator: Send + Sync {
    /// Returns an id strictly greater than every id previously returned
    /// since construction or the last [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if no id can be produced. The caller must treat
    /// the entry as not stored.
    fn next_id(&self) -> Result<EntryId, IdError>;

    /// Resets generator state after the owning store has been cleared.
    fn reset(&self);
}

/// Auto-increment id generator.
///
/// Produces contiguous ids starting from 1. [`reset`](IdGenerator::reset)
/// restarts numbering at 1.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    current: AtomicI64,
}

impl SequenceGenerator {
    /// Creates a generator whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequenceGenerator {
    fn next_id(&self) -> Result<EntryId, IdError> {
        Ok(EntryId(self.current.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
    }
}

/// Wall-clock source for [`SnowflakeGenerator`], in Unix milliseconds.
///
/// Any `Fn() -> i64` closure is a clock, which is how tests script clock
/// steps.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)] // i64 milliseconds cover ~292 million years
    fn now_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        }
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_ms(&self) -> i64 {
        self()
    }
}

#[derive(Debug)]
struct SnowflakeState {
    /// Milliseconds since [`ID_EPOCH_MS`] of the last issued id, -1 before the first.
    last_timestamp: i64,
    /// Sequence of the last issued id within `last_timestamp`.
    sequence: i64,
}

/// Time-ordered id generator.
///
/// See the [module documentation](self) for the bit layout. Ids keep
/// increasing across [`reset`](IdGenerator::reset): the timestamp
/// high-water mark survives a store clear so that cursors held by consumers
/// never point past freshly issued ids.
#[derive(Debug)]
pub struct SnowflakeGenerator<C: Clock = SystemClock> {
    clock: C,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    /// Creates a generator reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SnowflakeGenerator<C> {
    /// Creates a generator reading the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(SnowflakeState {
                last_timestamp: -1,
                sequence: 0,
            }),
        }
    }

    /// Reads the clock relative to [`ID_EPOCH_MS`].
    fn timestamp(&self) -> Result<i64, IdError> {
        let now_ms = self.clock.now_ms();
        if now_ms < ID_EPOCH_MS {
            return Err(IdError::ClockBeforeEpoch {
                now_ms,
                epoch_ms: ID_EPOCH_MS,
            });
        }
        Ok(now_ms - ID_EPOCH_MS)
    }

    /// Blocks until the clock reads at least `target`, returning that reading.
    fn wait_until(&self, target: i64, poll: Option<Duration>) -> Result<i64, IdError> {
        loop {
            let timestamp = self.timestamp()?;
            if timestamp >= target {
                return Ok(timestamp);
            }
            match poll {
                Some(interval) => std::thread::sleep(interval),
                None => std::thread::yield_now(),
            }
        }
    }
}

impl<C: Clock> IdGenerator for SnowflakeGenerator<C> {
    fn next_id(&self) -> Result<EntryId, IdError> {
        let mut state = self.state.lock();
        let mut timestamp = self.timestamp()?;

        if timestamp < state.last_timestamp {
            tracing::warn!(
                behind_ms = state.last_timestamp - timestamp,
                "clock moved backward, waiting before issuing the next id"
            );
            timestamp = self.wait_until(state.last_timestamp, Some(BACKWARD_CLOCK_POLL))?;
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence space for this millisecond is exhausted.
                timestamp = self.wait_until(state.last_timestamp + 1, None)?;
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;
        Ok(EntryId((timestamp << SEQUENCE_BITS) | state.sequence))
    }

    fn reset(&self) {}
}

/// Decodes the wall-clock time embedded in a Snowflake id.
pub fn extract_timestamp(id: EntryId) -> SystemTime {
    let unix_ms = (id.get() >> SEQUENCE_BITS) + ID_EPOCH_MS;
    UNIX_EPOCH + Duration::from_millis(u64::try_from(unix_ms).unwrap_or(0))
}

/// Decodes the per-millisecond sequence of a Snowflake id.
pub fn extract_sequence(id: EntryId) -> i64 {
    id.get() & MAX_SEQUENCE
}
