//! Key generators for columns the middleware fills in on `INSERT`.
//!
//! Snowflake IDs rely on 2 invariants:
//!
//! 1. Each process has a unique, numeric `worker_id`, not exceeding 1023.
//! 2. Each process has a reasonably accurate and synchronized
//!    clock, so `std::time::SystemTime` returns a good value.
//!
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shardroute_config::KeyGeneratorKind;
use thiserror::Error;
use uuid::Uuid;

use crate::value::Scalar;

const NODE_BITS: u64 = 10; // Max 1023 workers
const SEQUENCE_BITS: u64 = 12;
const TIMESTAMP_BITS: u64 = 41; // ~69 years, keeps i64 sign bit clear
const MAX_NODE_ID: u64 = (1 << NODE_BITS) - 1; // 1023
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1; // 4095
const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;
const EPOCH: u64 = 1767225600000; // Thursday, January 1, 2026 12:00:00 AM GMT
const NODE_SHIFT: u8 = SEQUENCE_BITS as u8; // 12
const TIMESTAMP_SHIFT: u8 = (SEQUENCE_BITS + NODE_BITS) as u8; // 22

#[derive(Debug, Error)]
pub enum Error {
    #[error("worker ID exceeding maximum (1023): {0}")]
    NodeIdTooLarge(u64),

    #[error("clock is outside the snowflake epoch: {0}ms")]
    ClockOutOfRange(u64),

    #[error("increment key generator exhausted")]
    Exhausted,
}

/// Source of generated key values.
pub trait KeyGenerator: Send + Sync + Debug {
    /// Next key. Must be unique across threads.
    fn next_key(&self) -> Result<Scalar, Error>;
}

/// Create a key generator.
pub fn build(kind: &KeyGeneratorKind, worker_id: u64) -> Result<Arc<dyn KeyGenerator>, Error> {
    Ok(match kind {
        KeyGeneratorKind::Snowflake => Arc::new(Snowflake::new(worker_id)?),
        KeyGeneratorKind::Increment { start } => Arc::new(Increment::new(*start)),
        KeyGeneratorKind::Uuid => Arc::new(UuidGenerator),
    })
}

#[derive(Debug, Default)]
struct State {
    last_timestamp_ms: u64,
    sequence: u64,
}

impl State {
    // Generate next ID in a distributed sequence.
    // The `node_id` argument must be globally unique.
    fn next_id(&mut self, node_id: u64) -> Result<u64, Error> {
        let mut now = wait_until(self.last_timestamp_ms);

        if now == self.last_timestamp_ms {
            self.sequence = (self.sequence + 1) & MAX_SEQUENCE;
            // Wraparound.
            if self.sequence == 0 {
                now = wait_until(now + 1);
            }
        } else {
            // Reset sequence to zero once we reach next ms.
            self.sequence = 0;
        }

        self.last_timestamp_ms = now;

        let elapsed = self
            .last_timestamp_ms
            .checked_sub(EPOCH)
            .filter(|elapsed| *elapsed <= MAX_TIMESTAMP)
            .ok_or(Error::ClockOutOfRange(self.last_timestamp_ms))?;

        let timestamp_part = elapsed << TIMESTAMP_SHIFT;
        let node_part = node_id << NODE_SHIFT;

        Ok(timestamp_part | node_part | self.sequence)
    }
}

// Get current time in ms.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or_default()
}

// Get a monotonically increasing timestamp in ms.
// Protects against clock drift.
fn wait_until(target_ms: u64) -> u64 {
    loop {
        let now = now_ms();
        if now >= target_ms {
            return now;
        }
        sleep(Duration::from_millis(1));
    }
}

/// 64-bit time-ordered IDs.
#[derive(Debug)]
pub struct Snowflake {
    node_id: u64,
    state: Mutex<State>,
}

impl Snowflake {
    pub fn new(node_id: u64) -> Result<Self, Error> {
        if node_id > MAX_NODE_ID {
            return Err(Error::NodeIdTooLarge(node_id));
        }

        Ok(Self {
            node_id,
            state: Mutex::new(State::default()),
        })
    }
}

impl KeyGenerator for Snowflake {
    fn next_key(&self) -> Result<Scalar, Error> {
        let id = self.state.lock().next_id(self.node_id)?;
        Ok(Scalar::Integer(id as i64))
    }
}

/// Process-local counter.
#[derive(Debug)]
pub struct Increment {
    next: AtomicI64,
}

impl Increment {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl KeyGenerator for Increment {
    fn next_key(&self) -> Result<Scalar, Error> {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        if value == i64::MAX {
            return Err(Error::Exhausted);
        }
        Ok(Scalar::Integer(value))
    }
}

/// Random UUIDv4.
#[derive(Debug)]
pub struct UuidGenerator;

impl KeyGenerator for UuidGenerator {
    fn next_key(&self) -> Result<Scalar, Error> {
        Ok(Scalar::Text(Uuid::new_v4().to_string()))
    }
}
