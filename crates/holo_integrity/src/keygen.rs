//! Key and value generation for integrity writes.
//!
//! Keys never repeat within a generator: every key carries the generator's
//! worker id and a monotonically increasing sequence number. The wall-clock
//! millisecond and a random word keep separate runs against the same store
//! from colliding.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Default namespace for generated keys.
pub const DEFAULT_KEY_PREFIX: &str = "key_";

/// Prefix prepended to a key to derive its value.
const VALUE_PREFIX: &str = "value_";

/// Per-worker source of fresh keys.
#[derive(Clone, Debug)]
pub struct KeyGenerator {
    prefix: String,
    worker: usize,
    seq: u64,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>, worker: usize) -> Self {
        Self {
            prefix: prefix.into(),
            worker,
            seq: 0,
        }
    }

    /// Produce a key that this generator has never produced before.
    pub fn next_key<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        self.seq += 1;
        let nonce: u32 = rng.gen();
        format!(
            "{}{}_{nonce:08x}_w{}_{}",
            self.prefix,
            unix_time_ms(),
            self.worker,
            self.seq
        )
    }
}

/// Value written for `key`. Pure, so the oracle and the wire always agree.
pub fn derive_value(key: &str) -> String {
    format!("{VALUE_PREFIX}{key}")
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
