//! Read/write selection policy that fills a batch.

use rand::Rng;

use crate::command::PendingCommand;
use crate::keygen::{derive_value, KeyGenerator};
use crate::oracle::Oracle;

/// Decides, slot by slot, whether a batch entry writes a fresh key or reads
/// one already in the oracle.
#[derive(Clone, Debug)]
pub struct BatchComposer {
    write_ratio: f64,
}

impl BatchComposer {
    /// `write_ratio` is the probability of a write once the oracle has entries.
    pub fn new(write_ratio: f64) -> Self {
        Self {
            write_ratio: write_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn write_ratio(&self) -> f64 {
        self.write_ratio
    }

    /// Compose `size` commands. Writes are recorded in the oracle as they are
    /// composed, so later slots of the same batch may read them.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        size: usize,
        oracle: &mut Oracle,
        keys: &mut KeyGenerator,
        rng: &mut R,
    ) -> Vec<PendingCommand> {
        (0..size)
            .map(|_| self.compose_one(oracle, keys, rng))
            .collect()
    }

    fn compose_one<R: Rng + ?Sized>(
        &self,
        oracle: &mut Oracle,
        keys: &mut KeyGenerator,
        rng: &mut R,
    ) -> PendingCommand {
        let draw: f64 = rng.gen();
        // Nothing to read yet, so the first command is always a write.
        if !oracle.is_empty() && draw >= self.write_ratio {
            if let Some((key, expected)) = oracle.pick_key_for_read(rng) {
                return PendingCommand::read(key.to_string(), expected.to_string());
            }
        }
        let key = keys.next_key(rng);
        oracle.record_write(key.clone(), derive_value(&key));
        PendingCommand::write(key)
    }
}
