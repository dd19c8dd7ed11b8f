//! Worker-local record of every value this worker has written.
//!
//! Entries are only ever appended. There is no update or delete because the
//! exerciser never issues either, so the value recorded at write time is the
//! only value a later read may return.

use rand::Rng;

/// Append-only `(key, value)` pairs, one per issued write.
#[derive(Debug, Default)]
pub struct Oracle {
    entries: Vec<(String, String)>,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write. The key must be fresh; `KeyGenerator` guarantees that.
    pub fn record_write(&mut self, key: String, value: String) {
        self.entries.push((key, value));
    }

    /// Uniformly pick a recorded entry. Returns `None` when nothing was written yet.
    pub fn pick_key_for_read<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(&str, &str)> {
        if self.entries.is_empty() {
            return None;
        }
        let (key, value) = &self.entries[rng.gen_range(0..self.entries.len())];
        Some((key.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn empty_oracle_has_nothing_to_read() {
        let oracle = Oracle::new();
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(oracle.is_empty());
        assert!(oracle.pick_key_for_read(&mut rng).is_none());
    }

    #[test]
    fn pick_returns_recorded_pairs() {
        let mut oracle = Oracle::new();
        oracle.record_write("a".into(), "value_a".into());
        oracle.record_write("b".into(), "value_b".into());
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..100 {
            let (key, value) = oracle.pick_key_for_read(&mut rng).expect("non-empty");
            assert_eq!(value, format!("value_{key}"));
        }
        assert_eq!(oracle.len(), 2);
    }

    #[test]
    fn pick_covers_every_entry() {
        let mut oracle = Oracle::new();
        for i in 0..8 {
            oracle.record_write(format!("k{i}"), format!("v{i}"));
        }
        let mut rng = SmallRng::seed_from_u64(42);
        let mut hits: HashMap<String, usize> = HashMap::new();
        for _ in 0..4_000 {
            let (key, _) = oracle.pick_key_for_read(&mut rng).expect("non-empty");
            *hits.entry(key.to_string()).or_default() += 1;
        }
        assert_eq!(hits.len(), 8);
        // 500 expected per key; a uniform pick stays well inside this band.
        assert!(hits.values().all(|&n| (350..=650).contains(&n)), "{hits:?}");
    }
}
