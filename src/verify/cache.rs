//! Last-mile verification cache
//!
//! Keyed by the exact signed bytes plus the signature, so a hit is only ever
//! possible for a bit-identical repeated check. An optimization, never a
//! correctness requirement.

use std::collections::HashMap;

const DEFAULT_CAPACITY: usize = 4096;

pub(crate) struct VerifyCache {
    entries: HashMap<(Vec<u8>, Vec<u8>), bool>,
    capacity: usize,
}

impl VerifyCache {
    pub(crate) fn new() -> Self {
        VerifyCache {
            entries: HashMap::new(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub(crate) fn get(&self, payload: &[u8], signature: &[u8]) -> Option<bool> {
        self.entries
            .get(&(payload.to_vec(), signature.to_vec()))
            .copied()
    }

    pub(crate) fn insert(&mut self, payload: &[u8], signature: &[u8], valid: bool) {
        // Wholesale reset on overflow beats tracking recency for a cache
        // whose hits are exact repeats.
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries
            .insert((payload.to_vec(), signature.to_vec()), valid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_requires_exact_bytes() {
        let mut cache = VerifyCache::new();
        cache.insert(b"payload", b"sig", true);

        assert_eq!(cache.get(b"payload", b"sig"), Some(true));
        assert_eq!(cache.get(b"payload", b"other"), None);
        assert_eq!(cache.get(b"payloae", b"sig"), None);
    }

    #[test]
    fn test_overflow_clears() {
        let mut cache = VerifyCache {
            entries: HashMap::new(),
            capacity: 2,
        };
        cache.insert(b"a", b"s", true);
        cache.insert(b"b", b"s", false);
        cache.insert(b"c", b"s", true);
        assert_eq!(cache.get(b"a", b"s"), None);
        assert_eq!(cache.get(b"c", b"s"), Some(true));
    }
}
