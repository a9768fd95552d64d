use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, Duration, Utc};

/// TTL-bounded fingerprint cache. A hit means the same attention batch was
/// processed recently and the decision/mutation steps can be skipped.
/// Shared process-wide; expired entries are swept at the start of each
/// driver tick.
pub struct DedupCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::milliseconds(ttl_ms as i64),
        }
    }

    pub fn is_duplicate(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(fingerprint)
            .map_or(false, |seen| now - *seen <= self.ttl)
    }

    pub fn record(&self, fingerprint: &str, now: DateTime<Utc>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(fingerprint.to_string(), now);
    }

    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, seen| now - *seen <= self.ttl);
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn recorded_fingerprint_is_duplicate_within_ttl() {
        let cache = DedupCache::new(5 * 60 * 1000);
        cache.record("fp1", at(0));

        assert!(cache.is_duplicate("fp1", at(60)));
        assert!(cache.is_duplicate("fp1", at(300)));
        assert!(!cache.is_duplicate("fp1", at(301)));
        assert!(!cache.is_duplicate("fp2", at(60)));
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let cache = DedupCache::new(5 * 60 * 1000);
        cache.record("old", at(0));
        cache.record("new", at(290));

        cache.sweep(at(301));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_duplicate("new", at(301)));
        assert!(!cache.is_duplicate("old", at(301)));
    }
}
