use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub ttl: ChronoDuration,
}

impl CacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.created_at + self.ttl
    }
}

/// Query-result cache owned by exactly one repository. Staleness is decided at
/// read time; nothing sweeps expired entries in the background.
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl QueryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(300));
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Arc::new(SystemClock))
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl > ChronoDuration::zero()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        let now = self.clock.now();
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: String, value: Value) {
        if !self.is_enabled() {
            return;
        }
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl: self.ttl,
        };
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key, entry);
    }

    pub fn invalidate_all(&self) {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
    }

    pub fn len(&self) -> usize {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn cache_key(model: &str, operation: &str, signature: &Value) -> String {
    // serde_json maps are ordered, so equal signatures serialize identically
    let canonical = signature.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{model}:{operation}:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct FixedClock(StdMutex<DateTime<Utc>>);

    impl FixedClock {
        fn advance(&self, seconds: i64) {
            let mut guard = self.0.lock().unwrap();
            *guard += ChronoDuration::seconds(seconds);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn entries_expire_exactly_at_ttl() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let cache = QueryCache::new(Duration::from_secs(300), clock.clone());
        cache.put("k".into(), json!([1, 2]));

        clock.advance(299);
        assert_eq!(cache.get("k"), Some(json!([1, 2])));

        clock.advance(1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache = QueryCache::disabled();
        cache.put("k".into(), json!(1));
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn keys_ignore_object_field_order() {
        let a = cache_key("Requests", "list", &json!({"filter": {"a": 1, "b": 2}}));
        let b = cache_key("Requests", "list", &json!({"filter": {"b": 2, "a": 1}}));
        let c = cache_key("Requests", "list", &json!({"filter": {"a": 2}}));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("Requests:list:"));
    }
}
