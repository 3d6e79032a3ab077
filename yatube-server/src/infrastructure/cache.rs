use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// TTL cache for rendered pages, keyed by request path + page number. Writes
/// never invalidate entries; stale HTML is served until expiry or an explicit
/// `clear`.
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    stored_at: Instant,
    body: String,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, body: String) {
        self.entries.lock().unwrap().insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                body,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
