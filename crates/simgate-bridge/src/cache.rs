//! Caller-side response cache.
//!
//! Entries are keyed by backend node plus a normalized request key
//! (`METHOD:endpoint?k=v&...` with parameters sorted by name) and expire
//! after a fixed TTL. Expired entries are ignored on read and removed by a
//! periodic sweep; reads never wait for the sweep.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::envelope::JsonObject;

/// Default time to live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Build the normalized request key.
pub fn cache_key(method: &str, endpoint: &str, params: &BTreeMap<String, String>) -> String {
    let mut key = format!("{}:{endpoint}", method.to_uppercase());
    let mut separator = '?';
    for (name, value) in params {
        key.push(separator);
        key.push_str(name);
        key.push('=');
        key.push_str(value);
        separator = '&';
    }
    key
}

#[derive(Debug, Clone)]
struct Entry {
    value: JsonObject,
    expires_at: Instant,
}

/// TTL cache of flattened bridge responses.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Arc<DashMap<(String, String), Entry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// The configured TTL.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A live entry for `(node, key)`.
    pub fn get(&self, node: &str, key: &str) -> Option<JsonObject> {
        let entry = self.entries.get(&(node.to_owned(), key.to_owned()))?;
        (entry.expires_at > Instant::now()).then(|| entry.value.clone())
    }

    /// Store `value` for `(node, key)`, replacing any previous entry.
    pub fn insert(&self, node: &str, key: &str, value: JsonObject) {
        let now = Instant::now();
        let expires_at = now.checked_add(self.ttl).unwrap_or(now);
        self.entries
            .insert((node.to_owned(), key.to_owned()), Entry { value, expires_at });
    }

    /// Remove expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep every `interval` on a background task.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(n: i64) -> JsonObject {
        let mut object = JsonObject::new();
        object.insert("n".to_owned(), json!(n));
        object
    }

    #[test]
    fn key_sorts_parameters() {
        let mut params = BTreeMap::new();
        params.insert("z".to_owned(), "1".to_owned());
        params.insert("a".to_owned(), "2".to_owned());
        assert_eq!(cache_key("get", "players", &params), "GET:players?a=2&z=1");
        assert_eq!(cache_key("GET", "server", &BTreeMap::new()), "GET:server");
    }

    #[test]
    fn entries_are_scoped_per_node() {
        let cache = ResponseCache::default();
        cache.insert("lobby", "GET:server", body(1));
        assert_eq!(cache.get("lobby", "GET:server"), Some(body(1)));
        assert!(cache.get("survival", "GET:server").is_none());
    }

    #[test]
    fn expired_entries_are_hidden_then_swept() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("lobby", "GET:server", body(1));
        assert!(cache.get("lobby", "GET:server").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("lobby", "GET:server", body(1));
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.get("lobby", "GET:server"), Some(body(1)));
    }
}
