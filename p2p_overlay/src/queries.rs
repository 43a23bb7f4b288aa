//! The query cache and query-status cache. Used for both hash queries
//! (QUERY/QUERY_HIT) and name searches (NAME_SEARCH/NAME_SEARCH_HIT) — both are
//! canonical-string-keyed flood-and-dedupe caches with identical eviction behavior,
//! so one type serves both.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{unix_timestamp, Prev, QueryEntry, QueryStatus};

pub struct QueryCache {
    queries: Mutex<HashMap<String, QueryEntry>>,
    statuses: Mutex<HashMap<String, QueryStatus>>,
}

impl QueryCache {
    pub fn new() -> QueryCache {
        QueryCache { queries: Mutex::new(HashMap::new()), statuses: Mutex::new(HashMap::new()) }
    }

    /// Atomic check-and-insert under the queries mutex. Returns `false` if `canon`
    /// was already present
    /// (loop suppression / duplicate query) and does not touch anything; `true` on
    /// first observation, after which a matching `QueryStatus{success: false}` is
    /// recorded.
    pub fn observe(&self, canon: &str, prev: Prev, ttl: i32) -> bool {
        {
            let mut queries = self.queries.lock().unwrap();
            if queries.contains_key(canon) {
                return false;
            }
            queries.insert(canon.to_owned(), QueryEntry { prev, ttl, inserted_at: unix_timestamp() });
        }
        let mut statuses = self.statuses.lock().unwrap();
        statuses
            .entry(canon.to_owned())
            .or_insert(QueryStatus { success: false, timestamp: unix_timestamp() });
        true
    }

    pub fn prev_of(&self, canon: &str) -> Option<Prev> {
        self.queries.lock().unwrap().get(canon).map(|e| e.prev.clone())
    }

    pub fn ttl_of(&self, canon: &str) -> Option<i32> {
        self.queries.lock().unwrap().get(canon).map(|e| e.ttl)
    }

    /// Flips (or creates) the status entry for `canon` to `success = true`.
    /// Duplicate hits for the same id all get forwarded, but the status flips to
    /// `true` exactly once in effect (idempotent after the first flip).
    pub fn mark_success(&self, canon: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        statuses
            .entry(canon.to_owned())
            .and_modify(|s| s.success = true)
            .or_insert(QueryStatus { success: true, timestamp: unix_timestamp() });
    }

    pub fn status_of(&self, canon: &str) -> Option<QueryStatus> {
        self.statuses.lock().unwrap().get(canon).copied()
    }

    /// Removes every entry (in both tables) whose status timestamp is older than
    /// `ttl_secs`. Returns the number of query ids evicted. The sole mechanism for
    /// bounding memory on a long-running node.
    pub fn sweep(&self, ttl_secs: u64) -> usize {
        let now = unix_timestamp();
        let expired: Vec<String> = {
            let statuses = self.statuses.lock().unwrap();
            statuses
                .iter()
                .filter(|(_, s)| now.saturating_sub(s.timestamp) >= ttl_secs)
                .map(|(k, _)| k.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        {
            let mut statuses = self.statuses.lock().unwrap();
            for key in &expired {
                statuses.remove(key);
            }
        }
        {
            let mut queries = self.queries.lock().unwrap();
            for key in &expired {
                queries.remove(key);
            }
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl Default for QueryCache {
    fn default() -> QueryCache {
        QueryCache::new()
    }
}
