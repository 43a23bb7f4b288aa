//! The peer table, keyed by host name.

use std::collections::HashMap;
use std::sync::Mutex;

use p2p_frame::protocol::PeerIdentifier;

use crate::types::{PeerRecord, WriteHandle};

const MAX_HINT_PEERS: usize = 10;

pub struct PeerTable {
    max_peers: usize,
    inner: Mutex<HashMap<String, PeerRecord>>,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> PeerTable {
        PeerTable { max_peers, inner: Mutex::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_peers
    }

    /// Up to 10 peers known to this node, for PONG hints.
    pub fn hints(&self) -> Vec<PeerIdentifier> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .take(MAX_HINT_PEERS)
            .map(|r| r.identifier.clone())
            .collect()
    }

    /// Inserts or refreshes the peer keyed by its host name: a PING from an
    /// already-present peer refreshes the entry rather than duplicating it —
    /// `HashMap::insert` naturally does this since the key is unchanged.
    pub fn insert(&self, identifier: PeerIdentifier, writer: WriteHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(identifier.host_name.clone(), PeerRecord { identifier, writer });
    }

    pub fn remove(&self, host_name: &str) -> Option<PeerRecord> {
        self.inner.lock().unwrap().remove(host_name)
    }

    pub fn get(&self, host_name: &str) -> Option<PeerRecord> {
        self.inner.lock().unwrap().get(host_name).cloned()
    }

    pub fn contains(&self, host_name: &str) -> bool {
        self.inner.lock().unwrap().contains_key(host_name)
    }

    /// Snapshot of every peer's `(identifier, writer)` except `exclude`, taken
    /// under the lock and returned so the caller can send on each handle after
    /// releasing it — no send ever happens while the table lock is held.
    pub fn snapshot_except(&self, exclude: &str) -> Vec<(PeerIdentifier, WriteHandle)> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.identifier.host_name != exclude)
            .map(|r| (r.identifier.clone(), r.writer.clone()))
            .collect()
    }

    pub fn snapshot_all(&self) -> Vec<(PeerIdentifier, WriteHandle)> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .map(|r| (r.identifier.clone(), r.writer.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::write_handle;

    fn peer(host: &str) -> PeerIdentifier {
        PeerIdentifier::new(host, 9000, [0u8; 16])
    }

    #[test]
    fn insert_respects_capacity_check_before_caller_inserts() {
        let table = PeerTable::new(1);
        table.insert(peer("a"), write_handle(Vec::new()));
        assert!(table.is_full());
    }

    #[test]
    fn repeated_ping_refreshes_not_duplicates() {
        let table = PeerTable::new(10);
        table.insert(peer("a"), write_handle(Vec::new()));
        table.insert(peer("a"), write_handle(Vec::new()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn hints_capped_at_ten() {
        let table = PeerTable::new(100);
        for i in 0..15 {
            table.insert(peer(&format!("host{i}")), write_handle(Vec::new()));
        }
        assert_eq!(table.hints().len(), 10);
    }

    #[test]
    fn snapshot_except_excludes_sender() {
        let table = PeerTable::new(10);
        table.insert(peer("a"), write_handle(Vec::new()));
        table.insert(peer("b"), write_handle(Vec::new()));
        let snap = table.snapshot_except("a");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].0.host_name, "b");
    }
}
