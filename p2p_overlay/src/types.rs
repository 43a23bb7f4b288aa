//! Shared table-row types for the overlay's peer/query/status tables.

use std::io::Write;
use std::sync::{Arc, Mutex};

use p2p_frame::protocol::PeerIdentifier;

/// A connection's write half, shared so forwarding code can clone a handle out of
/// the peer table and send on it after releasing the table lock — no operation
/// holds a mutex across a blocking socket call.
pub type WriteHandle = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn write_handle<W: Write + Send + 'static>(writer: W) -> WriteHandle {
    Arc::new(Mutex::new(Box::new(writer)))
}

/// A live connection to a peer, owned by the peer table.
#[derive(Clone)]
pub struct PeerRecord {
    pub identifier: PeerIdentifier,
    pub writer: WriteHandle,
}

/// The neighbor a routed query/hit arrived from, or `SelfOrigin` if this node
/// originated it. Modeled as a tagged record rather than a live connection handle
/// so the actual connection is resolved from the peer table at forward time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prev {
    SelfOrigin,
    From(PeerIdentifier),
}

/// A routed query or name-search in flight, keyed by its canonical id string in
/// the overlay's query table.
#[derive(Clone, Debug)]
pub struct QueryEntry {
    pub prev: Prev,
    pub ttl: i32,
    pub inserted_at: u64,
}

/// Per-query ledger entry: whether it has resolved yet, and when its status was
/// last touched.
#[derive(Clone, Copy, Debug)]
pub struct QueryStatus {
    pub success: bool,
    pub timestamp: u64,
}

pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
