//! Peer table, query cache, and the flood routing state machine.
//!
//! Four mutex-guarded tables: `peers` (`peers.rs`), `queries`+`queryStatuses`
//! (`queries.rs`, one `QueryCache` instance per flood kind: hash queries and name
//! searches), and `filePaths` (delegated to `p2p_digest::FileIndex`, which owns its
//! own lock internally).

#[macro_use]
extern crate error_chain;

pub mod error;
pub mod peers;
pub mod queries;
pub mod sweeper;
pub mod transfer;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use p2p_frame::protocol::{
    FileMeta, NameSearch, NameSearchHit, PeerIdentifier, Ping, Pong, Query, QueryHit,
    QueryIdentifier, SearchMatchIdentifier, SecureCheck, Splash,
};
pub use peers::PeerTable;
pub use queries::QueryCache;
pub use types::{write_handle, unix_timestamp, PeerRecord, Prev, WriteHandle};

use std::net::TcpStream;
use std::path::PathBuf;

use p2p_frame::protocol::Message;
use p2p_frame::send_message;

fn now_u32() -> u32 {
    unix_timestamp() as u32
}

fn send_to(writer: &WriteHandle, message: &Message) -> Result<()> {
    let mut guard = writer.lock().unwrap();
    send_message(&mut *guard, message)?;
    Ok(())
}

fn canonical_name_query(source: &PeerIdentifier, name: &str, timestamp: u32) -> String {
    format!("{}:{}:{}", source.host_name, timestamp, name)
}

fn same_node(a: &PeerIdentifier, b: &PeerIdentifier) -> bool {
    a.host_name == b.host_name && a.port == b.port
}

/// Tunables owned by `Overlay`: peer-table capacity, join fan-out, query TTL, and
/// cache sweep interval/retention.
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    pub max_peers: usize,
    pub max_init_peers: usize,
    pub query_ttl: i32,
    pub cache_check_secs: u64,
    pub cache_ttl_secs: u64,
}

/// Outcome of handling an inbound PING: the PONG to send back, and whether the
/// connection should be kept open afterward.
pub struct PingOutcome {
    pub pong: Pong,
    pub keep_connection: bool,
}

/// The protocol state machine: peer table, query cache, query-status cache, and
/// file index, plus the tunables in `OverlayConfig`.
pub struct Overlay {
    self_info: PeerIdentifier,
    config: OverlayConfig,
    peers: PeerTable,
    query_cache: QueryCache,
    name_cache: QueryCache,
    file_index: p2p_digest::FileIndex,
}

impl Overlay {
    pub fn new(self_info: PeerIdentifier, config: OverlayConfig, share_dir: impl Into<PathBuf>) -> Overlay {
        let peers = PeerTable::new(config.max_peers);
        Overlay {
            self_info,
            peers,
            query_cache: QueryCache::new(),
            name_cache: QueryCache::new(),
            file_index: p2p_digest::FileIndex::new(share_dir),
            config,
        }
    }

    pub fn self_info(&self) -> &PeerIdentifier {
        &self.self_info
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn file_index(&self) -> &p2p_digest::FileIndex {
        &self.file_index
    }

    // ---- join handshake -------------------------------------------------------

    /// Server behavior on PING: admits the sender if there is room, otherwise
    /// reports `allowed = false` with hints and asks the caller to close the
    /// connection.
    pub fn handle_ping(&self, ping: Ping, writer: WriteHandle) -> PingOutcome {
        if self.peers.is_full() {
            let hints = self.peers.hints();
            log::info!("rejecting PING from {}: peer table full", ping.self_info.host_name);
            PingOutcome {
                pong: Pong { allowed: false, timestamp: now_u32(), peers: hints },
                keep_connection: false,
            }
        } else {
            let hints = self.peers.hints();
            self.peers.insert(ping.self_info.clone(), writer);
            log::info!("admitted peer {}", ping.self_info.host_name);
            PingOutcome {
                pong: Pong { allowed: true, timestamp: now_u32(), peers: hints },
                keep_connection: true,
            }
        }
    }

    /// Client behavior for one famous/hinted peer: dial, PING, await PONG. On
    /// `allowed`, registers the peer under a single write handle shared with the
    /// caller, so the peer-table entry and the connection's eventual servicing
    /// thread serialize writes through the same `Mutex` instead of racing two
    /// independent handles on one socket.
    fn try_join_one(&self, candidate: &PeerIdentifier) -> Result<(TcpStream, WriteHandle, Pong)> {
        let mut stream = p2p_net::dial(&candidate.host_name, candidate.port)?;
        let ping = Message::Ping(Ping { self_info: self.self_info.clone(), timestamp: now_u32() });
        send_message(&mut stream, &ping)?;

        let pong = match p2p_frame::recv_message(&mut stream)? {
            Message::Pong(p) => p,
            other => {
                return Err(ErrorKind::Msg(format!(
                    "expected PONG from {}, got type {}",
                    candidate.host_name,
                    other.type_code()
                ))
                .into())
            }
        };

        let write_half = stream.try_clone()?;
        let writer = write_handle(write_half);
        if pong.allowed {
            self.peers.insert(candidate.clone(), writer.clone());
        }
        Ok((stream, writer, pong))
    }

    /// Iterates famous peers (and the hints they return) until `maxInitPeers`
    /// accepted peers are held or the hint pool is exhausted. Returns, per accepted
    /// peer, its read-half stream and the write handle already registered in the
    /// peer table, so the caller's servicing thread reuses it instead of minting a
    /// second one over the same socket.
    pub fn join(&self, famous: &[PeerIdentifier]) -> Vec<(PeerIdentifier, TcpStream, WriteHandle)> {
        use std::collections::{HashSet, VecDeque};

        let mut joined = Vec::new();
        let mut queue: VecDeque<PeerIdentifier> = famous.iter().cloned().collect();
        let mut tried: HashSet<(String, u16)> = HashSet::new();

        while let Some(candidate) = queue.pop_front() {
            if joined.len() >= self.config.max_init_peers {
                break;
            }
            let key = (candidate.host_name.clone(), candidate.port);
            if !tried.insert(key) || same_node(&candidate, &self.self_info) {
                continue;
            }

            match self.try_join_one(&candidate) {
                Ok((stream, writer, pong)) => {
                    if pong.allowed {
                        joined.push((candidate, stream, writer));
                    }
                    queue.extend(pong.peers);
                }
                Err(e) => {
                    log::warn!("join: failed to reach {}: {}", candidate.host_name, e);
                }
            }
        }
        joined
    }

    pub fn handle_splash(&self, _splash: Splash, from: &PeerIdentifier) {
        self.peers.remove(&from.host_name);
        log::info!("peer {} splashed", from.host_name);
    }

    pub fn handle_secure_check(&self, _msg: SecureCheck) -> SecureCheck {
        // This node advertises no encrypted transport.
        SecureCheck { kind: 0, secure: false }
    }

    // ---- query flood --------------------------------------------------------

    /// `initQuery`: validates `hash_hex`, records the query as our own, and
    /// floods QUERY to every peer — unless we hold the file locally, in which
    /// case no network traffic is generated at all.
    pub fn init_query(&self, hash_hex: &str) -> Result<QueryIdentifier> {
        if !p2p_digest::is_valid_hash(hash_hex) {
            return Err(ErrorKind::Msg(format!("invalid hash: {}", hash_hex)).into());
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)?;

        let id = QueryIdentifier { source: self.self_info.clone(), hash, timestamp: now_u32() };
        let canon = id.canonical();

        if self.file_index.find_by_hash(hash_hex)?.is_some() {
            self.query_cache.observe(&canon, Prev::SelfOrigin, self.config.query_ttl);
            self.query_cache.mark_success(&canon);
            log::info!("initQuery {}: resolved locally, no flood issued", canon);
            return Ok(id);
        }

        self.query_cache.observe(&canon, Prev::SelfOrigin, self.config.query_ttl);
        let query = Query { id: id.clone(), prev: self.self_info.clone(), ttl: self.config.query_ttl };
        for (peer_id, writer) in self.peers.snapshot_all() {
            if let Err(e) = send_to(&writer, &Message::Query(query.clone())) {
                log::warn!("failed to flood QUERY to {}: {}", peer_id.host_name, e);
            }
        }
        Ok(id)
    }

    /// Handles an inbound QUERY from `from`. TTL is decremented before
    /// forwarding, never on receipt.
    pub fn handle_query(&self, query: Query, from: &PeerIdentifier, reply_writer: &WriteHandle) -> Result<()> {
        let canon = query.id.canonical();
        if !self.query_cache.observe(&canon, Prev::From(from.clone()), query.ttl) {
            return Ok(()); // duplicate: loop suppression
        }

        let hash_hex = hex::encode(query.id.hash);
        if self.file_index.find_by_hash(&hash_hex)?.is_some() {
            let hit = QueryHit {
                id: query.id.clone(),
                prev: self.self_info.clone(),
                destination: self.self_info.clone(),
            };
            send_to(reply_writer, &Message::QueryHit(hit))?;
            self.query_cache.mark_success(&canon);
        } else if query.ttl > 1 {
            let forwarded =
                Query { id: query.id.clone(), prev: self.self_info.clone(), ttl: query.ttl - 1 };
            for (peer_id, writer) in self.peers.snapshot_except(&from.host_name) {
                if let Err(e) = send_to(&writer, &Message::Query(forwarded.clone())) {
                    log::warn!("failed to forward QUERY to {}: {}", peer_id.host_name, e);
                }
            }
        }
        // ttl <= 1 and no local hit: dropped silently, nothing further to do.
        Ok(())
    }

    /// Handles an inbound QUERY_HIT. Returns `Some(hit)` when
    /// this hit resolves our own query (caller should now run
    /// `transfer::request_file` against `hit.destination`); otherwise routes it
    /// back toward the recorded `prev` and returns `None`.
    pub fn handle_query_hit(&self, hit: QueryHit, _from: &PeerIdentifier) -> Result<Option<QueryHit>> {
        let canon = hit.id.canonical();

        if same_node(&hit.id.source, &self.self_info) {
            self.query_cache.mark_success(&canon);
            return Ok(Some(hit));
        }

        match self.query_cache.prev_of(&canon) {
            Some(Prev::From(target)) => {
                if let Some(record) = self.peers.get(&target.host_name) {
                    let forwarded = QueryHit {
                        id: hit.id.clone(),
                        prev: self.self_info.clone(),
                        destination: hit.destination.clone(),
                    };
                    send_to(&record.writer, &Message::QueryHit(forwarded))?;
                } else {
                    log::warn!("dropping QUERY_HIT {}: recorded prev {} is gone", canon, target.host_name);
                }
            }
            Some(Prev::SelfOrigin) | None => {
                log::warn!("dropping QUERY_HIT {}: no forwarding record", canon);
            }
        }
        Ok(None)
    }

    // ---- supplemental: name search -----------------------------------------

    /// `NAME_SEARCH` carries no TTL on the wire; the query cache's
    /// dedup-on-canonical-id is this flood's only termination mechanism, so
    /// (unlike hash queries) a local hit does not suppress forwarding — other
    /// nodes downstream may hold a same-named file too.
    pub fn init_name_search(&self, name: &str) -> Result<NameSearch> {
        let ts = now_u32();
        let ns = NameSearch { source: self.self_info.clone(), name: name.to_owned(), timestamp: ts };
        let canon = canonical_name_query(&ns.source, &ns.name, ts);

        self.name_cache.observe(&canon, Prev::SelfOrigin, self.config.query_ttl);
        if self.file_index.find_by_name(name)?.is_some() {
            self.name_cache.mark_success(&canon);
        }

        for (peer_id, writer) in self.peers.snapshot_all() {
            if let Err(e) = send_to(&writer, &Message::NameSearch(ns.clone())) {
                log::warn!("failed to flood NAME_SEARCH to {}: {}", peer_id.host_name, e);
            }
        }
        Ok(ns)
    }

    pub fn handle_name_search(
        &self,
        ns: NameSearch,
        from: &PeerIdentifier,
        reply_writer: &WriteHandle,
    ) -> Result<()> {
        let canon = canonical_name_query(&ns.source, &ns.name, ns.timestamp);
        if !self.name_cache.observe(&canon, Prev::From(from.clone()), self.config.query_ttl) {
            return Ok(());
        }

        if let Some(path) = self.file_index.find_by_name(&ns.name)? {
            let hash_hex = self.file_index.hash_of(&path)?;
            let mut hash = [0u8; 32];
            hex::decode_to_slice(&hash_hex, &mut hash)?;
            let hit = NameSearchHit {
                match_id: SearchMatchIdentifier { name: ns.name.clone(), hash },
                source: ns.source.clone(),
                destination: self.self_info.clone(),
                timestamp: ns.timestamp,
            };
            send_to(reply_writer, &Message::NameSearchHit(hit))?;
            self.name_cache.mark_success(&canon);
        }

        for (peer_id, writer) in self.peers.snapshot_except(&from.host_name) {
            if let Err(e) = send_to(&writer, &Message::NameSearch(ns.clone())) {
                log::warn!("failed to forward NAME_SEARCH to {}: {}", peer_id.host_name, e);
            }
        }
        Ok(())
    }

    pub fn handle_name_search_hit(
        &self,
        hit: NameSearchHit,
        _from: &PeerIdentifier,
    ) -> Result<Option<NameSearchHit>> {
        let canon = canonical_name_query(&hit.source, &hit.match_id.name, hit.timestamp);

        if same_node(&hit.source, &self.self_info) {
            self.name_cache.mark_success(&canon);
            return Ok(Some(hit));
        }

        match self.name_cache.prev_of(&canon) {
            Some(Prev::From(target)) => {
                if let Some(record) = self.peers.get(&target.host_name) {
                    let forwarded = NameSearchHit {
                        match_id: hit.match_id.clone(),
                        source: hit.source.clone(),
                        destination: hit.destination.clone(),
                        timestamp: hit.timestamp,
                    };
                    send_to(&record.writer, &Message::NameSearchHit(forwarded))?;
                } else {
                    log::warn!("dropping NAME_SEARCH_HIT {}: recorded prev is gone", canon);
                }
            }
            Some(Prev::SelfOrigin) | None => {
                log::warn!("dropping NAME_SEARCH_HIT {}: no forwarding record", canon);
            }
        }
        Ok(None)
    }

    // ---- 4.4.4 cache sweeper ------------------------------------------------

    /// One sweep of both query caches; returns the total number of evicted ids.
    pub fn sweep_once(&self) -> usize {
        self.query_cache.sweep(self.config.cache_ttl_secs) + self.name_cache.sweep(self.config.cache_ttl_secs)
    }
}
