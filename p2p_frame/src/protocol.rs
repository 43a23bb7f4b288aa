//! Fixed-layout wire messages carried inside a `Frame`.
//!
//! Every multi-byte integer is little-endian; fixed-size character arrays
//! (`host_name`, `name`) are zero-padded and a payload whose fixed field has no
//! zero-padded tail is rejected with `ErrorKind::Malformed`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ErrorKind, Result};

pub const TYPE_PEER_IDENTIFIER: u32 = 100;
pub const TYPE_PEER_INFO: u32 = 101; // local-only, never placed on the wire
pub const TYPE_PING: u32 = 200;
pub const TYPE_PONG: u32 = 201;
pub const TYPE_SPLASH: u32 = 202;
pub const TYPE_QUERY_IDENTIFIER: u32 = 300;
pub const TYPE_QUERY: u32 = 301;
pub const TYPE_QUERY_HIT: u32 = 302;
pub const TYPE_QUERY_STATUS: u32 = 303; // local table only, never placed on the wire
pub const TYPE_FILE_META: u32 = 400;
pub const TYPE_NAME_SEARCH: u32 = 500;
pub const TYPE_SEARCH_MATCH_IDENTIFIER: u32 = 501;
pub const TYPE_NAME_SEARCH_HIT: u32 = 502;
pub const TYPE_SECURE_CHECK: u32 = 600;

const HOST_NAME_LEN: usize = 256;
const NAME_LEN: usize = 256;
const ID_LEN: usize = 16;
const HASH_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const MAX_HINT_PEERS: usize = 10;

fn write_fixed_str<W: Write>(w: &mut W, s: &str, cap: usize) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() >= cap {
        return Err(ErrorKind::Malformed(format!(
            "field of {} bytes exceeds {}-byte capacity (needs room for terminator)",
            bytes.len(),
            cap
        ))
        .into());
    }
    w.write_all(bytes)?;
    w.write_all(&vec![0u8; cap - bytes.len()])?;
    Ok(())
}

fn read_fixed_str<R: Read>(r: &mut R, cap: usize) -> Result<String> {
    let mut buf = vec![0u8; cap];
    r.read_exact(&mut buf)?;
    match buf.iter().position(|&b| b == 0) {
        Some(pos) => {
            if buf[pos..].iter().any(|&b| b != 0) {
                return Err(ErrorKind::Malformed(
                    "fixed field has data after its null terminator".into(),
                )
                .into());
            }
            Ok(String::from_utf8_lossy(&buf[..pos]).into_owned())
        }
        None => Err(ErrorKind::Malformed("fixed field is not null-terminated".into()).into()),
    }
}

fn write_bool<W: Write>(w: &mut W, b: bool) -> Result<()> {
    w.write_u8(if b { 1 } else { 0 })?;
    Ok(())
}

fn read_bool<R: Read>(r: &mut R) -> Result<bool> {
    Ok(r.read_u8()? != 0)
}

/// Identity of a node as advertised on the wire: host name, message port, and an
/// opaque 16-byte id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerIdentifier {
    pub host_name: String,
    pub port: u16,
    pub id: [u8; ID_LEN],
}

impl PeerIdentifier {
    pub fn new(host_name: impl Into<String>, port: u16, id: [u8; ID_LEN]) -> PeerIdentifier {
        PeerIdentifier { host_name: host_name.into(), port, id }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write_fixed_str(w, &self.host_name, HOST_NAME_LEN)?;
        w.write_u16::<LittleEndian>(self.port)?;
        w.write_all(&self.id)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<PeerIdentifier> {
        let host_name = read_fixed_str(r, HOST_NAME_LEN)?;
        let port = r.read_u16::<LittleEndian>()?;
        let mut id = [0u8; ID_LEN];
        r.read_exact(&mut id)?;
        Ok(PeerIdentifier { host_name, port, id })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ping {
    pub self_info: PeerIdentifier,
    pub timestamp: u32,
}

impl Ping {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.self_info.write_to(w)?;
        w.write_u32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Ping> {
        let self_info = PeerIdentifier::read_from(r)?;
        let timestamp = r.read_u32::<LittleEndian>()?;
        Ok(Ping { self_info, timestamp })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pong {
    pub allowed: bool,
    pub timestamp: u32,
    pub peers: Vec<PeerIdentifier>, // up to 10, `num_peers` is `peers.len()`
}

impl Pong {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write_bool(w, self.allowed)?;
        w.write_u32::<LittleEndian>(self.timestamp)?;
        w.write_i32::<LittleEndian>(self.peers.len() as i32)?;

        let blank = PeerIdentifier::new("", 0, [0u8; ID_LEN]);
        for i in 0..MAX_HINT_PEERS {
            match self.peers.get(i) {
                Some(p) => p.write_to(w)?,
                None => blank.write_to(w)?,
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Pong> {
        let allowed = read_bool(r)?;
        let timestamp = r.read_u32::<LittleEndian>()?;
        let num_peers = r.read_i32::<LittleEndian>()?;
        if !(0..=MAX_HINT_PEERS as i32).contains(&num_peers) {
            return Err(ErrorKind::Malformed(format!(
                "pong num_peers {} out of range 0..={}",
                num_peers, MAX_HINT_PEERS
            ))
            .into());
        }

        let mut slots = Vec::with_capacity(MAX_HINT_PEERS);
        for _ in 0..MAX_HINT_PEERS {
            slots.push(PeerIdentifier::read_from(r)?);
        }
        slots.truncate(num_peers as usize);
        Ok(Pong { allowed, timestamp, peers: slots })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Splash {
    pub timestamp: u32,
}

impl Splash {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Splash> {
        Ok(Splash { timestamp: r.read_u32::<LittleEndian>()? })
    }
}

/// Globally unique key for a query: originating peer, requested hash, and the
/// timestamp at which the query was issued.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryIdentifier {
    pub source: PeerIdentifier,
    pub hash: [u8; HASH_LEN],
    pub timestamp: u32,
}

impl QueryIdentifier {
    /// Canonical string form: `"<host>:<timestamp>:<hex-hash>"`.
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.source.host_name, self.timestamp, hex::encode(self.hash))
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.source.write_to(w)?;
        w.write_all(&self.hash)?;
        w.write_u32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<QueryIdentifier> {
        let source = PeerIdentifier::read_from(r)?;
        let mut hash = [0u8; HASH_LEN];
        r.read_exact(&mut hash)?;
        let timestamp = r.read_u32::<LittleEndian>()?;
        Ok(QueryIdentifier { source, hash, timestamp })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub id: QueryIdentifier,
    pub prev: PeerIdentifier,
    pub ttl: i32,
}

impl Query {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.id.write_to(w)?;
        self.prev.write_to(w)?;
        w.write_i32::<LittleEndian>(self.ttl)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Query> {
        let id = QueryIdentifier::read_from(r)?;
        let prev = PeerIdentifier::read_from(r)?;
        let ttl = r.read_i32::<LittleEndian>()?;
        Ok(Query { id, prev, ttl })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryHit {
    pub id: QueryIdentifier,
    pub prev: PeerIdentifier,
    pub destination: PeerIdentifier,
}

impl QueryHit {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.id.write_to(w)?;
        self.prev.write_to(w)?;
        self.destination.write_to(w)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<QueryHit> {
        let id = QueryIdentifier::read_from(r)?;
        let prev = PeerIdentifier::read_from(r)?;
        let destination = PeerIdentifier::read_from(r)?;
        Ok(QueryHit { id, prev, destination })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileMeta {
    pub hash: [u8; HASH_LEN],
    pub name: String,
    pub available: bool,
    pub file_size: u64,
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
}

impl FileMeta {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.hash)?;
        write_fixed_str(w, &self.name, NAME_LEN)?;
        write_bool(w, self.available)?;
        w.write_u64::<LittleEndian>(self.file_size)?;
        w.write_all(&self.iv)?;
        w.write_all(&self.tag)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<FileMeta> {
        let mut hash = [0u8; HASH_LEN];
        r.read_exact(&mut hash)?;
        let name = read_fixed_str(r, NAME_LEN)?;
        let available = read_bool(r)?;
        let file_size = r.read_u64::<LittleEndian>()?;
        let mut iv = [0u8; IV_LEN];
        r.read_exact(&mut iv)?;
        let mut tag = [0u8; TAG_LEN];
        r.read_exact(&mut tag)?;
        Ok(FileMeta { hash, name, available, file_size, iv, tag })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NameSearch {
    pub source: PeerIdentifier,
    pub name: String,
    pub timestamp: u32,
}

impl NameSearch {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.source.write_to(w)?;
        write_fixed_str(w, &self.name, NAME_LEN)?;
        w.write_u32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<NameSearch> {
        let source = PeerIdentifier::read_from(r)?;
        let name = read_fixed_str(r, NAME_LEN)?;
        let timestamp = r.read_u32::<LittleEndian>()?;
        Ok(NameSearch { source, name, timestamp })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchMatchIdentifier {
    pub name: String,
    pub hash: [u8; HASH_LEN],
}

impl SearchMatchIdentifier {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write_fixed_str(w, &self.name, NAME_LEN)?;
        w.write_all(&self.hash)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<SearchMatchIdentifier> {
        let name = read_fixed_str(r, NAME_LEN)?;
        let mut hash = [0u8; HASH_LEN];
        r.read_exact(&mut hash)?;
        Ok(SearchMatchIdentifier { name, hash })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NameSearchHit {
    pub match_id: SearchMatchIdentifier,
    pub source: PeerIdentifier,
    pub destination: PeerIdentifier,
    pub timestamp: u32,
}

impl NameSearchHit {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        self.match_id.write_to(w)?;
        self.source.write_to(w)?;
        self.destination.write_to(w)?;
        w.write_u32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<NameSearchHit> {
        let match_id = SearchMatchIdentifier::read_from(r)?;
        let source = PeerIdentifier::read_from(r)?;
        let destination = PeerIdentifier::read_from(r)?;
        let timestamp = r.read_u32::<LittleEndian>()?;
        Ok(NameSearchHit { match_id, source, destination, timestamp })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SecureCheck {
    pub kind: u16,
    pub secure: bool,
}

impl SecureCheck {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<LittleEndian>(self.kind)?;
        write_bool(w, self.secure)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<SecureCheck> {
        let kind = r.read_u16::<LittleEndian>()?;
        let secure = read_bool(r)?;
        Ok(SecureCheck { kind, secure })
    }
}

/// Every message this node can place in a `Frame` payload, tagged with its type
/// code for dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Ping(Ping),
    Pong(Pong),
    Splash(Splash),
    QueryIdentifier(QueryIdentifier),
    Query(Query),
    QueryHit(QueryHit),
    FileMeta(FileMeta),
    NameSearch(NameSearch),
    NameSearchHit(NameSearchHit),
    SecureCheck(SecureCheck),
}

impl Message {
    pub fn type_code(&self) -> u32 {
        match self {
            Message::Ping(_) => TYPE_PING,
            Message::Pong(_) => TYPE_PONG,
            Message::Splash(_) => TYPE_SPLASH,
            Message::QueryIdentifier(_) => TYPE_QUERY_IDENTIFIER,
            Message::Query(_) => TYPE_QUERY,
            Message::QueryHit(_) => TYPE_QUERY_HIT,
            Message::FileMeta(_) => TYPE_FILE_META,
            Message::NameSearch(_) => TYPE_NAME_SEARCH,
            Message::NameSearchHit(_) => TYPE_NAME_SEARCH_HIT,
            Message::SecureCheck(_) => TYPE_SECURE_CHECK,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Message::Ping(m) => m.write_to(&mut buf)?,
            Message::Pong(m) => m.write_to(&mut buf)?,
            Message::Splash(m) => m.write_to(&mut buf)?,
            Message::QueryIdentifier(m) => m.write_to(&mut buf)?,
            Message::Query(m) => m.write_to(&mut buf)?,
            Message::QueryHit(m) => m.write_to(&mut buf)?,
            Message::FileMeta(m) => m.write_to(&mut buf)?,
            Message::NameSearch(m) => m.write_to(&mut buf)?,
            Message::NameSearchHit(m) => m.write_to(&mut buf)?,
            Message::SecureCheck(m) => m.write_to(&mut buf)?,
        }
        Ok(buf)
    }

    pub fn decode(type_code: u32, payload: &[u8]) -> Result<Message> {
        let mut cursor = std::io::Cursor::new(payload);
        Ok(match type_code {
            TYPE_PING => Message::Ping(Ping::read_from(&mut cursor)?),
            TYPE_PONG => Message::Pong(Pong::read_from(&mut cursor)?),
            TYPE_SPLASH => Message::Splash(Splash::read_from(&mut cursor)?),
            TYPE_QUERY_IDENTIFIER => {
                Message::QueryIdentifier(QueryIdentifier::read_from(&mut cursor)?)
            }
            TYPE_QUERY => Message::Query(Query::read_from(&mut cursor)?),
            TYPE_QUERY_HIT => Message::QueryHit(QueryHit::read_from(&mut cursor)?),
            TYPE_FILE_META => Message::FileMeta(FileMeta::read_from(&mut cursor)?),
            TYPE_NAME_SEARCH => Message::NameSearch(NameSearch::read_from(&mut cursor)?),
            TYPE_NAME_SEARCH_HIT => {
                Message::NameSearchHit(NameSearchHit::read_from(&mut cursor)?)
            }
            TYPE_SECURE_CHECK => Message::SecureCheck(SecureCheck::read_from(&mut cursor)?),
            other => return Err(ErrorKind::UnknownType(other).into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(host: &str, port: u16) -> PeerIdentifier {
        PeerIdentifier::new(host, port, [7u8; ID_LEN])
    }

    #[test]
    fn ping_round_trip() {
        let msg = Message::Ping(Ping { self_info: peer("alice", 9000), timestamp: 42 });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(msg.type_code(), &bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn pong_round_trip_with_fewer_than_ten_peers() {
        let msg = Message::Pong(Pong {
            allowed: true,
            timestamp: 1,
            peers: vec![peer("a", 1), peer("b", 2), peer("c", 3)],
        });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(TYPE_PONG, &bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn pong_round_trip_empty_peers() {
        let msg = Message::Pong(Pong { allowed: false, timestamp: 1, peers: vec![] });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(TYPE_PONG, &bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn query_round_trip() {
        let id = QueryIdentifier { source: peer("origin", 1), hash: [9u8; HASH_LEN], timestamp: 7 };
        let msg = Message::Query(Query { id, prev: peer("prev", 2), ttl: 3 });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(TYPE_QUERY, &bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn query_identifier_canonical_form() {
        let id = QueryIdentifier {
            source: peer("host.example", 9999),
            hash: [0xABu8; HASH_LEN],
            timestamp: 123,
        };
        assert_eq!(
            id.canonical(),
            format!("host.example:123:{}", "ab".repeat(HASH_LEN))
        );
    }

    #[test]
    fn file_meta_round_trip() {
        let msg = Message::FileMeta(FileMeta {
            hash: [1u8; HASH_LEN],
            name: "movie.mp4".to_owned(),
            available: true,
            file_size: 123456789,
            iv: [2u8; IV_LEN],
            tag: [3u8; TAG_LEN],
        });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(TYPE_FILE_META, &bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn name_too_long_is_rejected_at_encode_time() {
        let msg = Message::NameSearch(NameSearch {
            source: peer("a", 1),
            name: "x".repeat(NAME_LEN),
            timestamp: 0,
        });
        assert!(msg.encode().is_err());
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        let err = Message::decode(9999, &[]).unwrap_err();
        assert!(matches!(err.0, ErrorKind::UnknownType(9999)));
    }

    #[test]
    fn non_zero_padded_tail_is_rejected() {
        // host_name field entirely filled with non-zero bytes: no terminator at all.
        let mut payload = vec![b'a'; HOST_NAME_LEN];
        payload.extend_from_slice(&[0u8; 2]); // port
        payload.extend_from_slice(&[0u8; ID_LEN]); // id
        payload.extend_from_slice(&[0u8; 4]); // ping timestamp
        let err = Message::decode(TYPE_PING, &payload).unwrap_err();
        assert!(matches!(err.0, ErrorKind::Malformed(_)));
    }
}
