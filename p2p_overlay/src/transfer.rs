//! Direct file transfer over the file port.

use std::io::{Read, Write};

use p2p_frame::protocol::{FileMeta, Message, QueryIdentifier};
use p2p_frame::{recv_message, send_message};

use crate::error::{ErrorKind, Result};
use p2p_digest::FileIndex;

/// Client side of `initFileRequest`: sends `id` on an already-connected stream to
/// the file holder, awaits `FILE_META`, then reads exactly `fileSize` bytes.
/// Integrity is checked against `id.hash`; a mismatch returns `HashMismatch`
/// without handing back the (discarded) bytes.
pub fn request_file<S: Read + Write>(stream: &mut S, id: &QueryIdentifier) -> Result<Vec<u8>> {
    send_message(stream, &Message::QueryIdentifier(id.clone()))?;

    let meta = match recv_message(stream)? {
        Message::FileMeta(m) => m,
        other => {
            return Err(ErrorKind::Msg(format!(
                "expected FILE_META in response to a file request, got {:?}",
                other.type_code()
            ))
            .into())
        }
    };

    if !meta.available {
        return Err(ErrorKind::FileUnavailable.into());
    }

    let mut bytes = vec![0u8; meta.file_size as usize];
    stream.read_exact(&mut bytes)?;

    let expected = hex::encode(id.hash);
    let got = p2p_digest::hash_bytes(&bytes);
    if !got.eq_ignore_ascii_case(&expected) {
        return Err(ErrorKind::HashMismatch(expected, got).into());
    }

    Ok(bytes)
}

/// Server side: receives a `QueryIdentifier` off a freshly-accepted file-port
/// connection, resolves the hash against `index`, and streams back `FILE_META`
/// followed by the file's bytes (or `available = false` and nothing else).
pub fn serve_file_request<S: Read + Write>(stream: &mut S, index: &FileIndex) -> Result<()> {
    let id = match recv_message(stream)? {
        Message::QueryIdentifier(id) => id,
        other => {
            return Err(ErrorKind::Msg(format!(
                "expected QUERY_IDENTIFIER opening a file request, got {:?}",
                other.type_code()
            ))
            .into())
        }
    };

    let hash_hex = hex::encode(id.hash);
    let found = index.find_by_hash(&hash_hex)?;

    match found {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_owned();
            let meta = FileMeta {
                hash: id.hash,
                name,
                available: true,
                file_size: bytes.len() as u64,
                iv: [0u8; 16],
                tag: [0u8; 16],
            };
            send_message(stream, &Message::FileMeta(meta))?;
            stream.write_all(&bytes)?;
            stream.flush()?;
        }
        None => {
            let meta = FileMeta {
                hash: id.hash,
                name: String::new(),
                available: false,
                file_size: 0,
                iv: [0u8; 16],
                tag: [0u8; 16],
            };
            send_message(stream, &Message::FileMeta(meta))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p2p_frame::protocol::PeerIdentifier;
    use std::io::Cursor;

    struct DuplexBuf {
        read: Cursor<Vec<u8>>,
        write: Vec<u8>,
    }
    impl Read for DuplexBuf {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.read.read(buf)
        }
    }
    impl Write for DuplexBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.write.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn make_index(contents: &[u8]) -> (tempfile::TempDir, FileIndex, [u8; 32]) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.bin"), contents).unwrap();
        let hash_hex = p2p_digest::hash_bytes(contents);
        let mut hash = [0u8; 32];
        hex::decode_to_slice(&hash_hex, &mut hash).unwrap();
        let index = FileIndex::new(dir.path());
        (dir, index, hash)
    }

    #[test]
    fn serve_then_request_round_trip_with_matching_hash() {
        let (_dir, index, hash) = make_index(b"payload bytes");
        let id = QueryIdentifier {
            source: PeerIdentifier::new("requester", 1, [0u8; 16]),
            hash,
            timestamp: 1,
        };

        // server fabricates its own incoming request buffer directly, bypassing sockets.
        let mut request_buf = Vec::new();
        p2p_frame::send_message(&mut request_buf, &Message::QueryIdentifier(id.clone())).unwrap();
        let mut server_side = DuplexBuf { read: Cursor::new(request_buf), write: Vec::new() };
        serve_file_request(&mut server_side, &index).unwrap();

        let mut client_side =
            DuplexBuf { read: Cursor::new(server_side.write), write: Vec::new() };
        let bytes = request_file(&mut client_side, &id).unwrap();
        assert_eq!(bytes, b"payload bytes");
    }

    #[test]
    fn corrupted_bytes_fail_integrity_check() {
        let (_dir, index, hash) = make_index(b"original");
        let id = QueryIdentifier {
            source: PeerIdentifier::new("requester", 1, [0u8; 16]),
            hash,
            timestamp: 1,
        };

        let mut request_buf = Vec::new();
        p2p_frame::send_message(&mut request_buf, &Message::QueryIdentifier(id.clone())).unwrap();
        let mut server_side = DuplexBuf { read: Cursor::new(request_buf), write: Vec::new() };
        serve_file_request(&mut server_side, &index).unwrap();

        // flip a byte in the transmitted file payload, after the FILE_META frame.
        let mut corrupted = server_side.write;
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        let mut client_side = DuplexBuf { read: Cursor::new(corrupted), write: Vec::new() };
        let err = request_file(&mut client_side, &id).unwrap_err();
        assert!(matches!(err.0, ErrorKind::HashMismatch(_, _)));
    }

    #[test]
    fn missing_file_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileIndex::new(dir.path());
        let id = QueryIdentifier {
            source: PeerIdentifier::new("requester", 1, [0u8; 16]),
            hash: [1u8; 32],
            timestamp: 1,
        };

        let mut request_buf = Vec::new();
        p2p_frame::send_message(&mut request_buf, &Message::QueryIdentifier(id.clone())).unwrap();
        let mut server_side = DuplexBuf { read: Cursor::new(request_buf), write: Vec::new() };
        serve_file_request(&mut server_side, &index).unwrap();

        let mut client_side =
            DuplexBuf { read: Cursor::new(server_side.write), write: Vec::new() };
        let err = request_file(&mut client_side, &id).unwrap_err();
        assert!(matches!(err.0, ErrorKind::FileUnavailable));
    }
}
