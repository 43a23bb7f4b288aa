//! Error taxonomy for `p2p_overlay`.

error_chain::error_chain! {
    links {
        Frame(p2p_frame::Error, p2p_frame::ErrorKind) #[doc = "Framing/protocol failure on a peer connection."];
        Net(p2p_net::Error, p2p_net::ErrorKind) #[doc = "Socket-level failure."];
        Digest(p2p_digest::Error, p2p_digest::ErrorKind) #[doc = "Hashing/file-lookup failure."];
    }

    foreign_links {
        Io(std::io::Error);
        Hex(hex::FromHexError);
    }

    errors {
        /// Peer table is at `maxPeers`; the soft failure reported in a PONG.
        PeerTableFull {
            description("peer table is at capacity")
        }
        /// The file received over a FILE_META transfer did not hash to the
        /// requested id.
        HashMismatch(expected: String, got: String) {
            description("received file does not match requested hash")
            display("hash mismatch: expected {}, got {}", expected, got)
        }
        /// The remote side reported the file unavailable.
        FileUnavailable {
            description("remote peer reports the requested file is unavailable")
        }
    }
}
