//! Error taxonomy for `p2p_frame`: `ShortRead`/`PeerClosed`/`ProtocolError`.

error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error) #[doc = "Underlying socket error."];
    }

    errors {
        /// The peer closed the connection before a type header could be read.
        PeerClosed {
            description("peer closed the connection")
        }
        /// A read returned fewer bytes than the frame's declared length.
        ShortRead(expected: u32, got: u32) {
            description("short read")
            display("short read: expected {} bytes, got {}", expected, got)
        }
        /// Declared payload length exceeds the configured maximum frame size.
        FrameTooLarge(len: u32, max: u32) {
            description("frame exceeds configured maximum length")
            display("frame length {} exceeds maximum {}", len, max)
        }
        /// An unrecognized message type code.
        UnknownType(code: u32) {
            description("unknown message type code")
            display("unknown message type code {}", code)
        }
        /// A payload did not decode into the structure its type code implies
        /// (wrong length, non-zero-padded fixed field, invalid embedded hash, ...).
        Malformed(reason: String) {
            description("malformed payload")
            display("malformed payload: {}", reason)
        }
    }
}
