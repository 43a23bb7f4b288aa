//! Top-level error type: aggregates every crate's error through `error_chain`'s
//! `links` facility, plus the runtime's own `ConfigError`.

error_chain::error_chain! {
    links {
        Overlay(p2p_overlay::Error, p2p_overlay::ErrorKind) #[doc = "Overlay-layer failure."];
        Frame(p2p_frame::Error, p2p_frame::ErrorKind) #[doc = "Framing/protocol failure."];
        Net(p2p_net::Error, p2p_net::ErrorKind) #[doc = "Socket-level failure."];
        Digest(p2p_digest::Error, p2p_digest::ErrorKind) #[doc = "Hashing/file-lookup failure."];
    }

    foreign_links {
        Io(std::io::Error);
        Json(serde_json::Error);
        Hex(hex::FromHexError);
        SetLogger(log::SetLoggerError);
    }

    errors {
        /// Config file missing a required key or holding a malformed value;
        /// fatal at startup.
        Config(detail: String) {
            description("invalid configuration")
            display("invalid configuration: {}", detail)
        }
    }
}
