//! Binary framing and the fixed-layout message set carried over it.
//!
//! Split into a transport-agnostic `frame` module and a `protocol` module of
//! typed payloads.

#[macro_use]
extern crate error_chain;

pub mod error;
pub mod frame;
pub mod protocol;

pub use error::{Error, ErrorKind, Result};
pub use frame::{recv as recv_frame, send as send_frame, MAX_FRAME_PAYLOAD};
pub use protocol::Message;

use std::io::{Read, Write};

/// Sends a typed `Message` as a single frame.
pub fn send_message<W: Write>(writer: &mut W, message: &Message) -> Result<usize> {
    let payload = message.encode()?;
    frame::send(writer, message.type_code(), &payload)
}

/// Receives one frame and decodes it into a typed `Message`.
pub fn recv_message<R: Read>(reader: &mut R) -> Result<Message> {
    let (type_code, payload) = frame::recv(reader)?;
    Message::decode(type_code, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Ping, PeerIdentifier};

    #[test]
    fn message_round_trip_through_a_real_stream_shaped_buffer() {
        let ping = Message::Ping(Ping {
            self_info: PeerIdentifier::new("node-a", 6000, [1u8; 16]),
            timestamp: 99,
        });

        let mut buf = Vec::new();
        send_message(&mut buf, &ping).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = recv_message(&mut cursor).unwrap();
        assert_eq!(decoded, ping);
    }
}
