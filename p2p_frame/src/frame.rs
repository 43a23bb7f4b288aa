//! Length/type-prefixed send and receive over a stream socket.
//!
//! ```text
//!   4 bytes  type   (u32, little-endian)
//!   4 bytes  length (u32, little-endian)
//!   length   payload bytes
//! ```
//!
//! Framing is strictly synchronous per-connection: callers serialize writers
//! themselves (typically a `Mutex<TcpStream>` held for the duration of one `send`)
//! — these functions do not impose locking, they only implement the wire shape.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, ErrorKind, Result};

/// Default cap on a single frame's payload length; exceeding it is a `ProtocolError`.
pub const MAX_FRAME_PAYLOAD: u32 = 1024 * 1024;

/// Writes a single frame: type, length, then payload. Returns the number of payload
/// bytes written. A partial write anywhere in the frame surfaces as `ErrorKind::Io`,
/// since `write_all` either completes the write fully or errors.
pub fn send<W: Write>(writer: &mut W, msg_type: u32, payload: &[u8]) -> Result<usize> {
    writer.write_u32::<LittleEndian>(msg_type)?;
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(payload.len())
}

/// Reads one frame: the 4-byte type, the 4-byte length, then exactly `length`
/// payload bytes. EOF before the type header is reported as `PeerClosed`; any other
/// short read as `ShortRead`.
pub fn recv<R: Read>(reader: &mut R) -> Result<(u32, Vec<u8>)> {
    let msg_type = match reader.read_u32::<LittleEndian>() {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::from(ErrorKind::PeerClosed))
        }
        Err(e) => return Err(e.into()),
    };

    let len = reader.read_u32::<LittleEndian>()?;
    if len > MAX_FRAME_PAYLOAD {
        return Err(ErrorKind::FrameTooLarge(len, MAX_FRAME_PAYLOAD).into());
    }

    let mut payload = vec![0u8; len as usize];
    match reader.read_exact(&mut payload) {
        Ok(()) => Ok((msg_type, payload)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ErrorKind::ShortRead(len, 0).into())
        }
        Err(e) => Err(e.into()),
    }
}
