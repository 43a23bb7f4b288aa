//! TCP listener/dialer primitives: address-reuse, a listen backlog of 100,
//! IPv4-only, and port 0 requesting ephemeral assignment.

#[macro_use]
extern crate error_chain;

pub mod error;

pub use error::{Error, Result};

use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};

use socket2::{Domain, Socket, Type};

/// Backlog passed to `listen(2)`.
const LISTEN_BACKLOG: i32 = 100;

/// Binds a TCP listener on `0.0.0.0:port` with `SO_REUSEADDR` set and a backlog of
/// 100. `port = 0` requests ephemeral assignment.
pub fn listen(port: u16) -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;

    let addr: SocketAddr = SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, port).into();
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    let listener: TcpListener = socket.into();
    log::info!("listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Resolves `host` and opens an IPv4 TCP connection to `host:port`.
pub fn dial(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))?;
    log::info!("connected to {}:{}", host, port);
    Ok(stream)
}

/// Blocks until one client connects, returning its stream and remote address.
pub fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr)> {
    let (stream, addr) = listener.accept()?;
    log::info!("accepted connection from {}", addr);
    Ok((stream, addr))
}
