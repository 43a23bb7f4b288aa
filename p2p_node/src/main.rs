//! Entry point: banner, config, logger, and the three service loops.

mod config;
mod error;
mod logger;

use std::io::{BufRead, Write as IoWrite};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use rand::RngCore;

use p2p_frame::protocol::{Message, NameSearchHit, PeerIdentifier, QueryIdentifier};
use p2p_overlay::{write_handle, Overlay, OverlayConfig, WriteHandle};

use crate::config::Config;
use crate::error::Result;

const BANNER: &str = "\
==========================================
  overlay node -- gnutella-style file mesh
==========================================";

#[derive(Parser, Debug)]
#[clap(name = "p2p-node")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Peer-to-peer file-sharing overlay node")]
struct Cli {
    /// Path to the JSON configuration file.
    #[clap(value_parser, default_value = "config.json")]
    config_path: PathBuf,
}

/// Shared state threaded through every connection-handling closure.
struct NodeContext {
    overlay: Arc<Overlay>,
    file_port: u16,
}

fn main() {
    let cli = Cli::parse();
    println!("{}", BANNER);

    let config = match Config::load(&cli.config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error initializing node: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = install_logger(&config.log_file_path) {
        eprintln!("error initializing node: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        log::error!("fatal error running node: {}", e);
        std::process::exit(1);
    }
}

fn install_logger(log_file_path: &str) -> Result<()> {
    let logger = logger::AppendFileLogger::open(log_file_path)?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(log::LevelFilter::Debug);
    Ok(())
}

fn self_identifier(message_port: u16) -> PeerIdentifier {
    let host_name = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
    let mut id = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut id);
    PeerIdentifier::new(host_name, message_port, id)
}

fn run(config: Config) -> Result<()> {
    let famous = config.famous_peer_identifiers()?;
    let self_info = self_identifier(config.message_port);
    log::info!("starting as {}:{}", self_info.host_name, self_info.port);

    let overlay_config = OverlayConfig {
        max_peers: config.max_peers,
        max_init_peers: config.max_init_peers,
        query_ttl: config.query_time_to_live,
        cache_check_secs: config.cache_time_to_check,
        cache_ttl_secs: config.cache_time_to_live,
    };
    let overlay = Arc::new(Overlay::new(self_info, overlay_config, config.file_directory.clone()));
    overlay.file_index().rescan()?;

    let ctx = Arc::new(NodeContext { overlay: overlay.clone(), file_port: config.file_port });
    let shutdown = Arc::new(AtomicBool::new(false));

    let sweeper_overlay = overlay.clone();
    std::thread::spawn(move || p2p_overlay::sweeper::run(sweeper_overlay));

    let message_listener = p2p_net::listen(config.message_port)?;
    let file_listener = p2p_net::listen(config.file_port)?;

    {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || message_loop(message_listener, ctx, shutdown));
    }
    {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || file_loop(file_listener, ctx, shutdown));
    }

    join_famous(&ctx, &famous);

    user_loop(&ctx, &famous, config.message_port, config.file_port, &shutdown);
    log::info!("shutdown complete");
    Ok(())
}

fn join_famous(ctx: &Arc<NodeContext>, famous: &[PeerIdentifier]) {
    for (peer_id, stream, writer) in ctx.overlay.join(famous) {
        log::info!("joined peer {}", peer_id.host_name);
        let ctx = ctx.clone();
        std::thread::spawn(move || service_connection(ctx, stream, Some(peer_id), Some(writer)));
    }
}

fn message_loop(listener: std::net::TcpListener, ctx: Arc<NodeContext>, shutdown: Arc<AtomicBool>) {
    loop {
        match p2p_net::accept(&listener) {
            Ok((stream, _addr)) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                spawn_connection(ctx.clone(), stream);
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!("message accept error: {}", e);
            }
        }
    }
}

fn file_loop(listener: std::net::TcpListener, ctx: Arc<NodeContext>, shutdown: Arc<AtomicBool>) {
    loop {
        match p2p_net::accept(&listener) {
            Ok((mut stream, _addr)) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let overlay = ctx.overlay.clone();
                std::thread::spawn(move || {
                    if let Err(e) = p2p_overlay::transfer::serve_file_request(&mut stream, overlay.file_index()) {
                        log::warn!("serving file request failed: {}", e);
                    }
                });
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!("file accept error: {}", e);
            }
        }
    }
}

fn spawn_connection(ctx: Arc<NodeContext>, stream: TcpStream) {
    std::thread::spawn(move || service_connection(ctx, stream, None, None));
}

/// Services one message-port connection until it closes, dispatching each frame
/// into the overlay and removing the peer table entry (if any was established)
/// on exit.
///
/// `identity`/`writer` are pre-seeded for connections this node dialed itself: the
/// peer already PONG'd during `join` and won't send a PING, so without a seed the
/// `Message::Ping` arm below (the only place `identity` is otherwise set) would
/// never fire and every subsequent `Query`/`QueryHit`/`Splash`/... would be dropped.
/// The seeded `writer` is the same handle `join` registered in the peer table, so
/// the table entry and this loop serialize writes through one `Mutex` rather than
/// two independent ones over the same socket.
fn service_connection(
    ctx: Arc<NodeContext>,
    stream: TcpStream,
    mut identity: Option<PeerIdentifier>,
    writer: Option<WriteHandle>,
) {
    let mut read_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("could not clone connection: {}", e);
            return;
        }
    };
    let writer = writer.unwrap_or_else(|| write_handle(stream));

    loop {
        let msg = match p2p_frame::recv_message(&mut read_stream) {
            Ok(m) => m,
            Err(e) => {
                match &e.0 {
                    p2p_frame::ErrorKind::PeerClosed => log::info!("connection closed"),
                    _ => log::warn!("framing error: {}", e),
                }
                break;
            }
        };

        match dispatch(&ctx, msg, &writer, &mut identity) {
            // identity is Some from the start on outbound connections; the Ping arm
            // in dispatch still reseeds it for inbound ones.
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                log::warn!("dispatch error: {}", e);
                break;
            }
        }
    }

    if let Some(id) = identity {
        ctx.overlay.peers().remove(&id.host_name);
        log::info!("removed peer {} (connection closed)", id.host_name);
    }
}

fn send_to(writer: &WriteHandle, message: &Message) -> Result<()> {
    let mut guard = writer.lock().unwrap();
    p2p_frame::send_message(&mut *guard, message)?;
    Ok(())
}

/// Returns `Ok(true)` to keep servicing the connection, `Ok(false)` to close it.
fn dispatch(
    ctx: &Arc<NodeContext>,
    msg: Message,
    writer: &WriteHandle,
    identity: &mut Option<PeerIdentifier>,
) -> Result<bool> {
    match msg {
        Message::Ping(ping) => {
            *identity = Some(ping.self_info.clone());
            let outcome = ctx.overlay.handle_ping(ping, writer.clone());
            let keep = outcome.keep_connection;
            send_to(writer, &Message::Pong(outcome.pong))?;
            Ok(keep)
        }
        Message::Splash(splash) => {
            if let Some(id) = identity.clone() {
                ctx.overlay.handle_splash(splash, &id);
            }
            Ok(false)
        }
        Message::Query(query) => {
            if let Some(from) = identity.clone() {
                ctx.overlay.handle_query(query, &from, writer)?;
            }
            Ok(true)
        }
        Message::QueryHit(hit) => {
            if let Some(from) = identity.clone() {
                if let Some(resolved) = ctx.overlay.handle_query_hit(hit, &from)? {
                    fetch_file(ctx.clone(), resolved.id, resolved.destination);
                }
            }
            Ok(true)
        }
        Message::NameSearch(ns) => {
            if let Some(from) = identity.clone() {
                ctx.overlay.handle_name_search(ns, &from, writer)?;
            }
            Ok(true)
        }
        Message::NameSearchHit(hit) => {
            if let Some(from) = identity.clone() {
                if let Some(resolved) = ctx.overlay.handle_name_search_hit(hit, &from)? {
                    fetch_file_by_name_hit(ctx.clone(), resolved);
                }
            }
            Ok(true)
        }
        Message::SecureCheck(sc) => {
            let reply = ctx.overlay.handle_secure_check(sc);
            send_to(writer, &Message::SecureCheck(reply))?;
            Ok(true)
        }
        other => {
            log::warn!("unexpected message type {} on message port", other.type_code());
            Ok(true)
        }
    }
}

/// Dials the file holder and persists the result under its content hash.
fn fetch_file(ctx: Arc<NodeContext>, id: QueryIdentifier, destination: PeerIdentifier) {
    std::thread::spawn(move || match p2p_net::dial(&destination.host_name, ctx.file_port) {
        Ok(mut stream) => match p2p_overlay::transfer::request_file(&mut stream, &id) {
            Ok(bytes) => save_download(&id.hash, &bytes),
            Err(e) => log::warn!("file request to {} failed: {}", destination.host_name, e),
        },
        Err(e) => log::warn!("failed to dial file holder {}: {}", destination.host_name, e),
    });
}

fn fetch_file_by_name_hit(ctx: Arc<NodeContext>, hit: NameSearchHit) {
    let id = QueryIdentifier {
        source: ctx.overlay.self_info().clone(),
        hash: hit.match_id.hash,
        timestamp: hit.timestamp,
    };
    fetch_file(ctx, id, hit.destination);
}

fn save_download(hash: &[u8; 32], bytes: &[u8]) {
    let path = PathBuf::from(format!("{}.download", hex::encode(hash)));
    match std::fs::write(&path, bytes) {
        Ok(()) => log::info!("downloaded {} bytes to {}", bytes.len(), path.display()),
        Err(e) => log::warn!("failed to save downloaded file: {}", e),
    }
}

fn user_loop(
    ctx: &Arc<NodeContext>,
    famous: &[PeerIdentifier],
    message_port: u16,
    file_port: u16,
    shutdown: &Arc<AtomicBool>,
) {
    let stdin = std::io::stdin();
    print!("> ");
    let _ = std::io::stdout().flush();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match command {
            "" => {}
            "join" => join_famous(ctx, famous),
            "search" => match ctx.overlay.init_query(rest) {
                Ok(id) => println!("query issued: {}", id.canonical()),
                Err(e) => println!("search failed: {}", e),
            },
            "name-search" => match ctx.overlay.init_name_search(rest) {
                Ok(ns) => println!("name search issued for {:?}", ns.name),
                Err(e) => println!("name-search failed: {}", e),
            },
            "peers" => {
                for (peer_id, _writer) in ctx.overlay.peers().snapshot_all() {
                    println!("{}:{}", peer_id.host_name, peer_id.port);
                }
            }
            "quit" => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = TcpStream::connect(("127.0.0.1", message_port));
                let _ = TcpStream::connect(("127.0.0.1", file_port));
                break;
            }
            other => println!("unknown command: {}", other),
        }

        print!("> ");
        let _ = std::io::stdout().flush();
    }
}
