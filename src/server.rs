//! Server loop (C6).
//!
//! Accepts one client at a time over a plain blocking `TcpListener`,
//! framing and dispatching requests with a short read timeout so the
//! loop stays responsive to external shutdown. Ported from the reference
//! server's `serve`/`_serve`.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::rsp::{dispatch, DispatchOutcome, Framer};
use crate::session::Session;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const RECV_CHUNK: usize = 4096;
const LISTEN_BACKLOG: i32 = 128;

/// Bind a listening socket on `host:port` with `SO_REUSEADDR` set before
/// `bind`, matching the reference server's `setsockopt(SO_REUSEADDR)` call
/// ahead of its own bind — plain `TcpListener::bind` has no portable way to
/// set this option pre-bind.
pub fn bind_with_reuseaddr(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("no address found for {}:{}", host, port),
        )
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// Serve debugger connections against `session` forever, one at a time.
///
/// Returns only on a listener-level I/O error (failure to bind or
/// accept); per-connection errors just return control to the accept loop.
pub fn serve(listener: &TcpListener, session: &mut Session) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept()?;
        log::info!("remote connection from {}", peer);
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        if let Err(err) = serve_one(stream, session) {
            log::warn!("connection terminated: {}", err);
        }
    }
}

fn serve_one(mut stream: TcpStream, session: &mut Session) -> std::io::Result<()> {
    let mut framer = Framer::new();
    let mut chunk = [0u8; RECV_CHUNK];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => return Err(e),
        };
        framer.push(&chunk[..n]);

        while let Some(outcome) = framer.next_frame() {
            use crate::rsp::FrameOutcome;
            let payload = match outcome {
                FrameOutcome::Valid(payload) => {
                    if !session.no_ack {
                        stream.write_all(b"+")?;
                    }
                    payload
                }
                FrameOutcome::Invalid => {
                    if !session.no_ack {
                        stream.write_all(b"-")?;
                    }
                    continue;
                }
            };

            log::debug!("request: {:?}", String::from_utf8_lossy(&payload));
            match dispatch(session, &payload) {
                DispatchOutcome::Reply(reply) => {
                    log::debug!("reply: {:?}", reply);
                    stream.write_all(&crate::rsp::encode(reply.as_bytes()))?;
                }
                DispatchOutcome::Close => {
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    return Ok(());
                }
            }
        }
    }
}
