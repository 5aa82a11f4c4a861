//! The mio event loop, generalized from the teacher's `HttpSidecar`
//! (`kimberlite-server::http`) and `Connection` (`kimberlite-server::connection`)
//! away from "one 1024-byte read, GET-only" and toward arbitrary methods
//! and bodies bounded by `Content-Length`, read across as many poll ticks
//! as it takes.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, warn};

use crate::request;
use crate::routes::{self, AppState};

const LISTENER_TOKEN: Token = Token(0);

struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    closing: bool,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::new(),
            closing: false,
        }
    }

    fn read(&mut self) -> io::Result<bool> {
        let mut temp = [0u8; 4096];
        loop {
            match self.stream.read(&mut temp) {
                Ok(0) => return Ok(false),
                Ok(n) => self.read_buf.extend_from_slice(&temp[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }

    fn flush(&mut self) -> io::Result<bool> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write to socket")),
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn interest(&self) -> Interest {
        if self.write_buf.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }
}

/// The Timer API / resync API / sidecar front-end (spec.md §4.9, §5: "HTTP
/// acceptor + dispatcher: runs the request handlers; each request executes
/// to completion" — here, on this single event-loop thread).
pub struct HttpServer {
    listener: TcpListener,
    poll: Poll,
    connections: HashMap<Token, Connection>,
    next_token: usize,
}

impl HttpServer {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        tracing::info!("chronos HTTP front-end listening on {addr}");
        Ok(Self { listener, poll, connections: HashMap::new(), next_token: 1 })
    }

    /// Runs the accept/dispatch loop until `shutdown` is set, e.g. by a
    /// `signal_hook::flag::register(SIGTERM, ...)` handle installed in
    /// `chronos-server`'s `main`.
    pub fn run(&mut self, state: &AppState, shutdown: &AtomicBool) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        while !shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut events, Some(Duration::from_millis(200))) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let tokens: Vec<Token> = events.iter().map(|e| e.token()).collect();
            for token in tokens {
                if token == LISTENER_TOKEN {
                    self.accept_all();
                } else {
                    self.service(token, state);
                }
            }
        }
        Ok(())
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    debug!("http connection from {addr}");
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        warn!("failed to register http connection: {e}");
                        continue;
                    }
                    self.connections.insert(token, Connection::new(stream));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    error!("http accept error: {e}");
                    return;
                }
            }
        }
    }

    fn service(&mut self, token: Token, state: &AppState) {
        let Some(conn) = self.connections.get_mut(&token) else { return };

        match conn.read() {
            Ok(true) => {}
            Ok(false) => conn.closing = true,
            Err(e) => {
                warn!("http read error: {e}");
                conn.closing = true;
            }
        }

        if !conn.closing {
            if let Some(outcome) = request::try_parse(&conn.read_buf) {
                let response = routes::dispatch(state, &outcome.request);
                conn.write_buf.extend_from_slice(&response.to_bytes());
                let _ = conn.read_buf.split_to(outcome.consumed);
                // No keep-alive: one request per connection, as the teacher's
                // sidecar does.
                conn.closing = true;
            }
        }

        if let Err(e) = conn.flush() {
            debug!("http write error: {e}");
            conn.closing = true;
        }

        if conn.closing && conn.write_buf.is_empty() {
            if let Some(mut conn) = self.connections.remove(&token) {
                let _ = self.poll.registry().deregister(&mut conn.stream);
            }
        } else if let Some(conn) = self.connections.get_mut(&token) {
            let _ = self.poll.registry().reregister(&mut conn.stream, token, conn.interest());
        }
    }
}
