//! The Event Loop (§4.7): a single-threaded readiness multiplexer over every
//! receive socket and the description server's TCP listener, with
//! deadline-based wakeups for the refresh and announce timers.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use mio::net::{TcpListener, UdpSocket};
use mio::{Events, Interest, Poll, Token};

use crate::announce::{announce, respond, AnnounceMode};
use crate::config::Config;
use crate::identity::DiscoveryIdentity;
use crate::message::codec::ParsedSearch;
use crate::net::MAX_PKT_SIZE;
use crate::refresh::refresh;
use crate::registry::InterfaceRegistry;

const TOKEN_LISTENER_V4: Token = Token(0);
const TOKEN_LISTENER_V6: Token = Token(1);
const TOKEN_HTTP: Token = Token(2);

/// Runs until `shutdown` is flipped to `true` (by a signal handler) or a
/// fatal I/O error occurs on a listener socket.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    listener_v4: UdpSocket,
    listener_v6: UdpSocket,
    http_listener: TcpListener,
    registry: InterfaceRegistry,
    identity: DiscoveryIdentity,
    config: Config,
    shutdown: Arc<AtomicBool>,
    refresh_at: Instant,
    announce_at: Instant,
}

impl EventLoop {
    pub fn new(
        mut listener_v4: UdpSocket,
        mut listener_v6: UdpSocket,
        mut http_listener: TcpListener,
        registry: InterfaceRegistry,
        identity: DiscoveryIdentity,
        config: Config,
        shutdown: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry().register(&mut listener_v4, TOKEN_LISTENER_V4, Interest::READABLE)?;
        poll.registry().register(&mut listener_v6, TOKEN_LISTENER_V6, Interest::READABLE)?;
        poll.registry().register(&mut http_listener, TOKEN_HTTP, Interest::READABLE)?;

        let now = Instant::now();
        let announce_at = now + config.announce_interval;
        Ok(EventLoop {
            poll,
            events: Events::with_capacity(128),
            listener_v4,
            listener_v6,
            http_listener,
            registry,
            identity,
            config,
            shutdown,
            refresh_at: now,
            announce_at,
        })
    }

    /// Run the loop until shutdown is requested (§4.7/§4.12).
    pub fn run(&mut self) -> io::Result<()> {
        refresh(&mut self.registry, &self.listener_v6, &self.config.iface_allowlist);
        announce(&mut self.registry, &self.identity, AnnounceMode::Full);

        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();

            if self.refresh_at <= now {
                let changed = refresh(&mut self.registry, &self.listener_v6, &self.config.iface_allowlist);
                if changed > 0 {
                    announce(&mut self.registry, &self.identity, AnnounceMode::Incremental);
                }
                self.refresh_at = now + self.config.refresh_interval;
            }

            if self.announce_at <= now {
                announce(&mut self.registry, &self.identity, AnnounceMode::Full);
                self.announce_at = now + self.config.announce_interval;
            }

            let deadline = self.refresh_at.min(self.announce_at);
            let timeout = deadline.saturating_duration_since(Instant::now());

            match self.poll.poll(&mut self.events, Some(timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let tokens: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
            for token in tokens {
                match token {
                    TOKEN_LISTENER_V4 => self.drain_ssdp_socket(Family::V4),
                    TOKEN_LISTENER_V6 => self.drain_ssdp_socket(Family::V6),
                    TOKEN_HTTP => self.accept_http(),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn drain_ssdp_socket(&mut self, family: Family) {
        let mut buf = [0u8; MAX_PKT_SIZE];
        loop {
            let recv = match family {
                Family::V4 => self.listener_v4.recv_from(&mut buf),
                Family::V6 => self.listener_v6.recv_from(&mut buf),
            };
            match recv {
                Ok((len, peer)) => self.handle_datagram(&buf[..len.min(MAX_PKT_SIZE)], peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("recv_from failed: {e}");
                    break;
                }
            }
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        match crate::message::parse_search_target(datagram) {
            ParsedSearch::NotASearch => {}
            ParsedSearch::Malformed => debug!("Dropping malformed M-SEARCH from {peer}"),
            ParsedSearch::Target(st) => {
                if self.identity.supports(&st) {
                    respond(&self.registry, &self.identity, peer, &st);
                } else {
                    debug!("Unsupported search target {st} from {peer}");
                }
            }
        }
    }

    fn accept_http(&mut self) {
        loop {
            match self.http_listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = crate::http::handle_connection(stream, peer, &self.identity) {
                        warn!("Description server error for {peer}: {e}");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("accept failed: {e}");
                    break;
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Family {
    V4,
    V6,
}
