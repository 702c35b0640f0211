//! The server side: a listening socket plus a registry of connected peers.
//!
//! # Peer lifecycle
//!
//! ```text
//! accept_one_peer_if_any() / wait_for_exactly(n)
//!            │
//!            ▼
//!       [connected] ── send fails with Disconnected/PartialWrite ──┐
//!            │                                                   │
//!            ├── receive sees EOF, buffered frames drained ──────┤
//!            │                                                   │
//!            └── corrupt stream (bad version bytes) ─────────────┤
//!                                                                ▼
//!                                                  [removed] → take_disconnected()
//! ```
//!
//! The registry is a plain `Vec` in accept order. Everything runs on the
//! caller's thread; nothing here blocks except `wait_for_exactly`.

use std::mem;
use std::net::SocketAddr;

use hearthguard_protocol::{
    encode_packet, take_packet, ClientPacket, Packet, ProtocolError, ServerPacket,
};
use hearthguard_transport::{PeerId, Socket, SocketError, SocketOptions};
use tracing::{debug, error, info, trace, warn};

use crate::SessionError;

/// One accepted connection.
#[derive(Debug)]
struct Peer {
    socket: Socket,
    /// The peer closed its side. Frames it sent before closing are still
    /// delivered; the peer is removed once none are left.
    closing: bool,
}

impl Peer {
    fn id(&self) -> PeerId {
        self.socket.id()
    }

    /// Next decodable packet in this peer's buffer, skipping frames that
    /// fail to decode. Only fatal errors are returned.
    fn next_packet(&mut self) -> Result<Option<ClientPacket>, ProtocolError> {
        loop {
            match take_packet::<ClientPacket>(self.socket.buffer_mut()) {
                Err(e) if !e.is_fatal() => {
                    warn!(peer = %self.id(), error = %e, "dropped undecodable frame");
                }
                other => return other,
            }
        }
    }
}

/// A listening server and its connected peers.
#[derive(Debug)]
pub struct ServerSession {
    listener: Socket,
    peers: Vec<Peer>,
    /// Registry index where the next `poll_message` scan starts.
    next_index: usize,
    /// Peers removed since the last `take_disconnected`.
    disconnected: Vec<PeerId>,
}

impl ServerSession {
    /// Binds a non-blocking listener on `address:port`.
    ///
    /// Pass port 0 to let the OS pick one, then read it back with
    /// [`local_addr`](Self::local_addr).
    pub fn bind(address: &str, port: u16) -> Result<Self, SessionError> {
        let options = SocketOptions {
            nonblocking: true,
            ..SocketOptions::default()
        };
        let mut listener = Socket::create(address, port, options)?;
        listener.listen()?;

        info!(addr = %listener.local_addr()?, "server listening");
        Ok(Self {
            listener,
            peers: Vec::new(),
            next_index: 0,
            disconnected: Vec::new(),
        })
    }

    /// Accepts one waiting peer, if any. Call once per tick.
    ///
    /// Returns `Ok(None)` when nobody is waiting.
    pub fn accept_one_peer_if_any(&mut self) -> Result<Option<PeerId>, SessionError> {
        match self.listener.accept() {
            Ok(socket) => self.register(socket).map(Some),
            Err(SocketError::WouldBlock) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Blocks until `n` peers are connected.
    ///
    /// The listener is switched back to non-blocking before returning,
    /// also on error.
    pub fn wait_for_exactly(&mut self, n: usize) -> Result<(), SessionError> {
        info!(have = self.peers.len(), want = n, "waiting for peers");
        self.listener.set_nonblocking(false)?;

        let result = self.accept_blocking_until(n);
        let restored = self.listener.set_nonblocking(true);
        keep_accept_error(result, restored)
    }

    fn accept_blocking_until(&mut self, n: usize) -> Result<(), SessionError> {
        while self.peers.len() < n {
            let socket = self.listener.accept()?;
            self.register(socket)?;
        }
        Ok(())
    }

    fn register(&mut self, mut socket: Socket) -> Result<PeerId, SessionError> {
        socket.set_nonblocking(true)?;
        let id = socket.id();
        info!(peer = %id, addr = %socket.addr(), peers = self.peers.len() + 1, "peer connected");
        self.peers.push(Peer {
            socket,
            closing: false,
        });
        Ok(id)
    }

    /// Sends `packet` to every connected peer.
    ///
    /// The packet is encoded once. A peer whose send reports a disconnect
    /// is removed and the rest still get the frame.
    ///
    /// # Errors
    /// The first error other than a disconnect, after every peer has been
    /// tried.
    pub fn broadcast(&mut self, packet: impl Into<ServerPacket>) -> Result<(), SessionError> {
        let packet = packet.into();
        let frame = encode_packet(&packet)?;
        trace!(packet = packet.name(), peers = self.peers.len(), "broadcast");
        self.send_where(&frame, |_| true)
    }

    /// Sends `packet` to one peer.
    ///
    /// # Errors
    /// [`SessionError::UnknownPeer`] if `peer` is not connected. A
    /// disconnect during the send removes the peer and is not an error.
    pub fn send_to(
        &mut self,
        peer: PeerId,
        packet: impl Into<ServerPacket>,
    ) -> Result<(), SessionError> {
        if !self.is_connected(peer) {
            return Err(SessionError::UnknownPeer(peer));
        }
        let packet = packet.into();
        let frame = encode_packet(&packet)?;
        trace!(packet = packet.name(), %peer, "send");
        self.send_where(&frame, |id| id == peer)
    }

    /// Sends `packet` to every peer except `peer`.
    pub fn send_to_all_except(
        &mut self,
        peer: PeerId,
        packet: impl Into<ServerPacket>,
    ) -> Result<(), SessionError> {
        let packet = packet.into();
        let frame = encode_packet(&packet)?;
        trace!(packet = packet.name(), except = %peer, "send to all except");
        self.send_where(&frame, |id| id != peer)
    }

    fn send_where(
        &mut self,
        frame: &[u8],
        mut include: impl FnMut(PeerId) -> bool,
    ) -> Result<(), SessionError> {
        let mut first_error = None;
        let mut gone = Vec::new();

        for peer in self.peers.iter_mut().filter(|p| include(p.id())) {
            match peer.socket.send(frame) {
                Ok(()) => {}
                Err(e) if e.is_disconnect() => {
                    debug!(peer = %peer.id(), error = %e, "send hit a closed connection");
                    gone.push(peer.id());
                }
                Err(e) => {
                    warn!(peer = %peer.id(), error = %e, "send failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        for id in gone {
            self.remove_peer(id);
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Returns the next complete packet from any peer, with the peer it
    /// came from.
    ///
    /// Receives on every peer first, then scans the registry starting
    /// after the peer served by the previous call, so every peer gets a
    /// turn. Returns at most one packet; call it until it returns `None`
    /// to drain everything buffered.
    ///
    /// Undecodable frames are dropped. A peer whose stream is corrupt or
    /// closed is removed and shows up in
    /// [`take_disconnected`](Self::take_disconnected).
    pub fn poll_message(&mut self) -> Option<(PeerId, ClientPacket)> {
        for peer in &mut self.peers {
            match peer.socket.receive() {
                Ok(_) => {}
                Err(e) if e.is_disconnect() => peer.closing = true,
                Err(e) => warn!(peer = %peer.id(), error = %e, "receive failed"),
            }
        }

        let len = self.peers.len();
        let mut gone = Vec::new();
        let mut found = None;

        for offset in 0..len {
            let index = (self.next_index + offset) % len;
            let peer = &mut self.peers[index];
            match peer.next_packet() {
                Ok(Some(packet)) => {
                    found = Some((index, peer.id(), packet));
                    break;
                }
                Ok(None) if peer.closing => gone.push(peer.id()),
                Ok(None) => {}
                Err(e) => {
                    error!(peer = %peer.id(), error = %e, "stream from peer is corrupt, dropping");
                    gone.push(peer.id());
                }
            }
        }

        if let Some((index, ..)) = found {
            self.next_index = index + 1;
        }
        for id in gone {
            self.remove_peer(id);
        }

        found.map(|(_, peer, packet)| {
            trace!(%peer, packet = packet.name(), "received from peer");
            (peer, packet)
        })
    }

    fn remove_peer(&mut self, id: PeerId) {
        let Some(index) = self.peers.iter().position(|p| p.id() == id) else {
            return;
        };
        let mut peer = self.peers.remove(index);
        if index < self.next_index {
            self.next_index -= 1;
        }
        if peer.socket.is_open() {
            let _ = peer.socket.shutdown();
        }

        info!(peer = %id, peers = self.peers.len(), "peer disconnected");
        self.disconnected.push(id);
    }

    /// Drains the peers removed since the last call, in removal order.
    /// Each removed peer is reported exactly once.
    pub fn take_disconnected(&mut self) -> Vec<PeerId> {
        mem::take(&mut self.disconnected)
    }

    /// Connected peers in accept order.
    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().map(Peer::id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.peers.iter().any(|p| p.id() == peer)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shuts every peer and the listener down.
    pub fn close(&mut self) {
        for mut peer in self.peers.drain(..) {
            if peer.socket.is_open() {
                let _ = peer.socket.shutdown();
            }
        }
        if self.listener.is_open() {
            let _ = self.listener.shutdown();
        }
        self.next_index = 0;
        info!("server session closed");
    }
}

/// Combines the outcome of a blocking accept with switching the listener
/// back to non-blocking. An accept error wins; a failed restore is logged
/// and only returned when the accept itself succeeded.
fn keep_accept_error(
    result: Result<(), SessionError>,
    restored: Result<(), SocketError>,
) -> Result<(), SessionError> {
    match restored {
        Ok(()) => result,
        Err(e) => {
            error!(error = %e, "could not switch the listener back to non-blocking");
            result.and(Err(e.into()))
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if self.listener.is_open() || !self.peers.is_empty() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_port_zero_reports_local_addr() {
        let server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        let addr = server.local_addr().expect("addr");
        assert_ne!(addr.port(), 0);
        assert_eq!(server.peer_count(), 0);
    }

    #[test]
    fn test_bind_invalid_address_fails() {
        let err = ServerSession::bind("localhost:nope", 0).expect_err("bad address");
        assert!(matches!(
            err,
            SessionError::Socket(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_keep_accept_error_prefers_accept_failure() {
        let result = keep_accept_error(
            Err(SocketError::NotConnected.into()),
            Err(SocketError::InvalidDescriptor),
        );
        assert!(matches!(
            result,
            Err(SessionError::Socket(SocketError::NotConnected))
        ));
    }

    #[test]
    fn test_keep_accept_error_reports_failed_restore_after_success() {
        let result = keep_accept_error(Ok(()), Err(SocketError::InvalidDescriptor));
        assert!(matches!(
            result,
            Err(SessionError::Socket(SocketError::InvalidDescriptor))
        ));
        assert!(keep_accept_error(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn test_wait_for_exactly_zero_leaves_listener_nonblocking() {
        let mut server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        server.wait_for_exactly(0).expect("nothing to wait for");
        assert!(server.listener.is_nonblocking());
        assert!(server.accept_one_peer_if_any().expect("accept").is_none());
    }

    #[test]
    fn test_accept_with_nobody_waiting_returns_none() {
        let mut server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        assert!(server.accept_one_peer_if_any().expect("accept").is_none());
    }

    #[test]
    fn test_poll_with_no_peers_returns_none() {
        let mut server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        assert!(server.poll_message().is_none());
        assert!(server.take_disconnected().is_empty());
    }

    #[test]
    fn test_broadcast_with_no_peers_is_ok() {
        let mut server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        server
            .broadcast(hearthguard_protocol::StartGameResponse)
            .expect("broadcast");
    }

    #[test]
    fn test_send_to_unknown_peer_fails() {
        let mut server = ServerSession::bind("127.0.0.1", 0).expect("bind");
        let err = server
            .send_to(PeerId::new(u32::MAX), hearthguard_protocol::StartGameResponse)
            .expect_err("unknown");
        assert!(matches!(err, SessionError::UnknownPeer(p) if p == PeerId::new(u32::MAX)));
    }
}
