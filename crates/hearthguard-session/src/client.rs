//! The client side: one connection to the server.

use std::net::SocketAddr;

use hearthguard_protocol::{encode_packet, take_packet, ClientPacket, Packet, ServerPacket};
use hearthguard_transport::{Socket, SocketError, SocketOptions};
use tracing::{debug, error, info, trace, warn};

use crate::SessionError;

/// A connected client.
///
/// Owns exactly one non-blocking [`Socket`]. Call
/// [`poll_message`](Self::poll_message) once per frame you want, every
/// tick; it never blocks.
///
/// Dropping the session shuts the socket down.
#[derive(Debug)]
pub struct ClientSession {
    socket: Socket,
}

impl ClientSession {
    /// Connects to `address:port` and switches the socket to non-blocking.
    ///
    /// The TCP handshake itself is blocking.
    ///
    /// # Errors
    /// [`SocketError::InvalidAddress`] for a bad IP literal, or whatever
    /// the OS reported for the connect.
    pub fn connect(address: &str, port: u16) -> Result<Self, SessionError> {
        let mut socket = Socket::create(address, port, SocketOptions::default())?;
        socket.connect_to()?;
        socket.set_nonblocking(true)?;

        info!(id = %socket.id(), addr = %socket.addr(), "connected to server");
        Ok(Self { socket })
    }

    /// Encodes `packet` into one frame and writes it.
    ///
    /// # Errors
    /// [`SocketError::WouldBlock`] if the OS send buffer is full. The packet
    /// is not queued; send it again on a later tick if it still matters.
    pub fn send(&mut self, packet: impl Into<ClientPacket>) -> Result<(), SessionError> {
        let packet = packet.into();
        let frame = encode_packet(&packet)?;
        self.socket.send(&frame)?;
        debug!(packet = packet.name(), len = frame.len(), "sent to server");
        Ok(())
    }

    /// Returns the next complete packet from the server, if one has arrived.
    ///
    /// Reads whatever the OS has buffered first. A frame that fails to
    /// decode is logged and skipped, and the next buffered frame is tried.
    ///
    /// # Errors
    /// - [`SocketError::Disconnected`] once the server has closed the
    ///   connection and every frame received before the close has been
    ///   returned.
    /// - A fatal [`ProtocolError`](hearthguard_protocol::ProtocolError):
    ///   the stream lost frame alignment and the socket has been shut down.
    pub fn poll_message(&mut self) -> Result<Option<ServerPacket>, SessionError> {
        let received = self.socket.receive();

        loop {
            match take_packet::<ServerPacket>(self.socket.buffer_mut()) {
                Ok(Some(packet)) => {
                    trace!(packet = packet.name(), "received from server");
                    return Ok(Some(packet));
                }
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "stream from server is corrupt, closing");
                    let _ = self.socket.shutdown();
                    return Err(e.into());
                }
                // The bad frame is already consumed; try the next one.
                Err(e) => warn!(error = %e, "dropped undecodable frame"),
            }
        }

        match received {
            Ok(_) => Ok(None),
            Err(SocketError::Disconnected) => {
                info!("server closed the connection");
                Err(SocketError::Disconnected.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shuts the connection down. Unsent data may be lost.
    pub fn close(&mut self) -> Result<(), SessionError> {
        self.socket.shutdown()?;
        info!(id = %self.socket.id(), "client session closed");
        Ok(())
    }

    /// Whether the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.socket.is_open()
    }

    /// The local address of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if self.socket.is_open() {
            let _ = self.socket.shutdown();
        }
    }
}
