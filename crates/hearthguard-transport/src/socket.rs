//! The [`Socket`] endpoint: one OS byte stream plus its receive buffer.

use std::io::{self, Read, Write};
use std::mem;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};

use bytes::BytesMut;

use crate::{PeerId, SocketError};

/// How many bytes a single `read` call may pull off the OS buffer.
const READ_CHUNK: usize = 4096;

/// Options applied when the endpoint is opened.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// Put the endpoint in non-blocking mode as soon as it is open.
    pub nonblocking: bool,
    /// Disable Nagle's algorithm on streams. Small frames go out at once.
    pub nodelay: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            nonblocking: false,
            nodelay: true,
        }
    }
}

/// The OS handle, in whichever lifecycle stage it currently is.
#[derive(Debug)]
enum Handle {
    /// Created but neither connected nor listening yet.
    Idle,
    Stream(TcpStream),
    Listener(TcpListener),
    /// Shut down. Every further operation fails.
    Closed,
}

/// An exclusively owned byte-stream endpoint.
///
/// `Socket` is not `Clone`: two owners of one handle would
/// double-read into different buffers or shut the stream down twice.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ connect_to() ──→ send()/receive() ──→ shutdown()
///    │
///    └──────→ listen() ──→ accept() ──→ (new stream Socket)
/// ```
///
/// Bytes read by [`receive`](Self::receive) are appended to an internal
/// buffer and stay there until the frame layer consumes them through
/// [`buffer_mut`](Self::buffer_mut).
#[derive(Debug)]
pub struct Socket {
    id: PeerId,
    addr: SocketAddr,
    handle: Handle,
    options: SocketOptions,
    recv_buf: BytesMut,
}

impl Socket {
    /// Creates an endpoint for `address:port` without opening it.
    ///
    /// No OS handle exists until [`connect_to`](Self::connect_to) or
    /// [`listen`](Self::listen), so OS failures such as
    /// [`SocketError::NoAccess`] or [`SocketError::Unknown`] are reported
    /// by those calls, never by `create`.
    ///
    /// # Errors
    /// [`SocketError::InvalidAddress`] if `address` is not an IP literal.
    pub fn create(
        address: &str,
        port: u16,
        options: SocketOptions,
    ) -> Result<Self, SocketError> {
        let ip: IpAddr = address.parse().map_err(|_| {
            tracing::error!(address, port, "could not parse socket address");
            SocketError::InvalidAddress(address.to_string())
        })?;

        Ok(Self {
            id: PeerId::next(),
            addr: SocketAddr::new(ip, port),
            handle: Handle::Idle,
            options,
            recv_buf: BytesMut::new(),
        })
    }

    /// Connects to the endpoint's address. Blocks until the handshake
    /// completes, then applies the configured options.
    pub fn connect_to(&mut self) -> Result<(), SocketError> {
        if !matches!(self.handle, Handle::Idle) {
            return Err(SocketError::InvalidDescriptor);
        }

        let stream = TcpStream::connect(self.addr).map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "connect failed");
            SocketError::from(e)
        })?;
        stream.set_nodelay(self.options.nodelay)?;
        stream.set_nonblocking(self.options.nonblocking)?;

        tracing::debug!(id = %self.id, addr = %self.addr, "socket connected");
        self.handle = Handle::Stream(stream);
        Ok(())
    }

    /// Binds to the endpoint's address and starts listening.
    ///
    /// The standard library performs bind and listen as one step.
    pub fn listen(&mut self) -> Result<(), SocketError> {
        if !matches!(self.handle, Handle::Idle) {
            return Err(SocketError::InvalidDescriptor);
        }

        let listener = TcpListener::bind(self.addr).map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "bind failed");
            SocketError::from(e)
        })?;
        listener.set_nonblocking(self.options.nonblocking)?;

        tracing::debug!(id = %self.id, addr = %self.addr, "socket listening");
        self.handle = Handle::Listener(listener);
        Ok(())
    }

    /// Accepts one pending peer.
    ///
    /// On a non-blocking listener with nobody waiting this returns
    /// [`SocketError::WouldBlock`], which callers should expect on most
    /// ticks. The accepted socket starts in blocking mode.
    pub fn accept(&mut self) -> Result<Socket, SocketError> {
        let Handle::Listener(listener) = &self.handle else {
            return Err(SocketError::InvalidDescriptor);
        };

        let (stream, addr) = listener.accept().map_err(|e| {
            let err = SocketError::from(e);
            if !err.is_would_block() {
                tracing::error!(error = %err, "accept failed");
            }
            err
        })?;
        stream.set_nodelay(self.options.nodelay)?;

        let socket = Socket {
            id: PeerId::next(),
            addr,
            handle: Handle::Stream(stream),
            options: SocketOptions {
                nonblocking: false,
                ..self.options
            },
            recv_buf: BytesMut::new(),
        };
        tracing::debug!(id = %socket.id, %addr, "accepted connection");
        Ok(socket)
    }

    /// Writes the whole buffer.
    ///
    /// # Errors
    /// - [`SocketError::WouldBlock`] if the OS send buffer is full and
    ///   nothing was written. The data is NOT queued.
    /// - [`SocketError::PartialWrite`] if the buffer filled up after part
    ///   of `bytes` was written.
    /// - [`SocketError::Disconnected`] if the peer closed the connection.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), SocketError> {
        let stream = match &mut self.handle {
            Handle::Stream(stream) => stream,
            Handle::Closed => return Err(SocketError::InvalidDescriptor),
            _ => return Err(SocketError::NotConnected),
        };

        let total = bytes.len();
        let mut written = 0;
        while written < total {
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(SocketError::Disconnected),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock && written > 0 =>
                {
                    tracing::error!(id = %self.id, written, total, "write stalled mid-frame");
                    return Err(SocketError::PartialWrite { written, total });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::trace!(id = %self.id, len = total, "sent bytes");
        Ok(())
    }

    /// Drains everything the OS has buffered into the receive buffer.
    ///
    /// In non-blocking mode this reads until the OS reports "would block"
    /// and returns the number of bytes appended, possibly zero. In blocking
    /// mode it performs a single read.
    ///
    /// # Errors
    /// [`SocketError::Disconnected`] when the peer has closed the stream.
    /// Bytes read before the close are still appended to the buffer.
    pub fn receive(&mut self) -> Result<usize, SocketError> {
        let stream = match &mut self.handle {
            Handle::Stream(stream) => stream,
            Handle::Closed => return Err(SocketError::InvalidDescriptor),
            _ => return Err(SocketError::NotConnected),
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!(id = %self.id, "peer closed the stream");
                    return Err(SocketError::Disconnected);
                }
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&chunk[..n]);
                    total += n;
                    if !self.options.nonblocking {
                        return Ok(total);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if total > 0 {
                        tracing::trace!(id = %self.id, len = total, "received bytes");
                    }
                    return Ok(total);
                }
                Err(e) => {
                    let err = SocketError::from(e);
                    if err.is_disconnect() {
                        tracing::debug!(id = %self.id, error = %err, "stream reset by peer");
                    } else {
                        tracing::error!(id = %self.id, error = %err, "receive failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Switches the OS blocking flag.
    ///
    /// On an endpoint that is not open yet the setting is remembered and
    /// applied by [`connect_to`](Self::connect_to) or [`listen`](Self::listen).
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), SocketError> {
        match &self.handle {
            Handle::Stream(stream) => stream.set_nonblocking(nonblocking)?,
            Handle::Listener(listener) => listener.set_nonblocking(nonblocking)?,
            Handle::Idle => {}
            Handle::Closed => return Err(SocketError::InvalidDescriptor),
        }
        self.options.nonblocking = nonblocking;
        Ok(())
    }

    /// Shuts the endpoint down. Unsent data is not guaranteed to arrive.
    ///
    /// Calling this on an endpoint that is already closed (or was never
    /// opened) returns [`SocketError::InvalidDescriptor`].
    pub fn shutdown(&mut self) -> Result<(), SocketError> {
        match mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Stream(stream) => {
                tracing::debug!(id = %self.id, "shutting down stream");
                match stream.shutdown(Shutdown::Both) {
                    // The peer beat us to it.
                    Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
                    other => other.map_err(SocketError::from),
                }
            }
            Handle::Listener(_) => {
                tracing::debug!(id = %self.id, "closing listener");
                Ok(())
            }
            Handle::Idle | Handle::Closed => Err(SocketError::InvalidDescriptor),
        }
    }

    /// The identifier assigned when this socket was created or accepted.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// The remote address for streams, the bind address for listeners.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The locally bound address. Useful after binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        match &self.handle {
            Handle::Stream(stream) => Ok(stream.local_addr()?),
            Handle::Listener(listener) => Ok(listener.local_addr()?),
            Handle::Idle => Err(SocketError::NotConnected),
            Handle::Closed => Err(SocketError::InvalidDescriptor),
        }
    }

    /// Whether the OS handle is currently in non-blocking mode.
    pub fn is_nonblocking(&self) -> bool {
        self.options.nonblocking
    }

    /// Whether the endpoint is connected or listening.
    pub fn is_open(&self) -> bool {
        matches!(self.handle, Handle::Stream(_) | Handle::Listener(_))
    }

    /// Bytes received but not yet consumed.
    pub fn buffer(&self) -> &[u8] {
        &self.recv_buf
    }

    /// Mutable access for the frame layer to split complete frames off.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.recv_buf
    }
}
