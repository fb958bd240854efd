//! Connection management and message framing.

use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use acp_buffer::{BufferView, BufferWritableView};
use acp_protocol::header::{LENGTH_OFFSET, VERSION_OFFSET};
use acp_protocol::{ProtocolError, DEFAULT_PORT, PREAMBLE_LEN, PROTOCOL_VERSION};

use crate::error::IoError;

/// Fixed backoff between retries on transient socket conditions.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Polling slice while waiting for readability or an incoming connection.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Size of the staging chunk for socket reads.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Default per-wait timeout (data availability, connect, sleep).
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Address to listen on or connect to. The unspecified address means
    /// "any" when listening and loopback when connecting.
    pub address: IpAddr,
    /// TCP port for listening or connecting.
    pub port: u16,
    /// Per-wait timeout, also used by [`Connection::sleep`].
    pub delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            delay: DEFAULT_DELAY,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the default configuration with environment overrides applied
    /// (`ACP_ADDR`, `ACP_PORT`, `ACP_DELAY_MS`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ACP_ADDR") {
            if let Ok(parsed) = addr.parse() {
                self.address = parsed;
            }
        }
        if let Ok(port) = std::env::var("ACP_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }
        if let Ok(ms) = std::env::var("ACP_DELAY_MS") {
            if let Ok(parsed) = ms.parse() {
                self.delay = Duration::from_millis(parsed);
            }
        }
    }

    fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    fn connect_addr(&self) -> SocketAddr {
        let address = if self.address.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.address
        };
        SocketAddr::new(address, self.port)
    }
}

/// Outcome of a framed read loop.
enum ReadOutcome {
    Complete,
    /// Peer closed (EOF or connection reset/abort).
    Eof,
}

/// A single agent/controller connection over blocking TCP.
///
/// Holds at most one established stream and, on the listening side, one
/// listener socket. All operations block the calling thread; transient
/// errors are retried internally.
#[derive(Debug, Default)]
pub struct Connection {
    config: ConnectionConfig,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            listener: None,
            stream: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// (Re)opens a listening socket on the configured address and port.
    /// Does not wait for a connection; use [`accept`](Self::accept) or
    /// [`is_data_available`](Self::is_data_available) for that.
    pub fn open_listener(&mut self) -> Result<(), IoError> {
        self.close();
        let listener = TcpListener::bind(self.config.listen_addr())?;
        listener.set_nonblocking(true)?;
        tracing::debug!(addr = %listener.local_addr()?, "listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Waits for an incoming connection and accepts it. Returns
    /// immediately when a connection is already established or no
    /// listener is open.
    pub fn accept(&mut self) -> Result<(), IoError> {
        while self.stream.is_none() && self.listener.is_some() {
            if !self.try_accept()? {
                thread::sleep(RETRY_BACKOFF);
            }
        }
        Ok(())
    }

    fn try_accept(&mut self) -> Result<bool, IoError> {
        let listener = match &self.listener {
            Some(listener) => listener,
            None => return Ok(false),
        };
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "accepted connection");
                stream.set_nodelay(true).ok();
                stream.set_nonblocking(true)?;
                self.stream = Some(stream);
                Ok(true)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(false)
            }
            Err(e) => Err(IoError::Io(e)),
        }
    }

    /// Attempts an outgoing connection to the configured address and
    /// port. Connection refused, timeout and interruption are
    /// recoverable and yield `Ok(false)`; the caller decides when to
    /// retry.
    pub fn connect(&mut self) -> Result<bool, IoError> {
        self.close();
        let addr = self.config.connect_addr();
        match TcpStream::connect_timeout(&addr, self.config.delay) {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                stream.set_nonblocking(true)?;
                tracing::debug!(%addr, "connected");
                self.stream = Some(stream);
                Ok(true)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionRefused | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                Ok(false)
            }
            Err(e) => Err(IoError::Io(e)),
        }
    }

    /// Closes the established connection and the listener, if any.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("connection closed");
        }
        self.listener = None;
    }

    /// Returns true when no connection is established.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// The local address of the established stream, or of the listener
    /// when only that is open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if let Some(stream) = &self.stream {
            return stream.local_addr().ok();
        }
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Waits up to the configured delay for data to become readable.
    ///
    /// While waiting, an incoming connection attempt on the listening
    /// side is accepted and the wait continues on the new stream.
    /// Returns false when the timeout expires first. Peer shutdown
    /// counts as readable: the following
    /// [`read_message`](Self::read_message) reports it as an empty view.
    pub fn is_data_available(&mut self) -> Result<bool, IoError> {
        if self.stream.is_none() && self.listener.is_none() {
            return Ok(false);
        }

        let deadline = Instant::now() + self.config.delay;
        loop {
            if self.stream.is_none() {
                self.try_accept()?;
            }

            if let Some(stream) = self.stream.as_ref() {
                let mut probe = [0u8; 1];
                match stream.peek(&mut probe) {
                    Ok(_) => return Ok(true),
                    Err(e)
                        if matches!(
                            e.kind(),
                            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                        ) => {}
                    Err(e)
                        if matches!(
                            e.kind(),
                            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                        ) =>
                    {
                        return Ok(true)
                    }
                    Err(e) => return Err(IoError::Io(e)),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Sleeps for the configured delay.
    pub fn sleep(&self) {
        thread::sleep(self.config.delay);
    }

    /// Reads exactly one whole message into `buffer`.
    ///
    /// Blocks until the message declared by the preamble length field has
    /// been received, returning the sub-view holding it. An empty view
    /// means the peer closed the connection, or that a message with a
    /// foreign protocol version was received and silently discarded (the
    /// connection stays open in that case, for multi-version coexistence
    /// on one stream).
    pub fn read_message<'b>(
        &mut self,
        buffer: &BufferWritableView<'b>,
    ) -> Result<BufferView<'b>, IoError> {
        if self.stream.is_none() {
            return Err(IoError::NotConnected);
        }
        if buffer.len() < PREAMBLE_LEN {
            return Err(IoError::ReadBufferTooSmall {
                capacity: buffer.len(),
                message_length: PREAMBLE_LEN,
            });
        }

        if let ReadOutcome::Eof = self.read_exact(buffer, 0, PREAMBLE_LEN)? {
            return Ok(BufferView::empty());
        }

        let version = buffer.u8_at(VERSION_OFFSET);
        let message_length = buffer.u32_at(LENGTH_OFFSET) as usize;

        if message_length < PREAMBLE_LEN {
            self.close();
            return Err(IoError::InvalidMessageLength(message_length));
        }
        if buffer.len() < message_length {
            // Either junk on the wire or an undersized read buffer;
            // the stream cannot be resynchronized, so shut it down.
            self.close();
            return Err(IoError::ReadBufferTooSmall {
                capacity: buffer.len(),
                message_length,
            });
        }

        if let ReadOutcome::Eof = self.read_exact(buffer, PREAMBLE_LEN, message_length)? {
            return Ok(BufferView::empty());
        }

        if version != PROTOCOL_VERSION {
            tracing::debug!(version, "discarding message with foreign protocol version");
            return Ok(BufferView::empty());
        }

        tracing::trace!(message_length, "message received");
        Ok(buffer
            .sub(0, message_length)
            .map_err(ProtocolError::from)?
            .as_view())
    }

    /// Reads `[offset, end)` of `buffer` from the stream, retrying
    /// transient conditions with a fixed backoff.
    fn read_exact(
        &mut self,
        buffer: &BufferWritableView<'_>,
        mut offset: usize,
        end: usize,
    ) -> Result<ReadOutcome, IoError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while offset < end {
            let want = (end - offset).min(chunk.len());
            let stream = self.stream.as_mut().ok_or(IoError::NotConnected)?;
            match stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    self.close();
                    return Ok(ReadOutcome::Eof);
                }
                Ok(n) => {
                    buffer.put_slice_at(offset, &chunk[..n]);
                    offset += n;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    thread::sleep(RETRY_BACKOFF);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    self.close();
                    return Ok(ReadOutcome::Eof);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "fatal read error");
                    self.close();
                    return Err(IoError::Io(e));
                }
            }
        }
        Ok(ReadOutcome::Complete)
    }

    /// Writes one whole encoded message to the stream.
    ///
    /// The byte count comes from the message's own embedded length field,
    /// not from the view size. Blocks until everything is written;
    /// returns the number of bytes sent (0 when the peer vanished
    /// mid-write, which closes the connection).
    pub fn write_message(&mut self, message: &BufferView<'_>) -> Result<usize, IoError> {
        if self.stream.is_none() {
            return Err(IoError::NotConnected);
        }

        let message_length = message
            .get_u32_at(LENGTH_OFFSET)
            .map_err(ProtocolError::from)? as usize;
        let bytes = message
            .sub(0, message_length)
            .map_err(ProtocolError::from)?
            .to_vec();

        let mut written = 0;
        while written < bytes.len() {
            let stream = self.stream.as_mut().ok_or(IoError::NotConnected)?;
            match stream.write(&bytes[written..]) {
                Ok(0) => {
                    self.close();
                    return Ok(0);
                }
                Ok(n) => written += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    thread::sleep(RETRY_BACKOFF);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "fatal write error");
                    self.close();
                    return Err(IoError::Io(e));
                }
            }
        }

        tracing::trace!(written, "message sent");
        Ok(written)
    }
}
