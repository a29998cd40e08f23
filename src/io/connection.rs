//! The PAIR connection handle
//!
//! A [`Connection`] owns one messaging context and one PAIR socket for the
//! whole lifetime of a session, single-image or multi-image. All frame
//! operations block the calling thread; the handle is not thread-safe and
//! independent sessions need independent handles.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// Size of the receive buffer for handshake text frames.
///
/// A text frame that does not fit is treated as truncated and rejected.
pub(crate) const TEXT_BUF_LEN: usize = 1024;

/// Direction of a connection, from the pixel buffer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This side reads the buffer and emits payload frames
    Sender,
    /// This side consumes payload frames into the buffer
    Receiver,
}

/// Which end of the link this handle occupies
#[derive(Debug, Clone)]
enum Endpoint {
    /// Connected out to a remote address
    Remote(String),
    /// Bound to a local port
    Local(u16),
}

/// One end of an exclusive pair link
///
/// Teardown closes the socket before the context and is idempotent; it runs
/// automatically on drop and can be forced with [`close`](Connection::close).
pub struct Connection {
    socket: Option<zmq::Socket>,
    _context: zmq::Context,
    endpoint: Endpoint,
    role: Role,
    timeout: u64,
}

impl Connection {
    /// Timeout in seconds applied to every wait when none is given
    pub const DEFAULT_TIMEOUT: u64 = 60;

    /// Connect out to a peer.
    ///
    /// `addr` is `host:port` or a full endpoint such as `tcp://host:port`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the socket cannot be created or connected.
    pub fn connect(addr: &str, role: Role, timeout: u64) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR)?;
        let addr = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("tcp://{addr}")
        };

        info!("connecting pair socket to {} as {:?}", addr, role);
        socket.connect(&addr)?;

        Ok(Connection {
            socket: Some(socket),
            _context: context,
            endpoint: Endpoint::Remote(addr),
            role,
            timeout,
        })
    }

    /// Bind to a local port and wait for exactly one peer.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the socket cannot be created or bound.
    pub fn bind(port: u16, role: Role, timeout: u64) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR)?;
        let addr = format!("tcp://*:{port}");

        info!("binding pair socket on {} as {:?}", addr, role);
        socket.bind(&addr)?;

        Ok(Connection {
            socket: Some(socket),
            _context: context,
            endpoint: Endpoint::Local(port),
            role,
            timeout,
        })
    }

    /// The direction this handle was opened with
    pub fn role(&self) -> Role {
        self.role
    }

    /// The per-wait timeout in whole seconds
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// The remote endpoint, when this is the connecting end
    pub fn remote_addr(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Remote(addr) => Some(addr),
            Endpoint::Local(_) => None,
        }
    }

    /// The bound local port, when this is the listening end
    pub fn local_port(&self) -> Option<u16> {
        match self.endpoint {
            Endpoint::Local(port) => Some(port),
            Endpoint::Remote(_) => None,
        }
    }

    fn socket(&self) -> Result<&zmq::Socket> {
        self.socket
            .as_ref()
            .ok_or_else(|| Error::Protocol("connection is already closed".to_string()))
    }

    /// Send one text frame, optionally flagging that more frames of the
    /// same logical message follow.
    pub fn send_text(&self, text: &str, more: bool) -> Result<()> {
        trace!("sending text frame {:?} (more: {})", text, more);
        self.socket()?
            .send(text.as_bytes(), if more { zmq::SNDMORE } else { 0 })?;
        Ok(())
    }

    /// Send one binary frame, optionally flagging that more frames of the
    /// same logical message follow.
    pub fn send_bytes(&self, data: &[u8], more: bool) -> Result<()> {
        trace!("sending {} payload bytes (more: {})", data.len(), more);
        self.socket()?
            .send(data, if more { zmq::SNDMORE } else { 0 })?;
        Ok(())
    }

    /// Receive one handshake text frame.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the frame does not fit the 1024-byte receive
    /// buffer (it is then treated as truncated), [`Error::Utf8`] if it is
    /// not valid UTF-8.
    pub fn recv_text(&self) -> Result<String> {
        let mut buf = [0u8; TEXT_BUF_LEN];
        let len = self.socket()?.recv_into(&mut buf, 0)?;
        if len >= TEXT_BUF_LEN {
            return Err(Error::Protocol(format!(
                "text frame of {len} bytes exceeds the {TEXT_BUF_LEN}-byte receive buffer"
            )));
        }
        let text = String::from_utf8(buf[..len].to_vec())?;
        trace!("received text frame {:?}", text);
        Ok(text)
    }

    /// Receive one text frame of unbounded length (metadata can be long).
    pub fn recv_text_unbounded(&self) -> Result<String> {
        let raw = self.socket()?.recv_bytes(0)?;
        let text = String::from_utf8(raw)?;
        trace!("received {}-byte text frame", text.len());
        Ok(text)
    }

    /// Receive one binary frame into `buf`, requiring an exact fit.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the incoming frame length differs from
    /// `buf.len()`.
    pub fn recv_into(&self, buf: &mut [u8]) -> Result<()> {
        let len = self.socket()?.recv_into(buf, 0)?;
        if len != buf.len() {
            return Err(Error::Protocol(format!(
                "payload frame of {len} bytes where {} bytes were expected",
                buf.len()
            )));
        }
        trace!("received {} payload bytes", len);
        Ok(())
    }

    /// Wait until a new frame is ready to be read.
    ///
    /// Polls the socket readiness event once per second, up to the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when the interval expires with nothing to read.
    pub fn wait_for_frame(&self, what: &'static str) -> Result<()> {
        let socket = self.socket()?;
        let mut waited = 0;
        while waited < self.timeout && !socket.get_events()?.contains(zmq::POLLIN) {
            thread::sleep(Duration::from_secs(1));
            waited += 1;
            if waited % 10 == 0 {
                debug!("still waiting for {} after {} s", what, waited);
            }
        }
        if socket.get_events()?.contains(zmq::POLLIN) {
            Ok(())
        } else {
            Err(Error::Timeout {
                seconds: self.timeout,
                what,
            })
        }
    }

    /// Wait until the next frame of the current multi-part message is ready.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when the interval expires and the peer has not
    /// flagged a further frame.
    pub fn wait_for_more(&self, what: &'static str) -> Result<()> {
        let socket = self.socket()?;
        let mut waited = 0;
        while waited < self.timeout && !socket.get_rcvmore()? {
            thread::sleep(Duration::from_secs(1));
            waited += 1;
        }
        if socket.get_rcvmore()? {
            Ok(())
        } else {
            Err(Error::Timeout {
                seconds: self.timeout,
                what,
            })
        }
    }

    /// Release the socket and the context now instead of at drop time.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Endpoint::Remote(addr) = &self.endpoint {
                let _ = socket.disconnect(addr);
            }
            // bound sockets are left as they are; the transport objects to
            // an explicit unbind and closing the socket is enough
            debug!("pair socket released ({:?})", self.role);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown();
    }
}
