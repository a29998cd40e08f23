//! Multi-image sessions over one open connection
//!
//! A stream wraps each image in the single-image protocol and separates
//! images with v0 sentinel frames, so the receiving side can hand every
//! image to its consumer immediately and still know whether to wait for
//! more. Two sender flavours exist: the events sender announces after each
//! image whether another may follow, the fixed-sequence sender announces
//! each image up front and hangs up after the one marked last.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::connection::{Connection, Role};
use crate::io::session::{receive_with_header, send_over, ReceivedImage};
use crate::protocol::descriptor::ImageDescriptor;
use crate::protocol::header::{
    StreamSentinel, EXPECT_SENTINEL, HANGUP_SENTINEL, KEEP_OPEN_SENTINEL,
};
use crate::protocol::metadata::Metadata;

/// Streams images as they happen, for example one per processed event.
///
/// The connection opens lazily on the first image and announces the stream
/// with one `v0 expect` sentinel; every image is followed by a sentinel
/// telling the receiver whether to keep waiting. Marking an image as last,
/// or calling [`hang_up`](ImageEventsSender::hang_up), ends the stream.
pub struct ImageEventsSender {
    addr: String,
    timeout: u64,
    conn: Option<Connection>,
}

impl ImageEventsSender {
    /// Prepare a sender for the peer listening on `addr`; nothing connects
    /// until the first image is sent.
    pub fn new(addr: impl Into<String>, timeout: u64) -> Self {
        ImageEventsSender {
            addr: addr.into(),
            timeout,
            conn: None,
        }
    }

    /// Send one image, closing the stream when `last` is set.
    pub fn send_image(
        &mut self,
        desc: &ImageDescriptor,
        data: &mut [u8],
        meta: &Metadata,
        last: bool,
    ) -> Result<()> {
        self.ensure_connected()?;
        let outcome = self.transfer(desc, data, meta, last);
        if outcome.is_err() || last {
            self.disconnect();
        }
        outcome
    }

    /// End the stream without sending a further image.
    ///
    /// Useful when the end of the stream is only discovered after the last
    /// image was already sent as a non-final one. Does nothing if the
    /// stream never opened or is closed already.
    pub fn hang_up(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            info!("hanging up the image stream");
            conn.send_text(HANGUP_SENTINEL, false)?;
            conn.close();
        }
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.conn.is_none() {
            let conn = Connection::connect(&self.addr, Role::Sender, self.timeout)?;
            conn.send_text(EXPECT_SENTINEL, false)?;
            debug!("image stream opened towards {}", self.addr);
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn open_conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Protocol("image stream is not open".to_string()))
    }

    fn transfer(
        &self,
        desc: &ImageDescriptor,
        data: &mut [u8],
        meta: &Metadata,
        last: bool,
    ) -> Result<()> {
        let conn = self.open_conn()?;
        send_over(conn, desc, data, meta)?;
        conn.send_text(
            if last {
                HANGUP_SENTINEL
            } else {
                KEEP_OPEN_SENTINEL
            },
            false,
        )
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

/// Streams a sequence whose length is known while it is produced.
///
/// No preamble on connect; every image is announced with its own
/// `v0 expect` sentinel, and the image marked last is followed by the
/// hangup sentinel.
pub struct ImageSequenceSender {
    addr: String,
    timeout: u64,
    conn: Option<Connection>,
}

impl ImageSequenceSender {
    /// Prepare a sender for the peer listening on `addr`; nothing connects
    /// until the first image is sent.
    pub fn new(addr: impl Into<String>, timeout: u64) -> Self {
        ImageSequenceSender {
            addr: addr.into(),
            timeout,
            conn: None,
        }
    }

    /// Send one image, closing the stream when `last` is set.
    pub fn send_image(
        &mut self,
        desc: &ImageDescriptor,
        data: &mut [u8],
        meta: &Metadata,
        last: bool,
    ) -> Result<()> {
        if self.conn.is_none() {
            let conn = Connection::connect(&self.addr, Role::Sender, self.timeout)?;
            debug!("image sequence opened towards {}", self.addr);
            self.conn = Some(conn);
        }

        let outcome = self.transfer(desc, data, meta, last);
        if outcome.is_err() || last {
            self.disconnect();
        }
        outcome
    }

    fn transfer(
        &self,
        desc: &ImageDescriptor,
        data: &mut [u8],
        meta: &Metadata,
        last: bool,
    ) -> Result<()> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| Error::Protocol("image stream is not open".to_string()))?;
        conn.send_text(EXPECT_SENTINEL, false)?;
        send_over(conn, desc, data, meta)?;
        if last {
            conn.send_text(HANGUP_SENTINEL, false)?;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

/// Receives a stream of images over one bound port.
///
/// # Examples
///
/// ```no_run
/// use imgtransfer_rust::ImageStreamReceiver;
///
/// let mut receiver = ImageStreamReceiver::new(54545, 60);
/// while let Some(image) = receiver.receive_image()? {
///     println!("got {:?}", image.metadata.image_name());
/// }
/// # Ok::<(), imgtransfer_rust::Error>(())
/// ```
pub struct ImageStreamReceiver {
    port: u16,
    timeout: u64,
    conn: Option<Connection>,
    expected: u64,
    finished: bool,
}

impl ImageStreamReceiver {
    /// Prepare a receiver; the port is bound on the first
    /// [`receive_image`](ImageStreamReceiver::receive_image) call.
    pub fn new(port: u16, timeout: u64) -> Self {
        ImageStreamReceiver {
            port,
            timeout,
            conn: None,
            expected: 0,
            finished: false,
        }
    }

    /// Whether the sender has promised another image
    pub fn has_next(&self) -> bool {
        !self.finished
    }

    /// The image-count hint from the sender's `v0 expect` sentinel.
    ///
    /// Zero until the stream opened; an unbounded stream announces a large
    /// placeholder count.
    pub fn expected_images(&self) -> u64 {
        self.expected
    }

    /// Receive the next image of the stream.
    ///
    /// Returns `Ok(None)` once the stream has ended. Leading sentinel
    /// frames are absorbed: a hangup ends the stream, any other `v0` frame
    /// is a promise that an image follows. After each image, the trailing
    /// sentinel decides whether the stream stays open; silence until the
    /// timeout counts as a hangup.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] when the peer breaks the protocol; any error
    /// tears the stream down.
    pub fn receive_image(&mut self) -> Result<Option<ReceivedImage>> {
        if self.finished {
            return Ok(None);
        }

        if self.conn.is_none() {
            self.conn = Some(Connection::bind(self.port, Role::Receiver, self.timeout)?);
        }

        match self.receive_one() {
            Ok(image) => Ok(image),
            Err(err) => {
                self.finished = true;
                self.teardown();
                Err(err)
            }
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Protocol("image stream is not open".to_string()))
    }

    fn receive_one(&mut self) -> Result<Option<ReceivedImage>> {
        // absorb sentinel frames until an image header arrives
        let header = loop {
            let frame = {
                let conn = self.conn()?;
                conn.wait_for_frame("image header")?;
                conn.recv_text()?
            };
            if !frame.starts_with("v0") {
                break frame;
            }
            debug!("received stream sentinel: {}", frame);
            match StreamSentinel::parse(&frame)? {
                StreamSentinel::Expect(count) => self.expected = count,
                StreamSentinel::MoreToCome => {}
                StreamSentinel::Hangup => {
                    info!("image stream ended");
                    self.finished = true;
                    self.teardown();
                    return Ok(None);
                }
            }
        };

        let image = receive_with_header(self.conn()?, &header)?;

        // the sentinel after the image decides whether to keep listening;
        // silence counts as a hangup
        let trailing = {
            let conn = self.conn()?;
            match conn.wait_for_frame("stream sentinel") {
                Ok(()) => Some(conn.recv_text()?),
                Err(Error::Timeout { .. }) => None,
                Err(err) => return Err(err),
            }
        };

        let end_of_stream = match trailing {
            Some(sentinel) => {
                debug!("received stream sentinel: {}", sentinel);
                StreamSentinel::parse(&sentinel)? == StreamSentinel::Hangup
            }
            None => true,
        };

        if end_of_stream {
            info!("image stream ended");
            self.finished = true;
            self.teardown();
        }

        Ok(Some(image))
    }

    fn teardown(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_starts_open_with_no_hint() {
        let receiver = ImageStreamReceiver::new(54692, 1);
        assert!(receiver.has_next());
        assert_eq!(receiver.expected_images(), 0);
    }

    #[test]
    fn test_hang_up_before_connect_is_a_noop() {
        let mut sender = ImageEventsSender::new("localhost:54693", 1);
        sender.hang_up().unwrap();
    }
}
