//! Single-image transfer sessions
//!
//! One session moves exactly one image through four phases: header
//! handshake, metadata, pixel payload, completion acknowledgement. The same
//! state machine runs in two pairings: push (the sender connects, the
//! receiver binds) and pull (the receiver connects and wakes the bound
//! sender with a `can get` request).

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::connection::{Connection, Role};
use crate::io::framing::{recv_payload, send_payload};
use crate::protocol::descriptor::ImageDescriptor;
use crate::protocol::header::{self, encode_header, parse_header};
use crate::protocol::metadata::Metadata;

/// One fully received image
#[derive(Debug)]
pub struct ReceivedImage {
    /// Geometry, voxel type and layout announced by the sender
    pub descriptor: ImageDescriptor,
    /// The metadata list, `imagename` first
    pub metadata: Metadata,
    /// The pixel buffer, exactly `descriptor.byte_count()` bytes, native order
    pub data: Vec<u8>,
}

/// Run the sending half of a session over an open connection.
///
/// The buffer is flipped to network order block by block during
/// transmission and restored before this function returns.
pub(crate) fn send_over(
    conn: &Connection,
    desc: &ImageDescriptor,
    data: &mut [u8],
    meta: &Metadata,
) -> Result<()> {
    let expected = desc.byte_count()?;
    if data.len() != expected {
        return Err(Error::Config(format!(
            "pixel buffer holds {} bytes but the descriptor announces {expected}",
            data.len()
        )));
    }

    let header_frame = encode_header(desc);
    info!("sending header: {}", header_frame);
    conn.send_text(&header_frame, false)?;

    conn.wait_for_frame("ready confirmation")?;
    let reply = conn.recv_text()?;
    if !reply.starts_with(header::READY) {
        return Err(Error::Protocol(format!(
            "expected the ready confirmation, got {reply:?}"
        )));
    }

    debug!("sending metadata and payload");
    conn.send_text(&meta.encode(), true)?;
    send_payload(conn, desc, data)?;

    conn.wait_for_frame("transfer confirmation")?;
    let confirmation = conn.recv_text()?;
    if !confirmation.starts_with(header::DONE) {
        return Err(Error::Protocol(format!(
            "expected the final confirmation, got {confirmation:?}"
        )));
    }

    info!("image sent");
    Ok(())
}

/// Run the receiving half of a session over an open connection.
pub(crate) fn receive_over(conn: &Connection) -> Result<ReceivedImage> {
    conn.wait_for_frame("image header")?;
    let header_frame = conn.recv_text()?;
    receive_with_header(conn, &header_frame)
}

/// Run the receiving half of a session when the header frame was already
/// read off the socket (multi-image streams peel it to tell headers from
/// stream sentinels).
pub(crate) fn receive_with_header(conn: &Connection, header_frame: &str) -> Result<ReceivedImage> {
    info!("received header: {}", header_frame);

    let descriptor = parse_header(header_frame)?;
    // resolves the voxel type; an unknown token fails the session here
    let byte_count = descriptor.byte_count()?;

    conn.send_text(header::READY, false)?;

    conn.wait_for_frame("metadata")?;
    let metadata = Metadata::decode(&conn.recv_text_unbounded()?)?;
    debug!("received metadata for {:?}", metadata.image_name());

    let mut data = vec![0u8; byte_count];
    recv_payload(conn, &descriptor, &mut data)?;

    conn.send_text(header::DONE, false)?;
    info!("image received");

    Ok(ReceivedImage {
        descriptor,
        metadata,
        data,
    })
}

/// Send one image to a receiver that is listening on `addr`.
///
/// The push pairing: this side connects, the peer binds.
///
/// # Errors
///
/// [`Error::Timeout`] if the peer never confirms, [`Error::Protocol`] on
/// any handshake mismatch, [`Error::Config`] if `data` does not match the
/// descriptor.
///
/// # Examples
///
/// ```no_run
/// use imgtransfer_rust::{send_image, Backend, ImageDescriptor, Metadata, VoxelType};
///
/// let desc = ImageDescriptor::new(vec![4, 3, 2], VoxelType::UnsignedShort, Backend::Array)?;
/// let mut pixels = vec![0u8; desc.byte_count()?];
/// send_image(&desc, &mut pixels, &Metadata::new("test"), "localhost:54545", 60)?;
/// # Ok::<(), imgtransfer_rust::Error>(())
/// ```
pub fn send_image(
    desc: &ImageDescriptor,
    data: &mut [u8],
    meta: &Metadata,
    addr: &str,
    timeout: u64,
) -> Result<()> {
    let conn = Connection::connect(addr, Role::Sender, timeout)?;
    send_over(&conn, desc, data, meta)?;
    conn.close();
    Ok(())
}

/// Receive one image from a sender that will connect to `port`.
///
/// The push pairing: this side binds, the peer connects.
///
/// # Examples
///
/// ```no_run
/// use imgtransfer_rust::receive_image;
///
/// let image = receive_image(54545, 60)?;
/// println!("{:?} voxels", image.descriptor.voxel_count());
/// # Ok::<(), imgtransfer_rust::Error>(())
/// ```
pub fn receive_image(port: u16, timeout: u64) -> Result<ReceivedImage> {
    let conn = Connection::bind(port, Role::Receiver, timeout)?;
    let image = receive_over(&conn)?;
    conn.close();
    Ok(image)
}

/// Serve one image to a receiver that will request it.
///
/// The pull pairing, server side: this side binds and waits for the
/// literal `can get` request before it starts sending.
///
/// # Errors
///
/// [`Error::Timeout`] if no request arrives within the timeout,
/// [`Error::Protocol`] if the first frame is not the request.
pub fn serve_image(
    desc: &ImageDescriptor,
    data: &mut [u8],
    meta: &Metadata,
    port: u16,
    timeout: u64,
) -> Result<()> {
    let conn = Connection::bind(port, Role::Sender, timeout)?;

    conn.wait_for_frame("connection request")?;
    let request = conn.recv_text()?;
    if !request.starts_with(header::CAN_GET) {
        return Err(Error::Protocol(format!(
            "expected the connection request, got {request:?}"
        )));
    }
    debug!("connection requested, serving image");

    send_over(&conn, desc, data, meta)?;
    conn.close();
    Ok(())
}

/// Request one image from a sender that is serving on `addr`.
///
/// The pull pairing, client side: this side connects and wakes the server
/// with the literal `can get`.
pub fn request_image(addr: &str, timeout: u64) -> Result<ReceivedImage> {
    let conn = Connection::connect(addr, Role::Receiver, timeout)?;
    conn.send_text(header::CAN_GET, false)?;
    debug!("connection request sent");

    let image = receive_over(&conn)?;
    conn.close();
    Ok(image)
}
