//! Chunked transmission of the pixel payload
//!
//! A chunk is one typed buffer (the whole image in array layout, one 2-D
//! plane in planar layout). Short chunks travel as a single frame; longer
//! multi-byte chunks are split into one frame per voxel byte so that any
//! host-side frame-length limit is respected. Multi-byte voxels are flipped
//! to network order right before emission and flipped back right after, so
//! the caller's buffer is unchanged when the call returns.

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::connection::Connection;
use crate::protocol::descriptor::ImageDescriptor;
use crate::protocol::endian;
use crate::protocol::walker::DimWalker;

/// Chunks shorter than this many voxels are never split
pub(crate) const SPLIT_THRESHOLD: usize = 1024;

/// Lengths (in voxels) of the sub-blocks of a split chunk.
///
/// A chunk of `len` voxels of `elem_size` bytes splits into `elem_size - 1`
/// blocks of `first_len` voxels followed by one block of `last_len` voxels;
/// `last_len` may be zero, in which case the final block is omitted.
pub(crate) fn split_lengths(len: usize, elem_size: usize) -> (usize, usize) {
    let first_len = len / elem_size + usize::from(len % elem_size != 0);
    let last_len = len - (elem_size - 1) * first_len;
    (first_len, last_len)
}

/// Send one chunk, splitting it into frames as needed.
///
/// `coming_more` flags that further frames of the same logical payload
/// follow after this chunk; it lands on the chunk's very last frame.
pub(crate) fn send_chunk(
    conn: &Connection,
    data: &mut [u8],
    elem_size: usize,
    coming_more: bool,
) -> Result<()> {
    debug_assert!(data.len() % elem_size == 0);
    let len = data.len() / elem_size;

    if len < SPLIT_THRESHOLD || elem_size == 1 {
        // short enough for one frame, no point in splitting
        endian::to_network_order(data, elem_size);
        let sent = conn.send_bytes(data, coming_more);
        endian::from_network_order(data, elem_size);
        return sent;
    }

    let (first_len, last_len) = split_lengths(len, elem_size);
    for block_index in 0..elem_size - 1 {
        let start = block_index * first_len * elem_size;
        let block = &mut data[start..start + first_len * elem_size];
        let more = coming_more || last_len > 0 || block_index < elem_size - 2;

        endian::to_network_order(block, elem_size);
        let sent = conn.send_bytes(block, more);
        endian::from_network_order(block, elem_size);
        sent?;
    }

    if last_len > 0 {
        let start = (elem_size - 1) * first_len * elem_size;
        let block = &mut data[start..start + last_len * elem_size];

        endian::to_network_order(block, elem_size);
        let sent = conn.send_bytes(block, coming_more);
        endian::from_network_order(block, elem_size);
        sent?;
    }

    Ok(())
}

/// Receive one chunk, frame by frame, flipping each block to native order.
pub(crate) fn recv_chunk(conn: &Connection, data: &mut [u8], elem_size: usize) -> Result<()> {
    debug_assert!(data.len() % elem_size == 0);
    let len = data.len() / elem_size;

    if len < SPLIT_THRESHOLD || elem_size == 1 {
        conn.wait_for_more("payload frame")?;
        conn.recv_into(data)?;
        endian::from_network_order(data, elem_size);
        return Ok(());
    }

    let (first_len, last_len) = split_lengths(len, elem_size);
    for block_index in 0..elem_size - 1 {
        let start = block_index * first_len * elem_size;
        let block = &mut data[start..start + first_len * elem_size];
        conn.wait_for_more("payload frame")?;
        conn.recv_into(block)?;
        endian::from_network_order(block, elem_size);
    }

    if last_len > 0 {
        let start = (elem_size - 1) * first_len * elem_size;
        let block = &mut data[start..start + last_len * elem_size];
        conn.wait_for_more("payload frame")?;
        conn.recv_into(block)?;
        endian::from_network_order(block, elem_size);
    }

    Ok(())
}

fn check_buffer(desc: &ImageDescriptor, data: &[u8]) -> Result<usize> {
    let expected = desc.byte_count()?;
    if data.len() != expected {
        return Err(Error::Config(format!(
            "pixel buffer holds {} bytes but the descriptor announces {expected}",
            data.len()
        )));
    }
    desc.bytes_per_voxel()
}

/// Send the whole pixel payload of an image.
///
/// Array layout sends the buffer as one chunk. Planar layout slices it into
/// consecutive 2-D planes and sends each plane as its own chunk, with the
/// more-flag raised on every frame except the very last one.
pub fn send_payload(conn: &Connection, desc: &ImageDescriptor, data: &mut [u8]) -> Result<()> {
    let elem_size = check_buffer(desc, data)?;

    if desc.is_planar() {
        let plane_bytes = desc.plane_len() * elem_size;
        let mut walker = DimWalker::new(&desc.sizes()[2..]);
        debug!(
            "sending planar payload: {} planes of {} bytes",
            walker.remaining_steps() + 1,
            plane_bytes
        );

        let mut offset = 0;
        loop {
            let more = walker.remaining_steps() > 0;
            send_chunk(conn, &mut data[offset..offset + plane_bytes], elem_size, more)?;
            offset += plane_bytes;
            if !walker.advance() {
                break;
            }
        }
        Ok(())
    } else {
        debug!("sending array payload: {} bytes", data.len());
        send_chunk(conn, data, elem_size, false)
    }
}

/// Receive the whole pixel payload of an image into `data`.
///
/// Mirrors [`send_payload`]; the buffer must already hold exactly
/// `desc.byte_count()` bytes.
pub fn recv_payload(conn: &Connection, desc: &ImageDescriptor, data: &mut [u8]) -> Result<()> {
    let elem_size = check_buffer(desc, data)?;

    if desc.is_planar() {
        let plane_bytes = desc.plane_len() * elem_size;
        let mut walker = DimWalker::new(&desc.sizes()[2..]);
        debug!(
            "receiving planar payload: {} planes of {} bytes",
            walker.remaining_steps() + 1,
            plane_bytes
        );

        let mut offset = 0;
        loop {
            recv_chunk(conn, &mut data[offset..offset + plane_bytes], elem_size)?;
            offset += plane_bytes;
            if !walker.advance() {
                break;
            }
        }
        Ok(())
    } else {
        debug!("receiving array payload: {} bytes", data.len());
        recv_chunk(conn, data, elem_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lengths_even() {
        // 4096 voxels of 4 bytes: 3 blocks of 1024 plus one of 1024
        assert_eq!(split_lengths(4096, 4), (1024, 1024));
    }

    #[test]
    fn test_split_lengths_remainder() {
        let (first_len, last_len) = split_lengths(1025, 2);
        assert_eq!(first_len, 513);
        assert_eq!(last_len, 512);
    }

    #[test]
    fn test_split_lengths_cover_the_chunk() {
        for len in [1024usize, 1025, 2047, 4096, 65536, 99999] {
            for elem_size in [2usize, 4, 8] {
                let (first_len, last_len) = split_lengths(len, elem_size);
                assert!(first_len >= last_len);
                assert_eq!((elem_size - 1) * first_len + last_len, len);
            }
        }
    }

    #[test]
    fn test_frame_count_law() {
        for len in [1024usize, 1025, 5000, 16384] {
            for elem_size in [2usize, 4, 8] {
                let (_, last_len) = split_lengths(len, elem_size);
                let frames = if last_len > 0 { elem_size } else { elem_size - 1 };
                // byte lengths of all frames sum to the chunk size
                let (first_len, _) = split_lengths(len, elem_size);
                let total = (elem_size - 1) * first_len * elem_size + last_len * elem_size;
                assert_eq!(total, len * elem_size);
                assert!(frames >= elem_size - 1 && frames <= elem_size);
            }
        }
    }
}
