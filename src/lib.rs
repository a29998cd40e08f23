//! Point-to-point n-dimensional image transfer over an exclusive pair link
//!
//! This library moves a single raw image, together with free-form textual
//! metadata, between exactly two peers over a ZeroMQ PAIR socket. The two
//! sides agree on a byte-exact wire format that is independent of host byte
//! order and of how either side stores its pixel buffer.
//!
//! # Protocol
//!
//! Every transfer runs through four phases: a human-readable header frame
//! announcing geometry, voxel type and storage layout; the metadata frame;
//! the framed binary pixel payload (big-endian on the wire); and a final
//! acknowledgement. Two role pairings exist: push, where the sender
//! connects to a listening receiver, and pull, where the receiver connects
//! and wakes a serving sender with a request frame.
//!
//! Images with the planar storage layout travel as a stack of 2-D planes,
//! one logical chunk per plane; large multi-byte chunks are further split
//! into several transport frames. The multi-part more-flag ties all frames
//! of one payload together.
//!
//! # Quick start
//!
//! Receiving side:
//!
//! ```no_run
//! use imgtransfer_rust::receive_image;
//!
//! let image = receive_image(54545, 60)?;
//! println!(
//!     "received {:?}, {} voxels",
//!     image.metadata.image_name(),
//!     image.descriptor.voxel_count()
//! );
//! # Ok::<(), imgtransfer_rust::Error>(())
//! ```
//!
//! Sending side:
//!
//! ```no_run
//! use imgtransfer_rust::{send_image, Backend, ImageDescriptor, Metadata, VoxelType};
//!
//! let desc = ImageDescriptor::new(vec![512, 512, 10], VoxelType::UnsignedShort, Backend::Planar)?;
//! let mut pixels = vec![0u8; desc.byte_count()?];
//! send_image(&desc, &mut pixels, &Metadata::new("nuclei stack"), "localhost:54545", 60)?;
//! # Ok::<(), imgtransfer_rust::Error>(())
//! ```
//!
//! # Multi-image streams
//!
//! A stream keeps one connection open across a sequence of images and
//! separates them with sentinel frames, so the receiver can consume every
//! image as soon as it completes:
//!
//! ```no_run
//! use imgtransfer_rust::ImageStreamReceiver;
//!
//! let mut receiver = ImageStreamReceiver::new(54545, 60);
//! while let Some(image) = receiver.receive_image()? {
//!     println!("got {:?}", image.metadata.image_name());
//! }
//! # Ok::<(), imgtransfer_rust::Error>(())
//! ```
//!
//! # Concurrency
//!
//! All operations are synchronous and block the calling thread. A handle
//! serves one session and is not thread-safe; independent transfers need
//! independent handles. Waits for the peer poll once per second and give
//! up after the configured timeout (whole seconds, 60 by default).

pub mod error;
pub mod io;
pub mod protocol;

// Re-export commonly used types
pub use error::{Error, Result};
pub use io::connection::{Connection, Role};
pub use io::session::{receive_image, request_image, send_image, serve_image, ReceivedImage};
pub use io::stream::{ImageEventsSender, ImageSequenceSender, ImageStreamReceiver};
pub use protocol::descriptor::{Backend, ImageDescriptor, VoxelType};
pub use protocol::metadata::Metadata;
