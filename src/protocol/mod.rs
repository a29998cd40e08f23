//! Wire-format logic of the image transfer protocol
//!
//! Everything in this module is free of sockets: descriptors, the text
//! frames, the metadata list, the byte-order primitives and the plane
//! walker. The `io` module drives these over a PAIR connection.

pub mod descriptor;
pub mod endian;
pub mod header;
pub mod metadata;
pub mod walker;

// Re-export commonly used types
pub use descriptor::{Backend, ImageDescriptor, VoxelType};
pub use header::{encode_header, parse_header, StreamSentinel};
pub use metadata::Metadata;
pub use walker::DimWalker;
