//! Connection handling and transfer sessions
//!
//! The connection handle owns the transport resources; the session module
//! runs the four-phase single-image protocol in its four role pairings,
//! and the stream module keeps a connection open across many images.

pub mod connection;
pub mod framing;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use connection::{Connection, Role};
pub use session::{receive_image, request_image, send_image, serve_image, ReceivedImage};
pub use stream::{ImageEventsSender, ImageSequenceSender, ImageStreamReceiver};
