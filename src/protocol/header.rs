//! Text frames of the session protocol
//!
//! The first frame of every transfer is the v1 header, an ASCII line that
//! announces geometry, voxel type and storage layout. The short literal
//! frames (`ready`, `done`, `can get`) gate the phases of a session, and
//! the v0 sentinels wrap images in multi-image streams.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::protocol::descriptor::ImageDescriptor;

/// Version token opening every image header
pub const PROTOCOL_VERSION: &str = "v1";

/// Confirmation that the receiver is ready for metadata and payload
pub const READY: &str = "ready";

/// Confirmation that the whole image arrived
pub const DONE: &str = "done";

/// Connection request sent by a pulling receiver to wake the server
pub const CAN_GET: &str = "can get";

/// Stream sentinel announcing that images will follow
pub const EXPECT_SENTINEL: &str = "v0 expect 99999999";

/// Stream sentinel promising another image after the current one
pub const KEEP_OPEN_SENTINEL: &str = "v0 don't hangup!";

/// Stream sentinel ending a multi-image stream
pub const HANGUP_SENTINEL: &str = "v0 hangup";

/// Encode the v1 header frame for an image.
///
/// The format is `v1 dimNumber <D> <s0> … <s{D-1}> <voxelType> <backendType> `
/// with single-space separators and one trailing space.
pub fn encode_header(desc: &ImageDescriptor) -> String {
    let mut header = format!("{PROTOCOL_VERSION} dimNumber {}", desc.dim());
    for size in desc.sizes() {
        // infallible: writing to a String cannot fail
        let _ = write!(header, " {size}");
    }
    let _ = write!(
        header,
        " {} {} ",
        desc.voxel_type_token(),
        desc.backend_token()
    );
    header
}

/// Parse a v1 header frame back into a descriptor.
///
/// # Errors
///
/// [`Error::Protocol`] on any token mismatch: missing `v1` or `dimNumber`,
/// fewer sizes than announced, or voxel/backend tokens without their
/// `Type`/`Img` hint substrings.
pub fn parse_header(text: &str) -> Result<ImageDescriptor> {
    let mut tokens = text.split_whitespace();

    let version = tokens
        .next()
        .ok_or_else(|| Error::Protocol("empty image header".to_string()))?;
    if version != PROTOCOL_VERSION {
        return Err(Error::Protocol(format!(
            "unknown protocol version {version:?}, expecting {PROTOCOL_VERSION:?}"
        )));
    }

    let tag = tokens
        .next()
        .ok_or_else(|| Error::Protocol("image header ends after the version".to_string()))?;
    if tag != "dimNumber" {
        return Err(Error::Protocol(format!(
            "expected the dimNumber token, got {tag:?}"
        )));
    }

    let dim: usize = next_number(&mut tokens, "dimension count")?;
    let mut sizes = Vec::with_capacity(dim);
    for _ in 0..dim {
        sizes.push(next_number(&mut tokens, "axis size")?);
    }

    let voxel_token = tokens
        .next()
        .ok_or_else(|| Error::Protocol("image header is missing the voxel type".to_string()))?
        .to_string();
    let backend_token = tokens
        .next()
        .ok_or_else(|| Error::Protocol("image header is missing the storage backend".to_string()))?
        .to_string();

    ImageDescriptor::from_tokens(sizes, voxel_token, backend_token)
}

fn next_number<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<usize> {
    let token = tokens
        .next()
        .ok_or_else(|| Error::Protocol(format!("image header is missing a {what}")))?;
    token
        .parse()
        .map_err(|_| Error::Protocol(format!("invalid {what} {token:?} in image header")))
}

/// One parsed v0 sentinel frame of a multi-image stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSentinel {
    /// The sender announced how many images it plans to transfer
    Expect(u64),
    /// Another image follows
    MoreToCome,
    /// End of stream
    Hangup,
}

impl StreamSentinel {
    /// Parse a v0 sentinel frame.
    ///
    /// A frame not starting with `v0` is a protocol error. `v0 hangup` ends
    /// the stream and `v0 expect <n>` carries the image-count hint; any
    /// other v0 frame is a promise that another image follows.
    pub fn parse(text: &str) -> Result<Self> {
        let rest = text.strip_prefix("v0").ok_or_else(|| {
            Error::Protocol(format!("expected a v0 stream sentinel, got {text:?}"))
        })?;
        let rest = rest.trim_start();

        if rest.starts_with("hangup") {
            Ok(StreamSentinel::Hangup)
        } else if let Some(count) = rest.strip_prefix("expect") {
            let token = count
                .split_whitespace()
                .next()
                .ok_or_else(|| Error::Protocol(format!("sentinel {text:?} carries no count")))?;
            let count = token.parse().map_err(|_| {
                Error::Protocol(format!("invalid image count {token:?} in sentinel"))
            })?;
            Ok(StreamSentinel::Expect(count))
        } else {
            Ok(StreamSentinel::MoreToCome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::descriptor::{Backend, VoxelType};

    #[test]
    fn test_encode_header_literal() {
        let desc =
            ImageDescriptor::new(vec![4, 3, 2], VoxelType::UnsignedShort, Backend::Array).unwrap();
        assert_eq!(
            encode_header(&desc),
            "v1 dimNumber 3 4 3 2 UnsignedShortType ArrayImg "
        );
    }

    #[test]
    fn test_header_roundtrip() {
        let desc =
            ImageDescriptor::new(vec![64, 64, 2, 2], VoxelType::Float, Backend::Planar).unwrap();
        let parsed = parse_header(&encode_header(&desc)).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        assert!(matches!(
            parse_header("v2 dimNumber 1 4 ByteType ArrayImg "),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_dim_token() {
        assert!(matches!(
            parse_header("v1 dims 1 4 ByteType ArrayImg "),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_short_size_list() {
        assert!(matches!(
            parse_header("v1 dimNumber 3 4 3 ShortType ArrayImg"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_hints() {
        assert!(parse_header("v1 dimNumber 1 4 UnsignedShort ArrayImg ").is_err());
        assert!(parse_header("v1 dimNumber 1 4 UnsignedShortType Array ").is_err());
    }

    #[test]
    fn test_unknown_voxel_token_survives_parsing() {
        let desc = parse_header("v1 dimNumber 2 4 4 FooType ArrayImg ").unwrap();
        assert!(desc.voxel_type().is_err());
    }

    #[test]
    fn test_sentinel_parsing() {
        assert_eq!(
            StreamSentinel::parse("v0 expect 99999999").unwrap(),
            StreamSentinel::Expect(99999999)
        );
        assert_eq!(
            StreamSentinel::parse("v0 hangup").unwrap(),
            StreamSentinel::Hangup
        );
        assert_eq!(
            StreamSentinel::parse("v0 don't hangup!").unwrap(),
            StreamSentinel::MoreToCome
        );
        assert!(StreamSentinel::parse("v1 dimNumber 1 4").is_err());
    }
}
