//! Image geometry, voxel type and storage layout
//!
//! An [`ImageDescriptor`] carries everything the receiving side needs to
//! allocate a pixel buffer before any payload arrives: dimensionality, axis
//! sizes, the voxel-type token and the storage-backend token. The tokens are
//! kept verbatim as they appeared on the wire; they only resolve to the
//! [`VoxelType`] and [`Backend`] enums when queried, so an unknown token
//! survives header parsing and fails at the point of use.

use crate::error::{Error, Result};

/// The ten supported voxel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelType {
    /// Signed 8-bit integer
    Byte,
    /// Unsigned 8-bit integer
    UnsignedByte,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UnsignedShort,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    UnsignedInt,
    /// Signed 64-bit integer
    Long,
    /// Unsigned 64-bit integer
    UnsignedLong,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
}

/// Recognition table for voxel-type tokens.
///
/// Order matters: every `Unsigned*` name must be tested before its signed
/// counterpart because the latter is a substring of the former.
const VOXEL_TOKENS: &[(&str, VoxelType)] = &[
    ("UnsignedByte", VoxelType::UnsignedByte),
    ("Byte", VoxelType::Byte),
    ("UnsignedShort", VoxelType::UnsignedShort),
    ("Short", VoxelType::Short),
    ("UnsignedInt", VoxelType::UnsignedInt),
    ("Int", VoxelType::Int),
    ("UnsignedLong", VoxelType::UnsignedLong),
    ("Long", VoxelType::Long),
    ("Float", VoxelType::Float),
    ("Double", VoxelType::Double),
];

impl VoxelType {
    /// The canonical wire token, e.g. `UnsignedShortType`
    pub fn token(self) -> &'static str {
        match self {
            VoxelType::Byte => "ByteType",
            VoxelType::UnsignedByte => "UnsignedByteType",
            VoxelType::Short => "ShortType",
            VoxelType::UnsignedShort => "UnsignedShortType",
            VoxelType::Int => "IntType",
            VoxelType::UnsignedInt => "UnsignedIntType",
            VoxelType::Long => "LongType",
            VoxelType::UnsignedLong => "UnsignedLongType",
            VoxelType::Float => "FloatType",
            VoxelType::Double => "DoubleType",
        }
    }

    /// Recognize a wire token by substring match.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the token matches none of the supported types.
    pub fn from_token(token: &str) -> Result<Self> {
        for (needle, voxel_type) in VOXEL_TOKENS {
            if token.contains(needle) {
                return Ok(*voxel_type);
            }
        }
        Err(Error::Protocol(format!(
            "unrecognized voxel type token {token:?}"
        )))
    }

    /// Bytes occupied by one voxel of this type
    pub fn bytes_per_voxel(self) -> usize {
        match self {
            VoxelType::Byte | VoxelType::UnsignedByte => 1,
            VoxelType::Short | VoxelType::UnsignedShort => 2,
            VoxelType::Int | VoxelType::UnsignedInt | VoxelType::Float => 4,
            VoxelType::Long | VoxelType::UnsignedLong | VoxelType::Double => 8,
        }
    }
}

/// Storage layout of the pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One contiguous block in lexicographic axis order, sent in one shot
    Array,
    /// A stack of 2-D planes, each transmitted as an independent chunk
    Planar,
}

impl Backend {
    /// The canonical wire token, `ArrayImg` or `PlanarImg`
    pub fn token(self) -> &'static str {
        match self {
            Backend::Array => "ArrayImg",
            Backend::Planar => "PlanarImg",
        }
    }

    /// Recognize a wire token by substring match.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the token names neither layout.
    pub fn from_token(token: &str) -> Result<Self> {
        if token.contains("Array") {
            Ok(Backend::Array)
        } else if token.contains("Planar") {
            Ok(Backend::Planar)
        } else {
            Err(Error::Protocol(format!(
                "unrecognized image backend token {token:?}"
            )))
        }
    }
}

/// Geometry and storage description of one n-dimensional image
///
/// Axis 0 is the fastest-varying one in the linearized pixel buffer.
/// Dimensionality is at least 1 and conventionally at most 16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    sizes: Vec<usize>,
    voxel_token: String,
    backend_token: String,
}

impl ImageDescriptor {
    /// Describe an image from typed voxel and backend values.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `sizes` is empty or any axis size is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgtransfer_rust::protocol::descriptor::{Backend, ImageDescriptor, VoxelType};
    ///
    /// let desc = ImageDescriptor::new(vec![4, 3, 2], VoxelType::UnsignedShort, Backend::Array)?;
    /// assert_eq!(desc.voxel_count(), 24);
    /// assert_eq!(desc.byte_count()?, 48);
    /// # Ok::<(), imgtransfer_rust::Error>(())
    /// ```
    pub fn new(sizes: Vec<usize>, voxel_type: VoxelType, backend: Backend) -> Result<Self> {
        Self::validate_sizes(&sizes)?;
        Ok(ImageDescriptor {
            sizes,
            voxel_token: voxel_type.token().to_string(),
            backend_token: backend.token().to_string(),
        })
    }

    /// Build a descriptor from raw wire tokens (the receive path).
    ///
    /// The voxel token must contain `Type` and the backend token must
    /// contain `Img`; beyond that the tokens are stored verbatim and only
    /// resolved when queried.
    pub(crate) fn from_tokens(
        sizes: Vec<usize>,
        voxel_token: String,
        backend_token: String,
    ) -> Result<Self> {
        Self::validate_sizes(&sizes)?;
        if !voxel_token.contains("Type") {
            return Err(Error::Protocol(format!(
                "expected a voxel type hint, got {voxel_token:?}"
            )));
        }
        if !backend_token.contains("Img") {
            return Err(Error::Protocol(format!(
                "expected an image storage hint, got {backend_token:?}"
            )));
        }
        Ok(ImageDescriptor {
            sizes,
            voxel_token,
            backend_token,
        })
    }

    fn validate_sizes(sizes: &[usize]) -> Result<()> {
        if sizes.is_empty() {
            return Err(Error::Config(
                "image must have at least one dimension".to_string(),
            ));
        }
        if sizes.iter().any(|&s| s == 0) {
            return Err(Error::Config(format!(
                "every axis size must be positive, got {sizes:?}"
            )));
        }
        Ok(())
    }

    /// Number of dimensions
    pub fn dim(&self) -> usize {
        self.sizes.len()
    }

    /// Axis sizes, axis 0 first
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// The voxel-type token as it appears on the wire
    pub fn voxel_type_token(&self) -> &str {
        &self.voxel_token
    }

    /// The backend token as it appears on the wire
    pub fn backend_token(&self) -> &str {
        &self.backend_token
    }

    /// Resolve the voxel-type token.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the token is not one of the ten supported types.
    pub fn voxel_type(&self) -> Result<VoxelType> {
        VoxelType::from_token(&self.voxel_token)
    }

    /// Resolve the backend token.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the token names neither `Array` nor `Planar`.
    pub fn backend(&self) -> Result<Backend> {
        Backend::from_token(&self.backend_token)
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> usize {
        self.sizes.iter().product()
    }

    /// Bytes occupied by one voxel
    pub fn bytes_per_voxel(&self) -> Result<usize> {
        Ok(self.voxel_type()?.bytes_per_voxel())
    }

    /// Total number of bytes of the pixel buffer
    pub fn byte_count(&self) -> Result<usize> {
        Ok(self.voxel_count() * self.bytes_per_voxel()?)
    }

    /// Voxels in one 2-D plane (the whole image for 1-D)
    pub fn plane_len(&self) -> usize {
        if self.dim() >= 2 {
            self.sizes[0] * self.sizes[1]
        } else {
            self.voxel_count()
        }
    }

    /// Whether the payload travels plane by plane
    pub fn is_planar(&self) -> bool {
        self.backend_token.contains("Planar") && self.dim() >= 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_token_roundtrip() {
        for voxel_type in [
            VoxelType::Byte,
            VoxelType::UnsignedByte,
            VoxelType::Short,
            VoxelType::UnsignedShort,
            VoxelType::Int,
            VoxelType::UnsignedInt,
            VoxelType::Long,
            VoxelType::UnsignedLong,
            VoxelType::Float,
            VoxelType::Double,
        ] {
            assert_eq!(VoxelType::from_token(voxel_type.token()).unwrap(), voxel_type);
        }
    }

    #[test]
    fn test_unsigned_tokens_win_over_signed_substrings() {
        assert_eq!(
            VoxelType::from_token("UnsignedShortType").unwrap(),
            VoxelType::UnsignedShort
        );
        assert_eq!(
            VoxelType::from_token("UnsignedByteType").unwrap(),
            VoxelType::UnsignedByte
        );
        assert_eq!(
            VoxelType::from_token("UnsignedIntType").unwrap(),
            VoxelType::UnsignedInt
        );
        assert_eq!(
            VoxelType::from_token("UnsignedLongType").unwrap(),
            VoxelType::UnsignedLong
        );
    }

    #[test]
    fn test_unknown_voxel_token() {
        assert!(matches!(
            VoxelType::from_token("FooType"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_bytes_per_voxel() {
        assert_eq!(VoxelType::Byte.bytes_per_voxel(), 1);
        assert_eq!(VoxelType::UnsignedShort.bytes_per_voxel(), 2);
        assert_eq!(VoxelType::Float.bytes_per_voxel(), 4);
        assert_eq!(VoxelType::UnsignedLong.bytes_per_voxel(), 8);
        assert_eq!(VoxelType::Double.bytes_per_voxel(), 8);
    }

    #[test]
    fn test_backend_tokens() {
        assert_eq!(Backend::from_token("ArrayImg").unwrap(), Backend::Array);
        assert_eq!(Backend::from_token("PlanarImg").unwrap(), Backend::Planar);
        assert!(Backend::from_token("CellImg").is_err());
    }

    #[test]
    fn test_derived_counts() {
        let desc =
            ImageDescriptor::new(vec![64, 64, 2, 2], VoxelType::Float, Backend::Planar).unwrap();
        assert_eq!(desc.dim(), 4);
        assert_eq!(desc.voxel_count(), 16384);
        assert_eq!(desc.byte_count().unwrap(), 65536);
        assert_eq!(desc.plane_len(), 4096);
        assert!(desc.is_planar());
    }

    #[test]
    fn test_planar_needs_three_dimensions() {
        let desc = ImageDescriptor::new(vec![8, 8], VoxelType::Byte, Backend::Planar).unwrap();
        assert!(!desc.is_planar());
    }

    #[test]
    fn test_rejects_empty_and_zero_sizes() {
        assert!(matches!(
            ImageDescriptor::new(vec![], VoxelType::Byte, Backend::Array),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ImageDescriptor::new(vec![4, 0, 2], VoxelType::Byte, Backend::Array),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_token_fails_only_when_queried() {
        let desc = ImageDescriptor::from_tokens(
            vec![4, 4],
            "FooType".to_string(),
            "ArrayImg".to_string(),
        )
        .unwrap();
        assert!(matches!(desc.voxel_type(), Err(Error::Protocol(_))));
        assert!(matches!(desc.byte_count(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_from_tokens_requires_hint_substrings() {
        assert!(ImageDescriptor::from_tokens(
            vec![4],
            "UnsignedShort".to_string(),
            "ArrayImg".to_string()
        )
        .is_err());
        assert!(ImageDescriptor::from_tokens(
            vec![4],
            "UnsignedShortType".to_string(),
            "Array".to_string()
        )
        .is_err());
    }
}
