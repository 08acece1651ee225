use super::CodecError;
use std::io::{self, Read, Write};

/// Size of the fixed header: width, height and alpha flag as `i32` LE.
pub const HEADER_LEN: usize = 12;

/// Largest width or height accepted on either side of the codec.
pub const MAX_DIMENSION: i32 = 8192;

/// The fixed 12-byte prefix of every DATA stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub width: i32,
    pub height: i32,
    pub has_alpha: bool,
}

impl DataHeader {
    /// Build a header for an image, rejecting sizes a decoder would refuse.
    pub fn new(width: u32, height: u32, has_alpha: bool) -> Result<Self, CodecError> {
        let invalid = |_| CodecError::InvalidDimensions {
            width: width.into(),
            height: height.into(),
        };
        let header = Self {
            width: i32::try_from(width).map_err(invalid)?,
            height: i32::try_from(height).map_err(invalid)?,
            has_alpha,
        };
        header.validate()?;
        Ok(header)
    }

    /// Read and validate a header.
    ///
    /// Fewer than [`HEADER_LEN`] bytes is [`CodecError::TruncatedHeader`];
    /// a width or height outside `1..=8192` is [`CodecError::InvalidDimensions`].
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, CodecError> {
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::TruncatedHeader,
            _ => CodecError::Io(e),
        })?;

        let field = |i: usize| i32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let header = Self {
            width: field(0),
            height: field(4),
            has_alpha: field(8) != 0,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.width.to_le_bytes());
        buf[4..8].copy_from_slice(&self.height.to_le_bytes());
        buf[8..12].copy_from_slice(&i32::from(self.has_alpha).to_le_bytes());
        writer.write_all(&buf)
    }

    /// Number of pixels the body must cover.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn validate(&self) -> Result<(), CodecError> {
        let in_range = |v: i32| (1..=MAX_DIMENSION).contains(&v);
        if in_range(self.width) && in_range(self.height) {
            Ok(())
        } else {
            Err(CodecError::InvalidDimensions {
                width: self.width.into(),
                height: self.height.into(),
            })
        }
    }
}
