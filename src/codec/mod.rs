//! DATA ⇄ PNG codec: pure, stateless, no scheduling.
//!
//! | Direction | Entry point | Raster side |
//! |---|---|---|
//! | **DATA → PNG** | [`data_to_png`] | `image::codecs::png::PngEncoder` |
//! | **PNG → DATA** | [`png_to_data`] | `image::load_from_memory_with_format` |
//!
//! The module is split into:
//! - **Header**: the fixed 12-byte prefix ([`DataHeader`])
//! - **Decode**: RLE stream → RGBA canvas, tolerant of truncated bodies
//! - **Encode**: RGBA canvas → RLE stream, with alpha-mode detection
//!
//! ## Wire layout
//!
//! ```text
//! offset 0  : i32 LE  width       (1..=8192)
//! offset 4  : i32 LE  height      (1..=8192)
//! offset 8  : i32 LE  alpha flag  (0 = opaque, nonzero = alpha channel)
//! offset 12 : runs until width*height pixels are covered
//!             u8 count (0 means 256)
//!             alpha mode:  u8 alpha, then B G R only when alpha != 0
//!             opaque mode: B G R
//! ```
//!
//! Colors are stored blue-green-red and premultiplied by alpha. Rasters on
//! the PNG side are straight (non-premultiplied) RGBA; decode divides alpha
//! out and encode multiplies it back in.

mod decode;
mod encode;
mod header;

pub use decode::{DecodeStatus, Decoded, decode_data};
pub use encode::{encode_data, encode_rgba, has_translucency};
pub use header::{DataHeader, HEADER_LEN, MAX_DIMENSION};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Longest run a single count byte can express.
pub const MAX_RUN: usize = 256;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("truncated header: expected 12 bytes")]
    TruncatedHeader,
}

/// What a single conversion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOutcome {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub status: DecodeStatus,
}

impl ConvertOutcome {
    /// `"RGBA"` for alpha-mode streams, `"RGB"` otherwise.
    pub fn format_label(&self) -> &'static str {
        if self.has_alpha { "RGBA" } else { "RGB" }
    }
}

/// Convert a DATA stream into PNG bytes.
///
/// A truncated body still produces a full-size PNG; the outcome reports it
/// as [`DecodeStatus::Truncated`].
pub fn data_to_png(
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<ConvertOutcome, CodecError> {
    let decoded = decode_data(input)?;
    let (width, height) = decoded.image.dimensions();

    PngEncoder::new(&mut *output).write_image(
        decoded.image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgba8,
    )?;

    Ok(ConvertOutcome {
        width,
        height,
        has_alpha: decoded.has_alpha,
        status: decoded.status,
    })
}

/// Convert PNG bytes into a DATA stream.
pub fn png_to_data(
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<ConvertOutcome, CodecError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;

    let header = encode_data(&image, output)?;

    Ok(ConvertOutcome {
        width: image.width(),
        height: image.height(),
        has_alpha: header.has_alpha,
        status: DecodeStatus::Complete,
    })
}
