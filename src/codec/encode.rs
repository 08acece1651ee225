use super::header::DataHeader;
use super::{CodecError, MAX_RUN};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Write;

/// Alpha-mode predicate for encoding.
///
/// True only when the source pixel format carries an alpha channel *and* at
/// least one pixel is less than fully opaque. An RGBA image that is opaque
/// everywhere is written in RGB mode.
///
/// Opacity is judged at 16 bits so wide formats keep their near-opaque alpha.
pub fn has_translucency(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    image.to_rgba16().pixels().any(|p| p.0[3] < u16::MAX)
}

/// Encode a decoded raster image as a DATA stream.
///
/// Returns the header that was written.
pub fn encode_data<W: Write + ?Sized>(
    image: &DynamicImage,
    writer: &mut W,
) -> Result<DataHeader, CodecError> {
    let has_alpha = has_translucency(image);
    encode_rgba(&image.to_rgba8(), has_alpha, writer)
}

/// Write `image` as a DATA stream in the given alpha mode.
///
/// Runs are maximal sequences of exactly equal RGBA pixels in row-major
/// order, capped at 256. In alpha mode colors are premultiplied by alpha
/// before comparison, so every fully transparent pixel joins one run. In RGB
/// mode the alpha channel is dropped.
pub fn encode_rgba<W: Write + ?Sized>(
    image: &RgbaImage,
    has_alpha: bool,
    writer: &mut W,
) -> Result<DataHeader, CodecError> {
    let header = DataHeader::new(image.width(), image.height(), has_alpha)?;
    log::debug!(
        "PNG image parameters: {}x{}, {}",
        header.width,
        header.height,
        if has_alpha { "RGBA" } else { "RGB" }
    );
    header.write_to(writer)?;

    let pixels: Vec<Rgba<u8>> = image
        .pixels()
        .map(|&p| if has_alpha { premultiply(p) } else { p })
        .collect();
    let mut cursor = 0;
    while cursor < pixels.len() {
        let color = pixels[cursor];
        let run = pixels[cursor..]
            .iter()
            .take(MAX_RUN)
            .take_while(|p| **p == color)
            .count();
        write_run(writer, run, color, has_alpha)?;
        cursor += run;
    }

    Ok(header)
}

/// Scale color channels by alpha, rounding to nearest.
fn premultiply(pixel: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let scale = |c: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;
    Rgba([scale(r), scale(g), scale(b), a])
}

fn write_run<W: Write + ?Sized>(
    writer: &mut W,
    run: usize,
    color: Rgba<u8>,
    has_alpha: bool,
) -> std::io::Result<()> {
    let [r, g, b, a] = color.0;
    // 256 wraps to 0 on the wire.
    let count = (run % MAX_RUN) as u8;
    if !has_alpha {
        writer.write_all(&[count, b, g, r])
    } else if a == 0 {
        writer.write_all(&[count, 0])
    } else {
        writer.write_all(&[count, a, b, g, r])
    }
}
