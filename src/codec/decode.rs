use super::header::DataHeader;
use super::{CodecError, MAX_RUN};
use image::{Rgba, RgbaImage};
use std::io::{self, Read};

/// Whether the RLE body covered the whole canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    Complete,
    /// The stream ended early. Pixels past `painted` hold the mode default.
    Truncated { painted: usize, total: usize },
}

/// A decoded DATA stream.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: RgbaImage,
    pub has_alpha: bool,
    pub status: DecodeStatus,
}

/// Decode a DATA stream into an RGBA canvas.
///
/// Only the header can fail hard. Running out of bytes anywhere in the body
/// stops painting and returns what was decoded so far, flagged as
/// [`DecodeStatus::Truncated`]. Unreached pixels stay transparent black in
/// alpha mode and opaque black otherwise.
///
/// Stored colors are premultiplied by alpha; the returned canvas is straight
/// RGBA.
pub fn decode_data<R: Read + ?Sized>(reader: &mut R) -> Result<Decoded, CodecError> {
    let header = DataHeader::read_from(reader)?;
    log::debug!(
        "DATA image parameters: {}x{}, {}",
        header.width,
        header.height,
        if header.has_alpha { "RGBA" } else { "RGB" }
    );

    let background = if header.has_alpha {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([0, 0, 0, 255])
    };
    let mut image = RgbaImage::from_pixel(header.width as u32, header.height as u32, background);

    let total = header.pixel_count();
    let mut cursor = 0;
    while cursor < total {
        let Some((run, color)) = read_run(reader, header.has_alpha)? else {
            log::warn!("Reached end of stream with {cursor}/{total} pixels processed");
            return Ok(Decoded {
                image,
                has_alpha: header.has_alpha,
                status: DecodeStatus::Truncated {
                    painted: cursor,
                    total,
                },
            });
        };

        let run = run.min(total - cursor);
        // Row-major wraparound is just a contiguous span of the raw buffer.
        let raw: &mut [u8] = &mut image;
        for pixel in raw[cursor * 4..(cursor + run) * 4].chunks_exact_mut(4) {
            pixel.copy_from_slice(&color.0);
        }
        cursor += run;
    }

    Ok(Decoded {
        image,
        has_alpha: header.has_alpha,
        status: DecodeStatus::Complete,
    })
}

/// Read one `(count, color)` run. `None` means the stream ran out.
fn read_run<R: Read + ?Sized>(
    reader: &mut R,
    has_alpha: bool,
) -> Result<Option<(usize, Rgba<u8>)>, CodecError> {
    let mut count = [0u8; 1];
    if !fill(reader, &mut count)? {
        return Ok(None);
    }
    let run = match count[0] {
        0 => MAX_RUN,
        n => usize::from(n),
    };

    let alpha = if has_alpha {
        let mut alpha = [0u8; 1];
        if !fill(reader, &mut alpha)? {
            return Ok(None);
        }
        if alpha[0] == 0 {
            return Ok(Some((run, Rgba([0, 0, 0, 0]))));
        }
        alpha[0]
    } else {
        255
    };

    let mut bgr = [0u8; 3];
    if !fill(reader, &mut bgr)? {
        return Ok(None);
    }
    let [b, g, r] = bgr;
    let straight = |c| unpremultiply(c, alpha);
    Ok(Some((run, Rgba([straight(r), straight(g), straight(b), alpha]))))
}

/// Undo alpha premultiplication, rounding to nearest and clamping at 255.
fn unpremultiply(channel: u8, alpha: u8) -> u8 {
    match alpha {
        0 => 0,
        255 => channel,
        _ => {
            let (c, a) = (u32::from(channel), u32::from(alpha));
            ((c * 255 + a / 2) / a).min(255) as u8
        }
    }
}

/// `read_exact` that reports end-of-stream as `false` instead of an error.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::io::Cursor;

    fn decode(bytes: Vec<u8>) -> Decoded {
        decode_data(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn colors_are_stored_blue_green_red() {
        let mut bytes = data_header(1, 1, false);
        bytes.extend_from_slice(&[1, 0x11, 0x22, 0x33]);

        let decoded = decode(bytes);

        assert_eq!(*decoded.image.get_pixel(0, 0), Rgba([0x33, 0x22, 0x11, 255]));
        assert_eq!(decoded.status, DecodeStatus::Complete);
    }

    #[test]
    fn runs_wrap_across_rows() {
        let bytes = data_stream(3, 2, false, &[(4, [255, 0, 0, 255]), (2, [0, 0, 255, 255])]);

        let decoded = decode(bytes);

        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);
        assert_eq!(*decoded.image.get_pixel(2, 0), red);
        assert_eq!(*decoded.image.get_pixel(0, 1), red);
        assert_eq!(*decoded.image.get_pixel(1, 1), blue);
        assert_eq!(*decoded.image.get_pixel(2, 1), blue);
    }

    #[test]
    fn zero_count_means_256() {
        let mut bytes = data_header(16, 16, false);
        bytes.extend_from_slice(&[0, 9, 8, 7]);

        let decoded = decode(bytes);

        assert_eq!(decoded.status, DecodeStatus::Complete);
        assert!(decoded.image.pixels().all(|p| *p == Rgba([7, 8, 9, 255])));
    }

    #[test]
    fn overlong_run_is_clamped_to_canvas() {
        let mut bytes = data_header(2, 2, false);
        bytes.extend_from_slice(&[200, 1, 2, 3]);
        // Anything after the canvas is full is never read.
        bytes.extend_from_slice(&[1, 0xff, 0xff, 0xff]);

        let decoded = decode(bytes);

        assert_eq!(decoded.status, DecodeStatus::Complete);
        assert!(decoded.image.pixels().all(|p| *p == Rgba([3, 2, 1, 255])));
    }

    #[test]
    fn transparent_run_has_no_color_bytes() {
        let mut bytes = data_header(4, 1, true);
        bytes.extend_from_slice(&[2, 0]);
        bytes.extend_from_slice(&[2, 128, 10, 20, 30]);

        let decoded = decode(bytes);

        assert_eq!(decoded.status, DecodeStatus::Complete);
        assert_eq!(*decoded.image.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*decoded.image.get_pixel(1, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*decoded.image.get_pixel(2, 0), Rgba([60, 40, 20, 128]));
        assert_eq!(*decoded.image.get_pixel(3, 0), Rgba([60, 40, 20, 128]));
    }

    #[test]
    fn translucent_colors_are_unpremultiplied() {
        let mut bytes = data_header(3, 1, true);
        // Half-transparent full red, stored premultiplied.
        bytes.extend_from_slice(&[1, 128, 0, 0, 128]);
        // Channel brighter than its alpha clamps at 255.
        bytes.extend_from_slice(&[1, 100, 0, 50, 200]);
        bytes.extend_from_slice(&[1, 255, 7, 8, 9]);

        let decoded = decode(bytes);

        assert_eq!(*decoded.image.get_pixel(0, 0), Rgba([255, 0, 0, 128]));
        assert_eq!(*decoded.image.get_pixel(1, 0), Rgba([255, 128, 0, 100]));
        assert_eq!(*decoded.image.get_pixel(2, 0), Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn empty_body_leaves_mode_defaults() {
        let opaque = decode(data_header(3, 3, false));
        assert!(opaque.image.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
        assert_eq!(
            opaque.status,
            DecodeStatus::Truncated {
                painted: 0,
                total: 9
            }
        );

        let alpha = decode(data_header(3, 3, true));
        assert!(alpha.image.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn truncation_mid_run_keeps_painted_pixels() {
        let white = [255, 255, 255, 255];
        for tail in [&[7u8][..], &[7, 255], &[7, 255, 1], &[7, 255, 1, 2]] {
            let mut bytes = data_stream(4, 2, true, &[(3, white)]);
            bytes.extend_from_slice(tail);

            let decoded = decode(bytes);

            assert_eq!(
                decoded.status,
                DecodeStatus::Truncated {
                    painted: 3,
                    total: 8
                },
                "tail {tail:?}"
            );
            assert_eq!(*decoded.image.get_pixel(2, 0), Rgba(white));
            assert_eq!(*decoded.image.get_pixel(3, 0), Rgba([0, 0, 0, 0]));
            assert_eq!(*decoded.image.get_pixel(3, 1), Rgba([0, 0, 0, 0]));
        }
    }

    #[test]
    fn invalid_dimensions_fail_before_body() {
        let result = decode_data(&mut Cursor::new(data_header(0, 5, false)));
        assert!(matches!(
            result,
            Err(CodecError::InvalidDimensions {
                width: 0,
                height: 5
            })
        ));
    }

    #[test]
    fn read_errors_other_than_eof_are_fatal() {
        struct Broken(Cursor<Vec<u8>>);
        impl Read for Broken {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.read(buf)? {
                    0 => Err(io::Error::other("disk on fire")),
                    n => Ok(n),
                }
            }
        }

        let mut reader = Broken(Cursor::new(data_header(2, 2, false)));
        assert!(matches!(decode_data(&mut reader), Err(CodecError::Io(_))));
    }
}
