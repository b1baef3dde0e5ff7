//! Bitmap characters.
//!
//! JPEG, PNG and GIF payloads are kept encoded; decoding them is up to the
//! renderer. Lossless bitmaps are inflated and expanded to RGBA here since
//! their layout is SWF specific.

use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};
use crate::stream::SwfStream;
use crate::tag::TagType;

/// Encoding of a `JpegBitmap` payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG, possibly split from its tables.
    Jpeg,
    /// PNG, allowed in DefineBitsJPEG2 and 3 since SWF 8.
    Png,
    /// GIF89a or GIF87a.
    Gif,
}

impl ImageFormat {
    /// Sniffs the payload of a DefineBitsJPEG2/3 tag, which may hold a PNG
    /// or GIF since SWF 8.
    pub fn detect(data: &[u8]) -> ImageFormat {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            ImageFormat::Png
        } else if data.starts_with(b"GIF89a") || data.starts_with(b"GIF87a") {
            ImageFormat::Gif
        } else {
            ImageFormat::Jpeg
        }
    }
}

/// An encoded image.
#[derive(Clone, Debug, PartialEq)]
pub struct JpegBitmap {
    /// What `data` holds, sniffed from its magic bytes.
    pub format: ImageFormat,
    /// The image as stored, SOI/EOI markers and all.
    pub data: Vec<u8>,
    /// Shared encoding tables from the JPEGTables tag, DefineBits only.
    pub tables: Option<Arc<Vec<u8>>>,
    /// One alpha byte per pixel, DefineBitsJPEG3 only.
    pub alpha: Option<Vec<u8>>,
}

impl JpegBitmap {
    /// Reads a DefineBits, DefineBitsJPEG2 or DefineBitsJPEG3 body, after
    /// the character id.
    pub fn read(stream: &mut SwfStream, tag: TagType, tables: Option<Arc<Vec<u8>>>) -> Result<JpegBitmap> {
        match tag {
            TagType::DEFINE_BITS => {
                if tables.is_none() {
                    malformed!("DefineBits tag without a preceding JPEGTables tag");
                }
                let data = read_rest(stream)?;
                Ok(JpegBitmap {
                    format: ImageFormat::Jpeg,
                    data,
                    tables,
                    alpha: None,
                })
            }
            TagType::DEFINE_BITS_JPEG2 => {
                let data = read_rest(stream)?;
                Ok(JpegBitmap {
                    format: ImageFormat::detect(&data),
                    data,
                    tables: None,
                    alpha: None,
                })
            }
            TagType::DEFINE_BITS_JPEG3 => {
                stream.ensure_bytes(4)?;
                let alpha_offset = stream.read_u32()? as usize;
                stream.ensure_bytes(alpha_offset)?;
                let data = stream.read_bytes(alpha_offset)?.to_vec();
                let format = ImageFormat::detect(&data);
                let compressed = read_rest(stream)?;
                let alpha = if format == ImageFormat::Jpeg {
                    Some(inflate(&compressed, None)?)
                } else {
                    if !compressed.is_empty() {
                        malformed!("DefineBitsJPEG3 alpha data ignored for a {:?} image", format);
                    }
                    None
                };
                Ok(JpegBitmap {
                    format,
                    data,
                    tables: None,
                    alpha,
                })
            }
            other => Err(Error::corrupted(format!("{} is not a JPEG bitmap tag", other))),
        }
    }
}

/// A decoded DefineBitsLossless bitmap.
#[derive(Clone, Debug, PartialEq)]
pub struct LosslessBitmap {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Whether the alpha channel comes from the file (DefineBitsLossless2).
    /// Colour channels are then premultiplied, as stored.
    pub has_alpha: bool,
    /// Row major RGBA.
    pub pixels: Vec<u8>,
}

const FORMAT_COLORMAPPED: u8 = 3;
const FORMAT_RGB15: u8 = 4;
const FORMAT_RGB32: u8 = 5;

fn padded_row(bytes: usize) -> usize {
    (bytes + 3) & !3
}

impl LosslessBitmap {
    /// Reads a DefineBitsLossless or DefineBitsLossless2 body, after the
    /// character id.
    pub fn read(stream: &mut SwfStream, tag: TagType) -> Result<LosslessBitmap> {
        let has_alpha = tag == TagType::DEFINE_BITS_LOSSLESS2;
        stream.ensure_bytes(1 + 2 + 2)?;
        let format = stream.read_u8()?;
        let width = stream.read_u16()?;
        let height = stream.read_u16()?;

        parse_trace!(
            "  defbitslossless2: tag_type = {}, fmt = {}, w = {}, h = {}",
            tag,
            format,
            width,
            height
        );

        let w = width as usize;
        let h = height as usize;
        let color_bytes = if has_alpha { 4 } else { 3 };

        let sizes = match format {
            FORMAT_COLORMAPPED => {
                stream.ensure_bytes(1)?;
                let colors = stream.read_u8()? as usize + 1;
                padded_row(w)
                    .checked_mul(h)
                    .and_then(|indices| indices.checked_add(colors * color_bytes))
                    .map(|expected| (colors, expected))
            }
            FORMAT_RGB15 if !has_alpha => padded_row(w * 2).checked_mul(h).map(|expected| (0, expected)),
            FORMAT_RGB32 => w.checked_mul(h).and_then(|n| n.checked_mul(4)).map(|expected| (0, expected)),
            other => {
                return Err(Error::corrupted(format!(
                    "unknown lossless bitmap format {} in {}",
                    other, tag
                )))
            }
        };
        let (colormap_size, expected) = sizes.ok_or_else(|| {
            Error::corrupted(format!("{}x{} lossless bitmap is too large", width, height))
        })?;

        // The dimensions are only trusted once the data backs them.
        let data = inflate(&read_rest(stream)?, Some(expected))?;
        if data.len() < expected {
            malformed!(
                "Lossless bitmap data is {} bytes, expected {} ({}x{}, format {})",
                data.len(),
                expected,
                width,
                height,
                format
            );
            return Err(Error::corrupted(format!(
                "{}x{} lossless bitmap has only {} of {} bytes",
                width,
                height,
                data.len(),
                expected
            )));
        }

        let mut pixels = vec![0u8; w * h * 4];
        match format {
            FORMAT_COLORMAPPED => {
                let (colormap, indices) = data.split_at(data.len().min(colormap_size * color_bytes));
                let row_len = padded_row(w);
                for y in 0..h {
                    for x in 0..w {
                        let index = indices.get(y * row_len + x).copied().unwrap_or(0) as usize;
                        let color = colormap
                            .get(index * color_bytes..(index + 1) * color_bytes)
                            .unwrap_or(&[0, 0, 0, 0]);
                        let out = &mut pixels[(y * w + x) * 4..][..4];
                        out[..3].copy_from_slice(&color[..3]);
                        out[3] = if has_alpha { color[3] } else { 255 };
                    }
                }
            }
            FORMAT_RGB15 => {
                let row_len = padded_row(w * 2);
                for y in 0..h {
                    for x in 0..w {
                        let at = y * row_len + x * 2;
                        let pixel = match data.get(at..at + 2) {
                            Some(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]),
                            None => 0,
                        };
                        let expand = |c: u16| ((c & 0x1F) << 3 | (c & 0x1F) >> 2) as u8;
                        let out = &mut pixels[(y * w + x) * 4..][..4];
                        out[0] = expand(pixel >> 10);
                        out[1] = expand(pixel >> 5);
                        out[2] = expand(pixel);
                        out[3] = 255;
                    }
                }
            }
            _ => {
                for (out, argb) in pixels.chunks_exact_mut(4).zip(data.chunks_exact(4)) {
                    out[0] = argb[1];
                    out[1] = argb[2];
                    out[2] = argb[3];
                    out[3] = if has_alpha { argb[0] } else { 255 };
                }
            }
        }

        Ok(LosslessBitmap {
            width,
            height,
            has_alpha,
            pixels,
        })
    }
}

/// A bitmap character.
#[derive(Clone, Debug, PartialEq)]
pub enum BitmapDef {
    /// DefineBits, DefineBitsJPEG2 or DefineBitsJPEG3.
    Jpeg(JpegBitmap),
    /// DefineBitsLossless or DefineBitsLossless2.
    Lossless(LosslessBitmap),
}

/// The body of a JPEGTables tag.
pub fn read_jpeg_tables(stream: &mut SwfStream) -> Result<Vec<u8>> {
    read_rest(stream)
}

fn read_rest(stream: &mut SwfStream) -> Result<Vec<u8>> {
    let length = stream.bytes_left();
    Ok(stream.read_bytes(length)?.to_vec())
}

/// Cap on preallocation, as a multiple of the compressed size.
const MAX_INFLATE_RATIO: usize = 16;

fn inflate(data: &[u8], size_hint: Option<usize>) -> Result<Vec<u8>> {
    let ceiling = data.len().saturating_mul(MAX_INFLATE_RATIO);
    let mut out = Vec::with_capacity(size_hint.unwrap_or(data.len() * 2).min(ceiling));
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|err| Error::corrupted(format!("Failed to inflate bitmap data: {}", err)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;
    use crate::test_util::{capture_logs, BitWriter};

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn read_lossless(tag: TagType, header: &[u8], raw: &[u8]) -> LosslessBitmap {
        let mut w = BitWriter::new();
        w.bytes(header).bytes(&deflate(raw));
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        LosslessBitmap::read(&mut s, tag).unwrap()
    }

    #[test]
    fn colormapped_rows_are_padded() {
        // 2x2, two colours, rows padded to 4 bytes
        let raw = [255, 0, 0, 0, 0, 255, 0, 1, 0, 0, 1, 0, 0, 0];
        let bitmap = read_lossless(TagType::DEFINE_BITS_LOSSLESS, &[3, 2, 0, 2, 0, 1], &raw);
        assert_eq!((bitmap.width, bitmap.height), (2, 2));
        assert_eq!(&bitmap.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&bitmap.pixels[4..8], &[0, 0, 255, 255]);
        assert_eq!(&bitmap.pixels[8..12], &[0, 0, 255, 255]);
        assert_eq!(&bitmap.pixels[12..16], &[255, 0, 0, 255]);
    }

    #[test]
    fn argb_becomes_rgba() {
        let raw = [128, 10, 20, 30];
        let bitmap = read_lossless(TagType::DEFINE_BITS_LOSSLESS2, &[5, 1, 0, 1, 0], &raw);
        assert!(bitmap.has_alpha);
        assert_eq!(bitmap.pixels, vec![10, 20, 30, 128]);

        let bitmap = read_lossless(TagType::DEFINE_BITS_LOSSLESS, &[5, 1, 0, 1, 0], &raw);
        assert_eq!(bitmap.pixels, vec![10, 20, 30, 255]);
    }

    #[test]
    fn rgb15_expands_channels() {
        // pure red, then padding
        let raw = [0x7C, 0x00, 0, 0];
        let bitmap = read_lossless(TagType::DEFINE_BITS_LOSSLESS, &[4, 1, 0, 1, 0], &raw);
        assert_eq!(bitmap.pixels, vec![255, 0, 0, 255]);
    }

    fn try_read_lossless(tag: TagType, header: &[u8], raw: &[u8]) -> Result<LosslessBitmap> {
        let mut w = BitWriter::new();
        w.bytes(header).bytes(&deflate(raw));
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        LosslessBitmap::read(&mut s, tag)
    }

    #[test]
    fn short_data_is_rejected() {
        // 2x2 ARGB needs 16 bytes
        let raw = [0, 1, 2, 3];
        let (result, logs) =
            capture_logs(|| try_read_lossless(TagType::DEFINE_BITS_LOSSLESS2, &[5, 2, 0, 2, 0], &raw));
        assert!(matches!(result, Err(Error::Corrupted(_))));
        assert_eq!(logs.malformed(), 1);
    }

    #[test]
    fn short_colormapped_data_is_rejected() {
        // 4x4 with a two colour table needs 6 + 16 bytes
        let raw = [255, 0, 0, 0, 0, 255, 0, 1, 1, 0];
        let result = try_read_lossless(TagType::DEFINE_BITS_LOSSLESS, &[3, 4, 0, 4, 0, 1], &raw);
        assert!(result.is_err());
    }

    #[test]
    fn huge_dimensions_with_tiny_data_are_rejected() {
        let (result, logs) = capture_logs(|| {
            try_read_lossless(TagType::DEFINE_BITS_LOSSLESS2, &[5, 0xFF, 0xFF, 0xFF, 0xFF], &[0; 4])
        });
        assert!(result.is_err());
        assert_eq!(logs.malformed(), 1);
    }

    #[test]
    fn jpeg3_alpha_is_inflated() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
        let mut w = BitWriter::new();
        w.u32(jpeg.len() as u32).bytes(&jpeg).bytes(&deflate(&[7, 8, 9]));
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        let bitmap = JpegBitmap::read(&mut s, TagType::DEFINE_BITS_JPEG3, None).unwrap();
        assert_eq!(bitmap.format, ImageFormat::Jpeg);
        assert_eq!(bitmap.data, jpeg.to_vec());
        assert_eq!(bitmap.alpha, Some(vec![7, 8, 9]));
    }

    #[test]
    fn detects_png_payloads() {
        let data = b"\x89PNG\r\n\x1a\nrest";
        let mut s = SwfStream::new(data);
        let bitmap = JpegBitmap::read(&mut s, TagType::DEFINE_BITS_JPEG2, None).unwrap();
        assert_eq!(bitmap.format, ImageFormat::Png);
    }
}
