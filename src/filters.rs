//! Bitmap filter records, as attached to button records and placed
//! objects.
//!
//! Filter records carry no length, so a list can only be read up to the
//! first filter type we don't know.

use crate::error::Result;
use crate::geometry::Rgba;
use crate::stream::SwfStream;

/// Where a bevel or gradient filter draws relative to the edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BevelType {
    /// Inside the edge.
    Inner,
    /// Outside the edge.
    Outer,
    /// On top of the object, both sides.
    Full,
}

impl BevelType {
    fn from_flags(inner: bool, on_top: bool) -> BevelType {
        if on_top {
            BevelType::Full
        } else if inner {
            BevelType::Inner
        } else {
            BevelType::Outer
        }
    }
}

/// DropShadowFilter (type 0).
#[derive(Clone, Debug, PartialEq)]
pub struct DropShadowFilter {
    /// Offset in pixels.
    pub distance: f32,
    /// Radians.
    pub angle: f32,
    /// 0xRRGGBB.
    pub color: u32,
    /// Alpha of `color`.
    pub alpha: u8,
    /// Horizontal blur in pixels.
    pub blur_x: f32,
    /// Vertical blur in pixels.
    pub blur_y: f32,
    /// Imprint strength.
    pub strength: f32,
    /// Number of blur passes.
    pub quality: u8,
    /// Draw inside the object's edges.
    pub inner: bool,
    /// Knock out the object itself.
    pub knockout: bool,
    /// Draw the shadow only.
    pub hide_object: bool,
}

/// BlurFilter (type 1).
#[derive(Clone, Debug, PartialEq)]
pub struct BlurFilter {
    /// Horizontal blur in pixels.
    pub blur_x: f32,
    /// Vertical blur in pixels.
    pub blur_y: f32,
    /// Number of blur passes.
    pub quality: u8,
}

/// GlowFilter (type 2).
#[derive(Clone, Debug, PartialEq)]
pub struct GlowFilter {
    /// 0xRRGGBB.
    pub color: u32,
    /// Alpha of `color`.
    pub alpha: u8,
    /// Horizontal blur in pixels.
    pub blur_x: f32,
    /// Vertical blur in pixels.
    pub blur_y: f32,
    /// Imprint strength.
    pub strength: f32,
    /// Number of blur passes.
    pub quality: u8,
    /// Draw inside the object's edges.
    pub inner: bool,
    /// Knock out the object itself.
    pub knockout: bool,
}

/// BevelFilter (type 3).
#[derive(Clone, Debug, PartialEq)]
pub struct BevelFilter {
    /// Offset in pixels.
    pub distance: f32,
    /// Radians.
    pub angle: f32,
    /// Highlight colour, 0xRRGGBB.
    pub highlight_color: u32,
    /// Alpha of the highlight.
    pub highlight_alpha: u8,
    /// Shadow colour, 0xRRGGBB.
    pub shadow_color: u32,
    /// Alpha of the shadow.
    pub shadow_alpha: u8,
    /// Horizontal blur in pixels.
    pub blur_x: f32,
    /// Vertical blur in pixels.
    pub blur_y: f32,
    /// Imprint strength.
    pub strength: f32,
    /// Number of blur passes.
    pub quality: u8,
    /// Which side of the edge is drawn.
    pub kind: BevelType,
    /// Knock out the object itself.
    pub knockout: bool,
}

/// Shared by GradientGlow and GradientBevel, which differ only in how
/// they're drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientFilter {
    /// Offset in pixels.
    pub distance: f32,
    /// Radians.
    pub angle: f32,
    /// Gradient colours, 0xRRGGBB.
    pub colors: Vec<u32>,
    /// One alpha per colour.
    pub alphas: Vec<u8>,
    /// Gradient positions, 0 to 255.
    pub ratios: Vec<u8>,
    /// Horizontal blur in pixels.
    pub blur_x: f32,
    /// Vertical blur in pixels.
    pub blur_y: f32,
    /// Imprint strength.
    pub strength: f32,
    /// Number of blur passes.
    pub quality: u8,
    /// Which side of the edge is drawn.
    pub kind: BevelType,
    /// Knock out the object itself.
    pub knockout: bool,
}

/// ConvolutionFilter (type 5).
#[derive(Clone, Debug, PartialEq)]
pub struct ConvolutionFilter {
    /// Matrix columns.
    pub matrix_x: u8,
    /// Matrix rows.
    pub matrix_y: u8,
    /// Row major, `matrix_x * matrix_y` entries.
    pub matrix: Vec<f32>,
    /// The matrix result is divided by this.
    pub divisor: f32,
    /// Added after the division.
    pub bias: f32,
    /// Leave the alpha channel alone.
    pub preserve_alpha: bool,
    /// Extend edge pixels instead of using `color` off the image.
    pub clamp: bool,
    /// Colour for samples off the image, 0xRRGGBB.
    pub color: u32,
    /// Alpha of `color`.
    pub alpha: u8,
}

/// ColorMatrixFilter (type 6).
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMatrixFilter {
    /// A 4x5 matrix, row major.
    pub matrix: Vec<f32>,
}

/// A filter record.
#[derive(Clone, Debug, PartialEq)]
pub enum BitmapFilter {
    /// Type 0.
    DropShadow(DropShadowFilter),
    /// Type 1.
    Blur(BlurFilter),
    /// Type 2.
    Glow(GlowFilter),
    /// Type 3.
    Bevel(BevelFilter),
    /// Type 4.
    GradientGlow(GradientFilter),
    /// Type 5.
    Convolution(ConvolutionFilter),
    /// Type 6.
    ColorMatrix(ColorMatrixFilter),
    /// Type 7.
    GradientBevel(GradientFilter),
}

impl DropShadowFilter {
    /// Reads the record after its type byte.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(4 + 16 + 2 + 1)?;
        let color = Rgba::read_rgba(stream)?;
        let blur_x = stream.read_fixed()?;
        let blur_y = stream.read_fixed()?;
        let angle = stream.read_fixed()?;
        let distance = stream.read_fixed()?;
        let strength = stream.read_short_sfixed()?;
        let inner = stream.read_bit()?;
        let knockout = stream.read_bit()?;
        let composite_source = stream.read_bit()?;
        let quality = stream.read_uint(5)? as u8;
        Ok(DropShadowFilter {
            distance,
            angle,
            color: color.rgb(),
            alpha: color.a,
            blur_x,
            blur_y,
            strength,
            quality,
            inner,
            knockout,
            hide_object: !composite_source,
        })
    }
}

impl BlurFilter {
    /// Reads the record after its type byte.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(4 + 4 + 1)?;
        let blur_x = stream.read_ufixed()?;
        let blur_y = stream.read_ufixed()?;
        let quality = stream.read_uint(5)? as u8;
        stream.read_uint(3)?;
        Ok(BlurFilter {
            blur_x,
            blur_y,
            quality,
        })
    }
}

impl GlowFilter {
    /// Reads the record after its type byte.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(4 + 8 + 2 + 1)?;
        let color = Rgba::read_rgba(stream)?;
        let blur_x = stream.read_fixed()?;
        let blur_y = stream.read_fixed()?;
        let strength = stream.read_short_sfixed()?;
        let inner = stream.read_bit()?;
        let knockout = stream.read_bit()?;
        stream.read_bit()?; // composite source, always set
        let quality = stream.read_uint(5)? as u8;
        Ok(GlowFilter {
            color: color.rgb(),
            alpha: color.a,
            blur_x,
            blur_y,
            strength,
            quality,
            inner,
            knockout,
        })
    }
}

impl BevelFilter {
    /// Reads the record after its type byte.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(4 + 4 + 16 + 2 + 1)?;
        let shadow = Rgba::read_rgba(stream)?;
        let highlight = Rgba::read_rgba(stream)?;
        let blur_x = stream.read_fixed()?;
        let blur_y = stream.read_fixed()?;
        let angle = stream.read_fixed()?;
        let distance = stream.read_fixed()?;
        let strength = stream.read_short_sfixed()?;
        let inner = stream.read_bit()?;
        let knockout = stream.read_bit()?;
        stream.read_bit()?;
        let on_top = stream.read_bit()?;
        let quality = stream.read_uint(4)? as u8;
        Ok(BevelFilter {
            distance,
            angle,
            highlight_color: highlight.rgb(),
            highlight_alpha: highlight.a,
            shadow_color: shadow.rgb(),
            shadow_alpha: shadow.a,
            blur_x,
            blur_y,
            strength,
            quality,
            kind: BevelType::from_flags(inner, on_top),
            knockout,
        })
    }
}

impl GradientFilter {
    /// Reads a GradientGlow or GradientBevel record after its type byte.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(1)?;
        let count = stream.read_u8()? as usize;

        stream.ensure_bytes(count * 5 + 16 + 2 + 1)?;
        let mut colors = Vec::with_capacity(count);
        let mut alphas = Vec::with_capacity(count);
        for _ in 0..count {
            let color = Rgba::read_rgba(stream)?;
            colors.push(color.rgb());
            alphas.push(color.a);
        }
        let mut ratios = Vec::with_capacity(count);
        for _ in 0..count {
            ratios.push(stream.read_u8()?);
        }

        let blur_x = stream.read_fixed()?;
        let blur_y = stream.read_fixed()?;
        let angle = stream.read_fixed()?;
        let distance = stream.read_fixed()?;
        let strength = stream.read_short_sfixed()?;
        let inner = stream.read_bit()?;
        let knockout = stream.read_bit()?;
        stream.read_bit()?;
        let on_top = stream.read_bit()?;
        let quality = stream.read_uint(4)? as u8;
        Ok(GradientFilter {
            distance,
            angle,
            colors,
            alphas,
            ratios,
            blur_x,
            blur_y,
            strength,
            quality,
            kind: BevelType::from_flags(inner, on_top),
            knockout,
        })
    }
}

impl ConvolutionFilter {
    /// Reads the record after its type byte. Matrix values, divisor and bias
    /// are IEEE single floats.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(2 + 8)?;
        let matrix_x = stream.read_u8()?;
        let matrix_y = stream.read_u8()?;
        let divisor = stream.read_long_float()?;
        let bias = stream.read_long_float()?;

        let entries = matrix_x as usize * matrix_y as usize;
        stream.ensure_bytes(entries * 4 + 4 + 1)?;
        let mut matrix = Vec::with_capacity(entries);
        for _ in 0..entries {
            matrix.push(stream.read_long_float()?);
        }

        let color = Rgba::read_rgba(stream)?;
        stream.read_uint(6)?;
        let clamp = stream.read_bit()?;
        let preserve_alpha = stream.read_bit()?;
        Ok(ConvolutionFilter {
            matrix_x,
            matrix_y,
            matrix,
            divisor,
            bias,
            preserve_alpha,
            clamp,
            color: color.rgb(),
            alpha: color.a,
        })
    }
}

impl ColorMatrixFilter {
    /// Reads 20 IEEE single floats.
    pub fn read(stream: &mut SwfStream) -> Result<Self> {
        stream.ensure_bytes(20 * 4)?;
        let mut matrix = Vec::with_capacity(20);
        for _ in 0..20 {
            matrix.push(stream.read_long_float()?);
        }
        Ok(ColorMatrixFilter { matrix })
    }
}

impl BitmapFilter {
    /// Reads one filter with its type byte. `Ok(None)` for an unknown type,
    /// after which nothing more of the list can be read.
    pub fn read(stream: &mut SwfStream) -> Result<Option<BitmapFilter>> {
        stream.ensure_bytes(1)?;
        let filter = match stream.read_u8()? {
            0 => BitmapFilter::DropShadow(DropShadowFilter::read(stream)?),
            1 => BitmapFilter::Blur(BlurFilter::read(stream)?),
            2 => BitmapFilter::Glow(GlowFilter::read(stream)?),
            3 => BitmapFilter::Bevel(BevelFilter::read(stream)?),
            4 => BitmapFilter::GradientGlow(GradientFilter::read(stream)?),
            5 => BitmapFilter::Convolution(ConvolutionFilter::read(stream)?),
            6 => BitmapFilter::ColorMatrix(ColorMatrixFilter::read(stream)?),
            7 => BitmapFilter::GradientBevel(GradientFilter::read(stream)?),
            other => {
                malformed!("Invalid filter type {}.", other);
                return Ok(None);
            }
        };
        Ok(Some(filter))
    }
}

/// Reads a filter list into `out` and returns how many filters were read.
///
/// With `read_count_prefix` the list starts with a count byte, otherwise a
/// single filter is read. An unknown filter type ends the list early; the
/// filters before it are kept. A truncated filter is an error, again
/// keeping the ones before it.
pub fn read_filters(
    stream: &mut SwfStream,
    read_count_prefix: bool,
    out: &mut Vec<BitmapFilter>,
) -> Result<usize> {
    let count = if read_count_prefix {
        stream.ensure_bytes(1)?;
        stream.read_u8()? as usize
    } else {
        1
    };

    for i in 0..count {
        match BitmapFilter::read(stream)? {
            Some(filter) => out.push(filter),
            None => return Ok(i),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{capture_logs, BitWriter};

    fn blur(w: &mut BitWriter, x: f32, y: f32, passes: u32) {
        w.u8(1).fixed(x).fixed(y).ubits(5, passes).ubits(3, 0);
    }

    #[test]
    fn unknown_type_aborts_the_list() {
        let mut w = BitWriter::new();
        w.u8(3);
        blur(&mut w, 4.0, 4.0, 1);
        w.u8(9);
        blur(&mut w, 2.0, 2.0, 1);
        let bytes = w.into_bytes();

        let mut s = SwfStream::new(&bytes);
        let mut filters = Vec::new();
        let (count, logs) = capture_logs(|| read_filters(&mut s, true, &mut filters).unwrap());
        assert_eq!(count, 1);
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters[0],
            BitmapFilter::Blur(BlurFilter {
                blur_x: 4.0,
                blur_y: 4.0,
                quality: 1
            })
        );
        assert_eq!(logs.malformed(), 1);
    }

    #[test]
    fn single_filter_without_prefix() {
        let mut w = BitWriter::new();
        blur(&mut w, 1.5, 0.5, 3);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        let mut filters = Vec::new();
        assert_eq!(read_filters(&mut s, false, &mut filters).unwrap(), 1);
        assert_eq!(s.bytes_left(), 0);
    }

    #[test]
    fn drop_shadow() {
        let mut w = BitWriter::new();
        w.u8(0).bytes(&[0x11, 0x22, 0x33, 0x80]);
        w.fixed(5.0).fixed(6.0).fixed(0.785).fixed(4.0).fixed8(1.5);
        w.bit(true).bit(false).bit(true).ubits(5, 2);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        match BitmapFilter::read(&mut s).unwrap() {
            Some(BitmapFilter::DropShadow(f)) => {
                assert_eq!(f.color, 0x112233);
                assert_eq!(f.alpha, 0x80);
                assert_eq!(f.blur_y, 6.0);
                assert_eq!(f.distance, 4.0);
                assert!((f.angle - 0.785).abs() < 1e-4);
                assert_eq!(f.strength, 1.5);
                assert!(f.inner);
                assert!(!f.knockout);
                assert!(!f.hide_object);
                assert_eq!(f.quality, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bevel_on_top_is_full() {
        let mut w = BitWriter::new();
        w.u8(3).bytes(&[0; 4]).bytes(&[0xFF, 0xFF, 0xFF, 0xFF]);
        w.fixed(4.0).fixed(4.0).fixed(0.0).fixed(4.0).fixed8(1.0);
        w.bit(true).bit(false).bit(true).bit(true).ubits(4, 1);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        match BitmapFilter::read(&mut s).unwrap() {
            Some(BitmapFilter::Bevel(f)) => {
                assert_eq!(f.kind, BevelType::Full);
                assert_eq!(f.highlight_color, 0xFFFFFF);
                assert_eq!(f.quality, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn gradient_glow() {
        let mut w = BitWriter::new();
        w.u8(4).u8(2);
        w.bytes(&[255, 0, 0, 255]).bytes(&[0, 0, 255, 0]);
        w.u8(0).u8(255);
        w.fixed(8.0).fixed(8.0).fixed(0.0).fixed(0.0).fixed8(2.0);
        w.bit(false).bit(true).bit(true).bit(false).ubits(4, 3);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        match BitmapFilter::read(&mut s).unwrap() {
            Some(BitmapFilter::GradientGlow(f)) => {
                assert_eq!(f.colors, vec![0xFF0000, 0x0000FF]);
                assert_eq!(f.alphas, vec![255, 0]);
                assert_eq!(f.ratios, vec![0, 255]);
                assert_eq!(f.kind, BevelType::Outer);
                assert!(f.knockout);
                assert_eq!(f.quality, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn convolution_uses_ieee_floats() {
        let mut w = BitWriter::new();
        w.u8(5).u8(3).u8(1).f32(3.0).f32(0.5);
        w.f32(1.0).f32(1.0).f32(1.0);
        w.bytes(&[0, 0, 0, 0]).ubits(6, 0).bit(true).bit(false);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        match BitmapFilter::read(&mut s).unwrap() {
            Some(BitmapFilter::Convolution(f)) => {
                assert_eq!(f.matrix, vec![1.0, 1.0, 1.0]);
                assert_eq!(f.divisor, 3.0);
                assert_eq!(f.bias, 0.5);
                assert!(f.clamp);
                assert!(!f.preserve_alpha);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn color_matrix() {
        let mut w = BitWriter::new();
        w.u8(6);
        for i in 0..20 {
            w.f32(i as f32);
        }
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        match BitmapFilter::read(&mut s).unwrap() {
            Some(BitmapFilter::ColorMatrix(f)) => assert_eq!(f.matrix[19], 19.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_filter_keeps_earlier_ones() {
        let mut w = BitWriter::new();
        w.u8(2);
        blur(&mut w, 1.0, 1.0, 1);
        w.u8(6).f32(1.0);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        let mut filters = Vec::new();
        assert!(read_filters(&mut s, true, &mut filters).is_err());
        assert_eq!(filters.len(), 1);
    }
}
