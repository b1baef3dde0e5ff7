//! The small record types that show up in nearly every tag: rectangles,
//! matrices, colours and colour transforms.

use crate::error::Result;
use crate::stream::SwfStream;

/// An axis aligned rectangle in twips.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x_min: i32,
    /// Right edge.
    pub x_max: i32,
    /// Top edge.
    pub y_min: i32,
    /// Bottom edge.
    pub y_max: i32,
}

impl Rect {
    /// A rectangle from its edges, in RECT field order.
    pub fn new(x_min: i32, x_max: i32, y_min: i32, y_max: i32) -> Self {
        Rect {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Reads a RECT record: a 5 bit field size followed by four signed
    /// fields of that size. Leaves the stream byte aligned.
    pub fn read(stream: &mut SwfStream) -> Result<Rect> {
        stream.align();
        stream.ensure_bits(5)?;
        let nbits = stream.read_uint(5)?;
        stream.ensure_bits(nbits as usize * 4)?;
        let x_min = stream.read_sint(nbits)?;
        let x_max = stream.read_sint(nbits)?;
        let y_min = stream.read_sint(nbits)?;
        let y_max = stream.read_sint(nbits)?;
        stream.align();
        Ok(Rect::new(x_min, x_max, y_min, y_max))
    }

    /// Width in twips.
    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    /// Height in twips.
    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    /// The smallest rectangle holding both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Grows the rectangle to contain a point.
    pub fn expand_to(&mut self, x: i32, y: i32) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }
}

/// A 2x3 affine transform. Translation is in twips.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix {
    /// Horizontal scale.
    pub scale_x: f32,
    /// First rotate/skew term.
    pub rotate_skew0: f32,
    /// Second rotate/skew term.
    pub rotate_skew1: f32,
    /// Vertical scale.
    pub scale_y: f32,
    /// Horizontal translation in twips.
    pub translate_x: i32,
    /// Vertical translation in twips.
    pub translate_y: i32,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix {
            scale_x: 1.0,
            rotate_skew0: 0.0,
            rotate_skew1: 0.0,
            scale_y: 1.0,
            translate_x: 0,
            translate_y: 0,
        }
    }
}

impl Matrix {
    /// Reads a MATRIX record and leaves the stream byte aligned.
    pub fn read(stream: &mut SwfStream) -> Result<Matrix> {
        stream.align();
        let mut matrix = Matrix::default();

        stream.ensure_bits(1)?;
        if stream.read_bit()? {
            stream.ensure_bits(5)?;
            let nbits = stream.read_uint(5)?;
            stream.ensure_bits(nbits as usize * 2)?;
            matrix.scale_x = stream.read_sint(nbits)? as f32 / 65536.0;
            matrix.scale_y = stream.read_sint(nbits)? as f32 / 65536.0;
        }

        stream.ensure_bits(1)?;
        if stream.read_bit()? {
            stream.ensure_bits(5)?;
            let nbits = stream.read_uint(5)?;
            stream.ensure_bits(nbits as usize * 2)?;
            matrix.rotate_skew0 = stream.read_sint(nbits)? as f32 / 65536.0;
            matrix.rotate_skew1 = stream.read_sint(nbits)? as f32 / 65536.0;
        }

        stream.ensure_bits(5)?;
        let nbits = stream.read_uint(5)?;
        stream.ensure_bits(nbits as usize * 2)?;
        matrix.translate_x = stream.read_sint(nbits)?;
        matrix.translate_y = stream.read_sint(nbits)?;
        stream.align();
        Ok(matrix)
    }

    /// Whether this is the identity transform.
    pub fn is_identity(&self) -> bool {
        *self == Matrix::default()
    }
}

/// A colour with alpha. Opaque unless the record carried an alpha byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 255 for opaque.
    pub a: u8,
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::new(0, 0, 0, 255)
    }
}

impl Rgba {
    /// A colour from its channels.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// Reads an RGB record as an opaque colour.
    pub fn read_rgb(stream: &mut SwfStream) -> Result<Rgba> {
        stream.ensure_bytes(3)?;
        let r = stream.read_u8()?;
        let g = stream.read_u8()?;
        let b = stream.read_u8()?;
        Ok(Rgba::new(r, g, b, 255))
    }

    /// Reads an RGBA record.
    pub fn read_rgba(stream: &mut SwfStream) -> Result<Rgba> {
        stream.ensure_bytes(4)?;
        let r = stream.read_u8()?;
        let g = stream.read_u8()?;
        let b = stream.read_u8()?;
        let a = stream.read_u8()?;
        Ok(Rgba::new(r, g, b, a))
    }

    /// Packs the colour channels as 0xRRGGBB, the form filters carry them in.
    pub fn rgb(&self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// A colour transform. Multipliers are 8.8 fixed point, so 256 leaves a
/// channel unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColorTransform {
    /// Red multiplier.
    pub r_mult: i16,
    /// Green multiplier.
    pub g_mult: i16,
    /// Blue multiplier.
    pub b_mult: i16,
    /// Alpha multiplier.
    pub a_mult: i16,
    /// Added to red.
    pub r_add: i16,
    /// Added to green.
    pub g_add: i16,
    /// Added to blue.
    pub b_add: i16,
    /// Added to alpha.
    pub a_add: i16,
}

impl Default for ColorTransform {
    fn default() -> Self {
        ColorTransform {
            r_mult: 256,
            g_mult: 256,
            b_mult: 256,
            a_mult: 256,
            r_add: 0,
            g_add: 0,
            b_add: 0,
            a_add: 0,
        }
    }
}

impl ColorTransform {
    /// CXFORM, as found in PlaceObject and DefineButtonCxform.
    pub fn read_rgb(stream: &mut SwfStream) -> Result<ColorTransform> {
        Self::read_fields(stream, false)
    }

    /// CXFORMWITHALPHA, as found in DefineButton2 records.
    pub fn read_rgba(stream: &mut SwfStream) -> Result<ColorTransform> {
        Self::read_fields(stream, true)
    }

    fn read_fields(stream: &mut SwfStream, with_alpha: bool) -> Result<ColorTransform> {
        stream.align();
        stream.ensure_bits(6)?;
        let has_add = stream.read_bit()?;
        let has_mult = stream.read_bit()?;
        let nbits = stream.read_uint(4)?;
        let channels = if with_alpha { 4 } else { 3 };
        let wanted = channels * nbits as usize * (has_add as usize + has_mult as usize);
        stream.ensure_bits(wanted)?;

        let mut cx = ColorTransform::default();
        if has_mult {
            cx.r_mult = stream.read_sint(nbits)? as i16;
            cx.g_mult = stream.read_sint(nbits)? as i16;
            cx.b_mult = stream.read_sint(nbits)? as i16;
            if with_alpha {
                cx.a_mult = stream.read_sint(nbits)? as i16;
            }
        }
        if has_add {
            cx.r_add = stream.read_sint(nbits)? as i16;
            cx.g_add = stream.read_sint(nbits)? as i16;
            cx.b_add = stream.read_sint(nbits)? as i16;
            if with_alpha {
                cx.a_add = stream.read_sint(nbits)? as i16;
            }
        }
        stream.align();
        Ok(cx)
    }

    /// Applies the transform to a colour, clamping each channel.
    pub fn transform(&self, color: Rgba) -> Rgba {
        fn apply(channel: u8, mult: i16, add: i16) -> u8 {
            let value = (channel as i32 * mult as i32) / 256 + add as i32;
            value.clamp(0, 255) as u8
        }
        Rgba::new(
            apply(color.r, self.r_mult, self.r_add),
            apply(color.g, self.g_mult, self.g_add),
            apply(color.b, self.b_mult, self.b_add),
            apply(color.a, self.a_mult, self.a_add),
        )
    }
}
