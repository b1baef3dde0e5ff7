//! DefineMorphShape and DefineMorphShape2.
//!
//! A morph is two outlines with identical topology plus paired styles.
//! Nothing is interpolated here; the ratio is applied at instantiation.

use crate::error::{Error, Result};
use crate::geometry::{Matrix, Rect, Rgba};
use crate::movie::CharacterId;
use crate::shape::{
    CapStyle, FillStyle, Gradient, GradientRecord, InterpolationMode, JoinStyle, LineStyle,
    ShapeDef, SpreadMode,
};
use crate::stream::SwfStream;

/// A fill style at both ends of the morph.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphFillStyle {
    /// Fill at ratio 0.
    pub start: FillStyle,
    /// Fill at ratio 65535.
    pub end: FillStyle,
}

/// A line style at both ends of the morph.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphLineStyle {
    /// Line at ratio 0.
    pub start: LineStyle,
    /// Line at ratio 65535.
    pub end: LineStyle,
}

/// A morph shape character.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphShapeDef {
    /// Bounds at ratio 0.
    pub start_bounds: Rect,
    /// Bounds at ratio 65535.
    pub end_bounds: Rect,
    /// Bounds without strokes at ratio 0, DefineMorphShape2 only.
    pub start_edge_bounds: Option<Rect>,
    /// Bounds without strokes at ratio 65535, DefineMorphShape2 only.
    pub end_edge_bounds: Option<Rect>,
    /// Some strokes don't scale with the shape.
    pub uses_non_scaling_strokes: bool,
    /// Some strokes scale with the shape.
    pub uses_scaling_strokes: bool,
    /// Paired fill styles.
    pub fill_styles: Vec<MorphFillStyle>,
    /// Paired line styles.
    pub line_styles: Vec<MorphLineStyle>,
    /// Start outline.
    pub shape1: ShapeDef,
    /// End outline, with the same edge topology as `shape1`.
    pub shape2: ShapeDef,
}

impl MorphShapeDef {
    /// Reads the tag body after the character id. `version` is 1 for
    /// DefineMorphShape and 2 for DefineMorphShape2.
    pub fn read(stream: &mut SwfStream, version: u8) -> Result<MorphShapeDef> {
        let start_bounds = Rect::read(stream)?;
        let end_bounds = Rect::read(stream)?;

        let mut start_edge_bounds = None;
        let mut end_edge_bounds = None;
        let mut uses_non_scaling_strokes = false;
        let mut uses_scaling_strokes = false;
        if version >= 2 {
            start_edge_bounds = Some(Rect::read(stream)?);
            end_edge_bounds = Some(Rect::read(stream)?);
            stream.ensure_bytes(1)?;
            let flags = stream.read_u8()?;
            uses_non_scaling_strokes = flags & 0x02 != 0;
            uses_scaling_strokes = flags & 0x01 != 0;
        }

        stream.ensure_bytes(4)?;
        let offset = stream.read_u32()? as usize;
        let end_edges_pos = stream.tell() + offset;

        let fill_count = read_count(stream)?;
        let mut fill_styles = Vec::with_capacity(fill_count);
        for _ in 0..fill_count {
            fill_styles.push(read_morph_fill_style(stream, version)?);
        }

        let line_count = read_count(stream)?;
        let mut line_styles = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            line_styles.push(read_morph_line_style(stream, version)?);
        }

        let shape1 = ShapeDef::read_morph_edges(stream)?;

        if offset != 0 && stream.tell() != end_edges_pos {
            malformed!(
                "Morph shape end edges expected at offset {}, start edges ended at {}",
                end_edges_pos,
                stream.tell()
            );
            if !stream.seek(end_edges_pos) {
                return Err(Error::corrupted("Morph shape end edges offset out of bounds"));
            }
        }
        let shape2 = ShapeDef::read_morph_edges(stream)?;

        if shape1.edge_count() != shape2.edge_count() {
            malformed!(
                "Morph shape start has {} edges but end has {}",
                shape1.edge_count(),
                shape2.edge_count()
            );
        }

        Ok(MorphShapeDef {
            start_bounds,
            end_bounds,
            start_edge_bounds,
            end_edge_bounds,
            uses_non_scaling_strokes,
            uses_scaling_strokes,
            fill_styles,
            line_styles,
            shape1,
            shape2,
        })
    }

    /// Area covered at any ratio.
    pub fn bounds(&self) -> Rect {
        self.start_bounds.union(&self.end_bounds)
    }
}

fn read_count(stream: &mut SwfStream) -> Result<usize> {
    stream.ensure_bytes(1)?;
    let count = stream.read_u8()?;
    if count == 0xFF {
        stream.ensure_bytes(2)?;
        return Ok(stream.read_u16()? as usize);
    }
    Ok(count as usize)
}

fn read_morph_gradient(stream: &mut SwfStream) -> Result<(Gradient, Gradient)> {
    let start_matrix = Matrix::read(stream)?;
    let end_matrix = Matrix::read(stream)?;
    stream.ensure_bytes(1)?;
    let flags = stream.read_u8()?;
    let spread = match flags >> 6 {
        1 => SpreadMode::Reflect,
        2 => SpreadMode::Repeat,
        _ => SpreadMode::Pad,
    };
    let interpolation = match (flags >> 4) & 0x03 {
        1 => InterpolationMode::Linear,
        _ => InterpolationMode::Normal,
    };
    let count = (flags & 0x0F) as usize;
    let mut start_records = Vec::with_capacity(count);
    let mut end_records = Vec::with_capacity(count);
    for _ in 0..count {
        stream.ensure_bytes(10)?;
        let ratio = stream.read_u8()?;
        let color = Rgba::read_rgba(stream)?;
        start_records.push(GradientRecord { ratio, color });
        let ratio = stream.read_u8()?;
        let color = Rgba::read_rgba(stream)?;
        end_records.push(GradientRecord { ratio, color });
    }
    Ok((
        Gradient {
            matrix: start_matrix,
            spread,
            interpolation,
            records: start_records,
        },
        Gradient {
            matrix: end_matrix,
            spread,
            interpolation,
            records: end_records,
        },
    ))
}

fn read_morph_fill_style(stream: &mut SwfStream, version: u8) -> Result<MorphFillStyle> {
    stream.ensure_bytes(1)?;
    let kind = stream.read_u8()?;
    let (start, end) = match kind {
        0x00 => (
            FillStyle::Solid(Rgba::read_rgba(stream)?),
            FillStyle::Solid(Rgba::read_rgba(stream)?),
        ),
        0x10 => {
            let (start, end) = read_morph_gradient(stream)?;
            (FillStyle::LinearGradient(start), FillStyle::LinearGradient(end))
        }
        0x12 => {
            let (start, end) = read_morph_gradient(stream)?;
            (FillStyle::RadialGradient(start), FillStyle::RadialGradient(end))
        }
        0x13 if version >= 2 => {
            let (start, end) = read_morph_gradient(stream)?;
            stream.ensure_bytes(4)?;
            let start_focal = stream.read_short_sfixed()?;
            let end_focal = stream.read_short_sfixed()?;
            (
                FillStyle::FocalGradient {
                    gradient: start,
                    focal_point: start_focal,
                },
                FillStyle::FocalGradient {
                    gradient: end,
                    focal_point: end_focal,
                },
            )
        }
        0x40..=0x43 => {
            stream.ensure_bytes(2)?;
            let id = CharacterId(stream.read_u16()?);
            let start_matrix = Matrix::read(stream)?;
            let end_matrix = Matrix::read(stream)?;
            let repeating = kind & 0x01 == 0;
            let smoothed = kind & 0x02 == 0;
            (
                FillStyle::Bitmap {
                    id,
                    matrix: start_matrix,
                    repeating,
                    smoothed,
                },
                FillStyle::Bitmap {
                    id,
                    matrix: end_matrix,
                    repeating,
                    smoothed,
                },
            )
        }
        other => {
            return Err(Error::corrupted(format!(
                "unknown morph fill style type {:#x}",
                other
            )))
        }
    };
    Ok(MorphFillStyle { start, end })
}

fn read_morph_line_style(stream: &mut SwfStream, version: u8) -> Result<MorphLineStyle> {
    stream.ensure_bytes(4)?;
    let start_width = stream.read_u16()?;
    let end_width = stream.read_u16()?;

    if version < 2 {
        let start_color = Rgba::read_rgba(stream)?;
        let end_color = Rgba::read_rgba(stream)?;
        return Ok(MorphLineStyle {
            start: plain_line(start_width, start_color),
            end: plain_line(end_width, end_color),
        });
    }

    stream.ensure_bytes(2)?;
    let start_cap = cap_from_bits(stream.read_uint(2)?);
    let join_bits = stream.read_uint(2)?;
    let has_fill = stream.read_bit()?;
    let no_hscale = stream.read_bit()?;
    let no_vscale = stream.read_bit()?;
    let pixel_hinting = stream.read_bit()?;
    stream.read_uint(5)?;
    let no_close = stream.read_bit()?;
    let end_cap = cap_from_bits(stream.read_uint(2)?);
    let join = match join_bits {
        1 => JoinStyle::Bevel,
        2 => {
            stream.ensure_bytes(2)?;
            JoinStyle::Miter(stream.read_short_ufixed()?)
        }
        _ => JoinStyle::Round,
    };

    let (start_color, end_color, start_fill, end_fill) = if has_fill {
        let fill = read_morph_fill_style(stream, version)?;
        (Rgba::default(), Rgba::default(), Some(fill.start), Some(fill.end))
    } else {
        (Rgba::read_rgba(stream)?, Rgba::read_rgba(stream)?, None, None)
    };

    let line = |width, color, fill| LineStyle {
        width,
        color,
        start_cap,
        end_cap,
        join,
        scale_horizontally: !no_hscale,
        scale_vertically: !no_vscale,
        pixel_hinting,
        no_close,
        fill,
    };
    Ok(MorphLineStyle {
        start: line(start_width, start_color, start_fill),
        end: line(end_width, end_color, end_fill),
    })
}

fn plain_line(width: u16, color: Rgba) -> LineStyle {
    LineStyle {
        width,
        color,
        start_cap: CapStyle::Round,
        end_cap: CapStyle::Round,
        join: JoinStyle::Round,
        scale_horizontally: true,
        scale_vertically: true,
        pixel_hinting: false,
        no_close: false,
        fill: None,
    }
}

fn cap_from_bits(bits: u32) -> CapStyle {
    match bits {
        1 => CapStyle::None,
        2 => CapStyle::Square,
        _ => CapStyle::Round,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{capture_logs, BitWriter};

    fn line_edges(w: &mut BitWriter, dx: i32) {
        w.ubits(4, 1).ubits(4, 1);
        w.bit(false).ubits(5, 0b00010).ubits(1, 1);
        w.bit(true).bit(true).ubits(4, 6).bit(false).bit(false).sbits(8, dx);
        w.bit(false).ubits(5, 0);
        w.align();
    }

    fn morph_tag(offset_fudge: i32) -> Vec<u8> {
        let mut styles = BitWriter::new();
        styles.u8(1).u8(0x00).bytes(&[255, 0, 0, 255]).bytes(&[0, 0, 255, 128]);
        styles.u8(1).u16(20).u16(40).bytes(&[0, 0, 0, 255]).bytes(&[0, 0, 0, 255]);
        line_edges(&mut styles, 50);
        let styles = styles.into_bytes();

        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 50, 0, 0));
        w.rect(&Rect::new(-10, 100, 0, 0));
        w.u32((styles.len() as i32 + offset_fudge) as u32);
        w.bytes(&styles);
        line_edges(&mut w, 100);
        w.into_bytes()
    }

    #[test]
    fn reads_both_keyframes() {
        let bytes = morph_tag(0);
        let mut s = SwfStream::new(&bytes);
        let (morph, logs) = capture_logs(|| MorphShapeDef::read(&mut s, 1).unwrap());
        assert_eq!(logs.malformed(), 0);
        assert_eq!(morph.fill_styles.len(), 1);
        assert_eq!(
            morph.fill_styles[0].end,
            FillStyle::Solid(Rgba::new(0, 0, 255, 128))
        );
        assert_eq!(morph.line_styles[0].end.width, 40);
        assert_eq!(morph.shape1.paths[0].edges[0].anchor.x, 50);
        assert_eq!(morph.shape2.paths[0].edges[0].anchor.x, 100);
        assert_eq!(morph.bounds(), Rect::new(-10, 100, 0, 0));
    }

    #[test]
    fn end_edges_offset_mismatch_is_reported() {
        // Claims the end edges start one byte earlier than they do. The
        // reader jumps back there and reads garbage, but reports it first.
        let bytes = morph_tag(-1);
        let mut s = SwfStream::new(&bytes);
        let (_, logs) = capture_logs(|| MorphShapeDef::read(&mut s, 1));
        assert!(logs.contains("end edges expected"));
    }
}
