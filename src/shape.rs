//! Shape outlines: DefineShape 1-4 and the bare SHAPE records used for font
//! glyphs.
//!
//! Edges are stored with absolute twip coordinates. Style indices in paths are
//! 1-based into the shape's flattened style arrays, with 0 meaning "none";
//! styles introduced mid-shape are appended and the indices that follow them
//! are rebased, so a path never needs to know which style array it came from.

use crate::error::{Error, Result};
use crate::geometry::{Matrix, Rect, Rgba};
use crate::movie::CharacterId;
use crate::stream::SwfStream;

/// A point in twips.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// A point from its coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// A quadratic curve segment. Straight edges have the control point on the
/// anchor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Off-curve control point.
    pub control: Point,
    /// End point.
    pub anchor: Point,
}

impl Edge {
    /// A straight edge to `anchor`.
    pub fn straight(anchor: Point) -> Self {
        Edge {
            control: anchor,
            anchor,
        }
    }

    /// Whether the control point sits on the anchor.
    pub fn is_straight(&self) -> bool {
        self.control == self.anchor
    }
}

/// A run of edges drawn with one set of styles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    /// Where the path starts.
    pub start: Point,
    /// 1-based fill style on the left, 0 for none.
    pub fill0: usize,
    /// 1-based fill style on the right, 0 for none.
    pub fill1: usize,
    /// 1-based line style, 0 for none.
    pub line: usize,
    /// Set on the first path after a NewStyles record.
    pub new_shape: bool,
    /// Edges in drawing order.
    pub edges: Vec<Edge>,
}

impl Path {
    fn continue_from(&self, start: Point) -> Path {
        Path {
            start,
            fill0: self.fill0,
            fill1: self.fill1,
            line: self.line,
            new_shape: false,
            edges: Vec::new(),
        }
    }

    /// Whether the path has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// How a gradient fills beyond its ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpreadMode {
    /// Extend the end colours.
    Pad,
    /// Mirror the gradient.
    Reflect,
    /// Repeat the gradient.
    Repeat,
}

/// Colour space gradients are interpolated in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterpolationMode {
    /// sRGB.
    Normal,
    /// Linear RGB.
    Linear,
}

/// A gradient stop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GradientRecord {
    /// Position, 0 to 255.
    pub ratio: u8,
    /// Colour at that position.
    pub color: Rgba,
}

/// A gradient: stops plus the transform from the gradient square.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    /// Maps the 32768 twip gradient square into the shape.
    pub matrix: Matrix,
    /// Spread mode, SWF 8.
    pub spread: SpreadMode,
    /// Interpolation mode, SWF 8.
    pub interpolation: InterpolationMode,
    /// Stops in ratio order.
    pub records: Vec<GradientRecord>,
}

/// How an area is painted.
#[derive(Clone, Debug, PartialEq)]
pub enum FillStyle {
    /// A flat colour.
    Solid(Rgba),
    /// A linear gradient.
    LinearGradient(Gradient),
    /// A radial gradient.
    RadialGradient(Gradient),
    /// A radial gradient with its focal point moved, DefineShape4.
    FocalGradient {
        /// The gradient.
        gradient: Gradient,
        /// Focal point from -1 to 1 along the x axis.
        focal_point: f32,
    },
    /// A bitmap fill.
    Bitmap {
        /// The bitmap character.
        id: CharacterId,
        /// Maps bitmap pixels into the shape, in twentieths.
        matrix: Matrix,
        /// Tile instead of clamping.
        repeating: bool,
        /// Smooth when scaled.
        smoothed: bool,
    },
}

/// Shape of a stroke's ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CapStyle {
    /// Round caps.
    Round,
    /// No caps.
    None,
    /// Square caps.
    Square,
}

impl CapStyle {
    fn from_bits(bits: u32) -> CapStyle {
        match bits {
            1 => CapStyle::None,
            2 => CapStyle::Square,
            _ => CapStyle::Round,
        }
    }
}

/// Shape of a stroke's corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum JoinStyle {
    /// Round joins.
    Round,
    /// Bevelled joins.
    Bevel,
    /// Mitred joins with the given limit factor.
    Miter(f32),
}

/// How an edge is stroked.
#[derive(Clone, Debug, PartialEq)]
pub struct LineStyle {
    /// Width in twips.
    pub width: u16,
    /// Stroke colour. Unused when `fill` is set.
    pub color: Rgba,
    /// Cap at the start of a path.
    pub start_cap: CapStyle,
    /// Cap at the end of a path.
    pub end_cap: CapStyle,
    /// Corner style.
    pub join: JoinStyle,
    /// Width scales with the horizontal scale.
    pub scale_horizontally: bool,
    /// Width scales with the vertical scale.
    pub scale_vertically: bool,
    /// Snap to whole pixels.
    pub pixel_hinting: bool,
    /// Don't close paths that end where they start.
    pub no_close: bool,
    /// LINESTYLE2 strokes may be painted with a fill instead of a colour.
    pub fill: Option<FillStyle>,
}

impl LineStyle {
    fn simple(width: u16, color: Rgba) -> LineStyle {
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
}

/// A shape character or glyph outline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeDef {
    /// Bounds including stroke widths.
    pub bounds: Rect,
    /// DefineShape4 only: bounds without stroke widths.
    pub edge_bounds: Option<Rect>,
    /// DefineShape4 winding rule flag; even-odd otherwise.
    pub uses_fill_winding_rule: bool,
    /// Some strokes don't scale with the shape.
    pub uses_non_scaling_strokes: bool,
    /// Some strokes scale with the shape.
    pub uses_scaling_strokes: bool,
    /// Fill styles, all of them, across NewStyles records.
    pub fill_styles: Vec<FillStyle>,
    /// Line styles, likewise.
    pub line_styles: Vec<LineStyle>,
    /// The outline.
    pub paths: Vec<Path>,
}

impl ShapeDef {
    /// Reads a DefineShape body after the character id. `version` is 1 to 4
    /// for DefineShape to DefineShape4.
    pub fn read(stream: &mut SwfStream, version: u8) -> Result<ShapeDef> {
        let mut shape = ShapeDef {
            bounds: Rect::read(stream)?,
            ..ShapeDef::default()
        };
        if version >= 4 {
            shape.edge_bounds = Some(Rect::read(stream)?);
            stream.ensure_bytes(1)?;
            let flags = stream.read_u8()?;
            shape.uses_fill_winding_rule = flags & 0x04 != 0;
            shape.uses_non_scaling_strokes = flags & 0x02 != 0;
            shape.uses_scaling_strokes = flags & 0x01 != 0;
        }
        read_fill_styles(stream, version, &mut shape.fill_styles)?;
        read_line_styles(stream, version, &mut shape.line_styles)?;
        shape.read_records(stream, version, true)?;
        Ok(shape)
    }

    /// Reads a font glyph: a SHAPE without style arrays. Bounds are computed
    /// from the outline since glyph records don't carry them.
    pub fn read_glyph(stream: &mut SwfStream) -> Result<ShapeDef> {
        let mut shape = ShapeDef::default();
        shape.read_records(stream, 1, false)?;
        shape.bounds = shape.compute_bounds();
        Ok(shape)
    }

    /// Reads the edge records of one half of a morph shape. Styles live in
    /// the morph definition, so indices aren't checked against this shape.
    pub(crate) fn read_morph_edges(stream: &mut SwfStream) -> Result<ShapeDef> {
        let mut shape = ShapeDef::default();
        shape.read_records(stream, 1, false)?;
        Ok(shape)
    }

    fn read_records(&mut self, stream: &mut SwfStream, version: u8, with_styles: bool) -> Result<()> {
        stream.align();
        stream.ensure_bits(8)?;
        let mut fill_bits = stream.read_uint(4)?;
        let mut line_bits = stream.read_uint(4)?;
        let mut fill_base = 0;
        let mut line_base = 0;
        let mut pen = Point::default();
        let mut current = Path::default();

        loop {
            let is_edge = stream.read_bit()?;
            if !is_edge {
                let flags = stream.read_uint(5)?;
                if flags == 0 {
                    break;
                }
                let new_styles = flags & 0x10 != 0;
                let change_line = flags & 0x08 != 0;
                let change_fill1 = flags & 0x04 != 0;
                let change_fill0 = flags & 0x02 != 0;
                let move_to = flags & 0x01 != 0;

                if !current.is_empty() {
                    let next = current.continue_from(pen);
                    self.paths.push(std::mem::replace(&mut current, next));
                }

                if move_to {
                    let nbits = stream.read_uint(5)?;
                    pen.x = stream.read_sint(nbits)?;
                    pen.y = stream.read_sint(nbits)?;
                    current.start = pen;
                }
                let fill0 = if change_fill0 {
                    Some(stream.read_uint(fill_bits)? as usize)
                } else {
                    None
                };
                let fill1 = if change_fill1 {
                    Some(stream.read_uint(fill_bits)? as usize)
                } else {
                    None
                };
                let line = if change_line {
                    Some(stream.read_uint(line_bits)? as usize)
                } else {
                    None
                };

                // Indices given alongside new style arrays refer to the new
                // arrays.
                if new_styles && with_styles && version >= 2 {
                    fill_base = self.fill_styles.len();
                    line_base = self.line_styles.len();
                    read_fill_styles(stream, version, &mut self.fill_styles)?;
                    read_line_styles(stream, version, &mut self.line_styles)?;
                    stream.ensure_bits(8)?;
                    fill_bits = stream.read_uint(4)?;
                    line_bits = stream.read_uint(4)?;
                    current = Path {
                        start: pen,
                        new_shape: true,
                        ..Path::default()
                    };
                } else if new_styles {
                    malformed!("NewStyles record in a shape that can't carry styles");
                }

                if let Some(index) = fill0 {
                    current.fill0 = self.style_index(index, fill_base, with_styles, true);
                }
                if let Some(index) = fill1 {
                    current.fill1 = self.style_index(index, fill_base, with_styles, true);
                }
                if let Some(index) = line {
                    current.line = self.style_index(index, line_base, with_styles, false);
                }
            } else {
                let straight = stream.read_bit()?;
                let nbits = stream.read_uint(4)? + 2;
                if straight {
                    let (dx, dy) = if stream.read_bit()? {
                        (stream.read_sint(nbits)?, stream.read_sint(nbits)?)
                    } else if stream.read_bit()? {
                        (0, stream.read_sint(nbits)?)
                    } else {
                        (stream.read_sint(nbits)?, 0)
                    };
                    pen.x += dx;
                    pen.y += dy;
                    current.edges.push(Edge::straight(pen));
                } else {
                    let cx = pen.x + stream.read_sint(nbits)?;
                    let cy = pen.y + stream.read_sint(nbits)?;
                    pen.x = cx + stream.read_sint(nbits)?;
                    pen.y = cy + stream.read_sint(nbits)?;
                    current.edges.push(Edge {
                        control: Point::new(cx, cy),
                        anchor: pen,
                    });
                }
            }
        }
        if !current.is_empty() {
            self.paths.push(current);
        }
        stream.align();
        Ok(())
    }

    fn style_index(&self, index: usize, base: usize, checked: bool, fill: bool) -> usize {
        if index == 0 {
            return 0;
        }
        let index = index + base;
        if checked {
            let available = if fill {
                self.fill_styles.len()
            } else {
                self.line_styles.len()
            };
            if index > available {
                malformed!(
                    "Invalid {} style index {} in shape record ({} styles defined)",
                    if fill { "fill" } else { "line" },
                    index,
                    available
                );
                return 0;
            }
        }
        index
    }

    /// Bounds of all path points, controls included.
    pub fn compute_bounds(&self) -> Rect {
        let mut points = self.paths.iter().flat_map(|path| {
            std::iter::once(path.start).chain(
                path.edges
                    .iter()
                    .flat_map(|e| std::iter::once(e.control).chain(std::iter::once(e.anchor))),
            )
        });
        let first = match points.next() {
            Some(p) => p,
            None => return Rect::default(),
        };
        let mut bounds = Rect::new(first.x, first.x, first.y, first.y);
        for p in points {
            bounds.expand_to(p.x, p.y);
        }
        bounds
    }

    /// Total number of edges over all paths.
    pub fn edge_count(&self) -> usize {
        self.paths.iter().map(|p| p.edges.len()).sum()
    }
}

fn read_style_count(stream: &mut SwfStream, extended: bool) -> Result<usize> {
    stream.ensure_bytes(1)?;
    let count = stream.read_u8()?;
    if count == 0xFF && extended {
        stream.ensure_bytes(2)?;
        return Ok(stream.read_u16()? as usize);
    }
    Ok(count as usize)
}

fn read_color(stream: &mut SwfStream, with_alpha: bool) -> Result<Rgba> {
    if with_alpha {
        Rgba::read_rgba(stream)
    } else {
        Rgba::read_rgb(stream)
    }
}

pub(crate) fn read_fill_styles(
    stream: &mut SwfStream,
    version: u8,
    out: &mut Vec<FillStyle>,
) -> Result<()> {
    let count = read_style_count(stream, version >= 2)?;
    out.reserve(count);
    for _ in 0..count {
        out.push(read_fill_style(stream, version)?);
    }
    Ok(())
}

pub(crate) fn read_fill_style(stream: &mut SwfStream, version: u8) -> Result<FillStyle> {
    stream.ensure_bytes(1)?;
    let kind = stream.read_u8()?;
    let style = match kind {
        0x00 => FillStyle::Solid(read_color(stream, version >= 3)?),
        0x10 => FillStyle::LinearGradient(read_gradient(stream, version)?),
        0x12 => FillStyle::RadialGradient(read_gradient(stream, version)?),
        0x13 => {
            let gradient = read_gradient(stream, version)?;
            stream.ensure_bytes(2)?;
            let focal_point = stream.read_short_sfixed()?;
            FillStyle::FocalGradient {
                gradient,
                focal_point,
            }
        }
        0x40..=0x43 => {
            stream.ensure_bytes(2)?;
            let id = CharacterId(stream.read_u16()?);
            let matrix = Matrix::read(stream)?;
            FillStyle::Bitmap {
                id,
                matrix,
                repeating: kind & 0x01 == 0,
                smoothed: kind & 0x02 == 0,
            }
        }
        other => {
            malformed!("Unknown fill style type {:#x}", other);
            return Err(Error::corrupted(format!(
                "unknown fill style type {:#x}",
                other
            )));
        }
    };
    Ok(style)
}

fn read_gradient(stream: &mut SwfStream, version: u8) -> Result<Gradient> {
    let matrix = Matrix::read(stream)?;
    stream.ensure_bytes(1)?;
    let spread = match stream.read_uint(2)? {
        1 => SpreadMode::Reflect,
        2 => SpreadMode::Repeat,
        0 => SpreadMode::Pad,
        _ => {
            malformed!("Illegal gradient spread mode, treating as pad");
            SpreadMode::Pad
        }
    };
    let interpolation = match stream.read_uint(2)? {
        1 => InterpolationMode::Linear,
        _ => InterpolationMode::Normal,
    };
    let count = stream.read_uint(4)?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        stream.ensure_bytes(1)?;
        let ratio = stream.read_u8()?;
        let color = read_color(stream, version >= 3)?;
        records.push(GradientRecord { ratio, color });
    }
    Ok(Gradient {
        matrix,
        spread,
        interpolation,
        records,
    })
}

pub(crate) fn read_line_styles(
    stream: &mut SwfStream,
    version: u8,
    out: &mut Vec<LineStyle>,
) -> Result<()> {
    let count = read_style_count(stream, true)?;
    out.reserve(count);
    for _ in 0..count {
        out.push(read_line_style(stream, version)?);
    }
    Ok(())
}

fn read_line_style(stream: &mut SwfStream, version: u8) -> Result<LineStyle> {
    stream.ensure_bytes(2)?;
    let width = stream.read_u16()?;
    if version < 4 {
        let color = read_color(stream, version >= 3)?;
        return Ok(LineStyle::simple(width, color));
    }

    stream.ensure_bytes(2)?;
    let start_cap = CapStyle::from_bits(stream.read_uint(2)?);
    let join_bits = stream.read_uint(2)?;
    let has_fill = stream.read_bit()?;
    let no_hscale = stream.read_bit()?;
    let no_vscale = stream.read_bit()?;
    let pixel_hinting = stream.read_bit()?;
    stream.read_uint(5)?;
    let no_close = stream.read_bit()?;
    let end_cap = CapStyle::from_bits(stream.read_uint(2)?);

    let join = match join_bits {
        1 => JoinStyle::Bevel,
        2 => {
            stream.ensure_bytes(2)?;
            JoinStyle::Miter(stream.read_short_ufixed()?)
        }
        _ => JoinStyle::Round,
    };

    let (color, fill) = if has_fill {
        (Rgba::default(), Some(read_fill_style(stream, version)?))
    } else {
        (Rgba::read_rgba(stream)?, None)
    };

    Ok(LineStyle {
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
    })
}
