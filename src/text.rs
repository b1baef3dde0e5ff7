//! Static text (DefineText, DefineText2) and text field templates
//! (DefineEditText).

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::font::Font;
use crate::fontlib;
use crate::geometry::{Matrix, Rect, Rgba};
use crate::movie::CharacterId;
use crate::stream::SwfStream;
use crate::tag::TagType;

/// Looks a font up by id when a text field first needs it.
pub type FontResolver = Arc<dyn Fn(CharacterId) -> Option<Arc<Font>> + Send + Sync>;

/// One glyph of a text record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlyphEntry {
    /// Glyph index in the record's font.
    pub index: u32,
    /// Advance to the next glyph, in twips.
    pub advance: i32,
}

/// Style in effect for a run of glyphs. Font, colour and height carry over
/// from earlier records; offsets only apply to the record that set them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextStyle {
    /// Font character id.
    pub font_id: Option<CharacterId>,
    /// Text colour. DefineText colours are opaque.
    pub color: Rgba,
    /// Horizontal position in twips.
    pub x_offset: Option<i16>,
    /// Vertical position (baseline) in twips.
    pub y_offset: Option<i16>,
    /// Font height in twips.
    pub height: u16,
}

/// A run of glyphs in one style.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRecord {
    /// Style in effect for this run.
    pub style: TextStyle,
    /// The glyphs.
    pub glyphs: Vec<GlyphEntry>,
}

/// A static text character.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextDef {
    /// Bounds in twips.
    pub bounds: Rect,
    /// Transform applied to the records.
    pub matrix: Matrix,
    /// Text records in tag order.
    pub records: Vec<TextRecord>,
}

impl TextDef {
    /// Reads a DefineText or DefineText2 body, after the character id.
    pub fn read(stream: &mut SwfStream, tag: TagType) -> Result<TextDef> {
        debug_assert!(tag == TagType::DEFINE_TEXT || tag == TagType::DEFINE_TEXT2);

        let bounds = Rect::read(stream)?;
        let matrix = Matrix::read(stream)?;

        stream.ensure_bytes(2)?;
        let glyph_bits = stream.read_u8()? as u32;
        let advance_bits = stream.read_u8()? as u32;

        parse_trace!("begin text records");

        let mut records = Vec::new();
        let mut style = TextStyle::default();
        loop {
            stream.ensure_bytes(1)?;
            let flags = stream.read_u8()?;
            if flags == 0 {
                parse_trace!("end text records");
                break;
            }
            if flags & 0x80 == 0 {
                malformed!("text record type bit not set (flags {:#04x})", flags);
            }

            let has_font = flags & 0x08 != 0;
            let has_color = flags & 0x04 != 0;
            let has_y_offset = flags & 0x02 != 0;
            let has_x_offset = flags & 0x01 != 0;

            if has_font {
                stream.ensure_bytes(2)?;
                style.font_id = Some(CharacterId(stream.read_u16()?));
            }
            if has_color {
                style.color = if tag == TagType::DEFINE_TEXT {
                    Rgba::read_rgb(stream)?
                } else {
                    Rgba::read_rgba(stream)?
                };
            }
            style.x_offset = None;
            if has_x_offset {
                stream.ensure_bytes(2)?;
                style.x_offset = Some(stream.read_s16()?);
            }
            style.y_offset = None;
            if has_y_offset {
                stream.ensure_bytes(2)?;
                style.y_offset = Some(stream.read_s16()?);
            }
            if has_font {
                stream.ensure_bytes(2)?;
                style.height = stream.read_u16()?;
            }

            stream.ensure_bytes(1)?;
            let count = stream.read_u8()? as usize;
            stream.ensure_bits(count * (glyph_bits + advance_bits) as usize)?;
            let mut glyphs = Vec::with_capacity(count);
            for _ in 0..count {
                let index = stream.read_uint(glyph_bits)?;
                let advance = stream.read_sint(advance_bits)?;
                glyphs.push(GlyphEntry { index, advance });
            }
            stream.align();

            parse_trace!("  glyph record: font = {:?}, count = {}", style.font_id, count);
            records.push(TextRecord { style, glyphs });
        }

        Ok(TextDef {
            bounds,
            matrix,
            records,
        })
    }

    /// Total glyphs over all records.
    pub fn glyph_count(&self) -> usize {
        self.records.iter().map(|r| r.glyphs.len()).sum()
    }
}

/// Paragraph alignment of an edit text field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Flush left.
    #[default]
    Left,
    /// Flush right.
    Right,
    /// Centred.
    Center,
    /// Justified.
    Justify,
}

impl Alignment {
    fn from_u8(value: u8) -> Alignment {
        match value {
            0 => Alignment::Left,
            1 => Alignment::Right,
            2 => Alignment::Center,
            3 => Alignment::Justify,
            other => {
                malformed!("Unknown text alignment {}", other);
                Alignment::Left
            }
        }
    }
}

/// Template for a text field.
///
/// Fields read from a DefineEditText tag are never changed afterwards. The
/// setters exist for fields created at runtime, which start from
/// `EditTextDef::dynamic`.
#[derive(Clone)]
pub struct EditTextDef {
    bounds: Rect,
    variable_name: String,
    default_text: Option<String>,

    font_id: Option<CharacterId>,
    font_class: Option<String>,
    text_height: u16,
    color: Rgba,
    max_chars: Option<u16>,

    alignment: Alignment,
    left_margin: u16,
    right_margin: u16,
    indent: u16,
    leading: i16,

    word_wrap: bool,
    multiline: bool,
    password: bool,
    read_only: bool,
    auto_size: bool,
    no_select: bool,
    border: bool,
    was_static: bool,
    html: bool,
    use_outlines: bool,

    resolver: Option<FontResolver>,
    font: OnceLock<Arc<Font>>,
}

impl EditTextDef {
    /// A blank field for runtime creation. Default height is 12pt.
    pub fn dynamic(bounds: Rect) -> EditTextDef {
        EditTextDef {
            bounds,
            variable_name: String::new(),
            default_text: None,
            font_id: None,
            font_class: None,
            text_height: 12 * 20,
            color: Rgba::default(),
            max_chars: None,
            alignment: Alignment::default(),
            left_margin: 0,
            right_margin: 0,
            indent: 0,
            leading: 0,
            word_wrap: false,
            multiline: false,
            password: false,
            read_only: false,
            auto_size: false,
            no_select: false,
            border: false,
            was_static: false,
            html: false,
            use_outlines: false,
            resolver: None,
            font: OnceLock::new(),
        }
    }

    /// Reads a DefineEditText body, after the character id. The font is
    /// looked up through `resolver` on the first `get_font` call, since the
    /// font tag may come later in the stream.
    pub fn read(stream: &mut SwfStream, resolver: FontResolver) -> Result<EditTextDef> {
        let mut def = EditTextDef::dynamic(Rect::read(stream)?);
        def.resolver = Some(resolver);

        stream.ensure_bytes(2)?;
        let flags = stream.read_u8()?;
        let has_text = flags & 0x80 != 0;
        def.word_wrap = flags & 0x40 != 0;
        def.multiline = flags & 0x20 != 0;
        def.password = flags & 0x10 != 0;
        def.read_only = flags & 0x08 != 0;
        let has_color = flags & 0x04 != 0;
        let has_max_chars = flags & 0x02 != 0;
        let has_font = flags & 0x01 != 0;

        let flags = stream.read_u8()?;
        let mut has_font_class = flags & 0x80 != 0;
        def.auto_size = flags & 0x40 != 0;
        let has_layout = flags & 0x20 != 0;
        def.no_select = flags & 0x10 != 0;
        def.border = flags & 0x08 != 0;
        def.was_static = flags & 0x04 != 0;
        def.html = flags & 0x02 != 0;
        def.use_outlines = flags & 0x01 != 0;

        if has_font && has_font_class {
            malformed!("DefineEditText: hasFontClass can't be true if hasFont is true, ignoring");
            has_font_class = false;
        }

        if has_font {
            stream.ensure_bytes(4)?;
            def.font_id = Some(CharacterId(stream.read_u16()?));
            def.text_height = stream.read_u16()?;
        } else if has_font_class {
            let class_name = stream.read_string()?;
            unimplemented_once!("Font class support for DefineEditText ({})", class_name);
            def.font_class = Some(class_name);
            stream.ensure_bytes(2)?;
            def.text_height = stream.read_u16()?;
        }

        if has_color {
            def.color = Rgba::read_rgba(stream)?;
        }

        if has_max_chars {
            stream.ensure_bytes(2)?;
            def.max_chars = Some(stream.read_u16()?);
        }

        if has_layout {
            stream.ensure_bytes(9)?;
            def.alignment = Alignment::from_u8(stream.read_u8()?);
            def.left_margin = stream.read_u16()?;
            def.right_margin = stream.read_u16()?;
            def.indent = stream.read_u16()?;
            def.leading = stream.read_s16()?;
        }

        def.variable_name = stream.read_string()?;

        if has_text {
            def.default_text = Some(stream.read_string()?);
        }

        parse_trace!(
            "edit_text_char: varname = {}, text = {:?}, font_id = {:?}, text_height = {}",
            def.variable_name,
            def.default_text,
            def.font_id,
            def.text_height
        );

        Ok(def)
    }

    /// The field's font. Resolved on first use; an unknown id falls back to
    /// the default device font.
    pub fn get_font(&self) -> Arc<Font> {
        self.font
            .get_or_init(|| {
                let resolved = match (self.font_id, &self.resolver) {
                    (Some(id), Some(resolver)) => resolver(id),
                    _ => None,
                };
                resolved.unwrap_or_else(|| {
                    if let Some(id) = self.font_id {
                        log::error!(
                            "EditText: font id {} not found in dictionary, using default font",
                            id
                        );
                    }
                    fontlib::default_font()
                })
            })
            .clone()
    }

    /// Field rectangle in twips.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// ActionScript variable the field is bound to.
    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Initial text.
    pub fn default_text(&self) -> Option<&str> {
        self.default_text.as_deref()
    }

    /// Font character id.
    pub fn font_id(&self) -> Option<CharacterId> {
        self.font_id
    }

    /// Font class name, SWF 9.
    pub fn font_class(&self) -> Option<&str> {
        self.font_class.as_deref()
    }

    /// Font height in twips.
    pub fn text_height(&self) -> u16 {
        self.text_height
    }

    /// Text colour.
    pub fn color(&self) -> Rgba {
        self.color
    }

    /// Character limit.
    pub fn max_chars(&self) -> Option<u16> {
        self.max_chars
    }

    /// Paragraph alignment.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Left margin in twips.
    pub fn left_margin(&self) -> u16 {
        self.left_margin
    }

    /// Right margin in twips.
    pub fn right_margin(&self) -> u16 {
        self.right_margin
    }

    /// First line indent in twips.
    pub fn indent(&self) -> u16 {
        self.indent
    }

    /// Extra line spacing in twips.
    pub fn leading(&self) -> i16 {
        self.leading
    }

    /// Word wrap flag.
    pub fn word_wrap(&self) -> bool {
        self.word_wrap
    }

    /// Multiline flag.
    pub fn multiline(&self) -> bool {
        self.multiline
    }

    /// Password masking flag.
    pub fn password(&self) -> bool {
        self.password
    }

    /// Read-only flag.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Auto size flag.
    pub fn auto_size(&self) -> bool {
        self.auto_size
    }

    /// No-select flag.
    pub fn no_select(&self) -> bool {
        self.no_select
    }

    /// Border flag.
    pub fn border(&self) -> bool {
        self.border
    }

    /// Whether the field was static text in the authoring tool.
    pub fn was_static(&self) -> bool {
        self.was_static
    }

    /// HTML text flag.
    pub fn html(&self) -> bool {
        self.html
    }

    /// Draw with the embedded glyphs rather than a device font.
    pub fn use_outlines(&self) -> bool {
        self.use_outlines
    }

    /// Sets the initial text.
    pub fn set_default_text(&mut self, text: &str) {
        self.default_text = Some(text.to_string());
    }

    /// Sets the ActionScript variable the field is bound to.
    pub fn set_variable_name(&mut self, name: &str) {
        self.variable_name = name.to_string();
    }

    /// Replaces the font, whether or not it was resolved yet.
    pub fn set_font(&mut self, font: Arc<Font>) {
        self.font = OnceLock::from(font);
    }

    /// Sets the font height in twips.
    pub fn set_text_height(&mut self, height: u16) {
        self.text_height = height;
    }

    /// Sets the text colour.
    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    /// Sets the character limit.
    pub fn set_max_chars(&mut self, max_chars: Option<u16>) {
        self.max_chars = max_chars;
    }

    /// Sets the paragraph alignment.
    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    /// Sets the left and right margins in twips.
    pub fn set_margins(&mut self, left: u16, right: u16) {
        self.left_margin = left;
        self.right_margin = right;
    }

    /// Sets the first line indent in twips.
    pub fn set_indent(&mut self, indent: u16) {
        self.indent = indent;
    }

    /// Sets the extra line spacing in twips.
    pub fn set_leading(&mut self, leading: i16) {
        self.leading = leading;
    }

    /// Sets the word wrap flag.
    pub fn set_word_wrap(&mut self, on: bool) {
        self.word_wrap = on;
    }

    /// Sets the multiline flag.
    pub fn set_multiline(&mut self, on: bool) {
        self.multiline = on;
    }

    /// Sets the password masking flag.
    pub fn set_password(&mut self, on: bool) {
        self.password = on;
    }

    /// Sets the read-only flag.
    pub fn set_read_only(&mut self, on: bool) {
        self.read_only = on;
    }

    /// Sets the auto size flag.
    pub fn set_auto_size(&mut self, on: bool) {
        self.auto_size = on;
    }

    /// Sets the no-select flag.
    pub fn set_no_select(&mut self, on: bool) {
        self.no_select = on;
    }

    /// Sets the border flag.
    pub fn set_border(&mut self, on: bool) {
        self.border = on;
    }

    /// Sets the HTML text flag.
    pub fn set_html(&mut self, on: bool) {
        self.html = on;
    }

    /// Sets the embedded outlines flag.
    pub fn set_use_outlines(&mut self, on: bool) {
        self.use_outlines = on;
    }
}

impl fmt::Debug for EditTextDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EditTextDef")
            .field("bounds", &self.bounds)
            .field("variable_name", &self.variable_name)
            .field("default_text", &self.default_text)
            .field("font_id", &self.font_id)
            .field("text_height", &self.text_height)
            .field("font_resolved", &self.font.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_util::{capture_logs, BitWriter};

    fn no_fonts() -> FontResolver {
        Arc::new(|_| None)
    }

    fn read_edit_text(body: &[u8], resolver: FontResolver) -> EditTextDef {
        let mut s = SwfStream::new(body);
        EditTextDef::read(&mut s, resolver).unwrap()
    }

    #[test]
    fn reads_every_optional_section() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 2000, 0, 400));
        w.u8(0x80 | 0x20 | 0x08 | 0x04 | 0x02 | 0x01);
        w.u8(0x20 | 0x08 | 0x02);
        w.u16(3).u16(240);
        w.u8(255).u8(0).u8(0).u8(128);
        w.u16(40);
        w.u8(2).u16(20).u16(40).u16(60).i16(-2);
        w.string("score");
        w.string("hello");
        let def = read_edit_text(&w.into_bytes(), no_fonts());

        assert_eq!(def.bounds(), Rect::new(0, 2000, 0, 400));
        assert!(def.multiline() && def.read_only() && def.border() && def.html());
        assert!(!def.word_wrap() && !def.password() && !def.auto_size());
        assert_eq!(def.font_id(), Some(CharacterId(3)));
        assert_eq!(def.text_height(), 240);
        assert_eq!(def.color(), Rgba::new(255, 0, 0, 128));
        assert_eq!(def.max_chars(), Some(40));
        assert_eq!(def.alignment(), Alignment::Center);
        assert_eq!((def.left_margin(), def.right_margin()), (20, 40));
        assert_eq!(def.indent(), 60);
        assert_eq!(def.leading(), -2);
        assert_eq!(def.variable_name(), "score");
        assert_eq!(def.default_text(), Some("hello"));
    }

    #[test]
    fn font_and_font_class_are_exclusive() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 100, 0, 100));
        w.u8(0x01).u8(0x80);
        // font id and height; no class name follows
        w.u16(7).u16(400);
        w.string("field");
        let body = w.into_bytes();

        let (def, logs) = capture_logs(|| read_edit_text(&body, no_fonts()));
        assert_eq!(logs.malformed(), 1);
        assert_eq!(def.font_id(), Some(CharacterId(7)));
        assert_eq!(def.text_height(), 400);
        assert_eq!(def.font_class(), None);
        assert_eq!(def.variable_name(), "field");
    }

    #[test]
    fn font_class_branch() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 100, 0, 100));
        w.u8(0x00).u8(0x80);
        w.string("MyFont").u16(300);
        w.string("");
        let def = read_edit_text(&w.into_bytes(), no_fonts());
        assert_eq!(def.font_id(), None);
        assert_eq!(def.font_class(), Some("MyFont"));
        assert_eq!(def.text_height(), 300);
        assert_eq!(def.default_text(), None);
    }

    #[test]
    fn font_is_resolved_once_on_first_use() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 100, 0, 100));
        w.u8(0x01).u8(0x00).u16(9).u16(200);
        w.string("v");
        let body = w.into_bytes();

        let calls = Arc::new(AtomicUsize::new(0));
        let font = Arc::new(Font::device("Embedded", false, false, None));
        let resolver: FontResolver = {
            let calls = calls.clone();
            let font = font.clone();
            Arc::new(move |id| {
                calls.fetch_add(1, Ordering::SeqCst);
                if id == CharacterId(9) {
                    Some(font.clone())
                } else {
                    None
                }
            })
        };
        let def = read_edit_text(&body, resolver);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&def.get_font(), &font));
        assert!(Arc::ptr_eq(&def.get_font(), &font));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolved_font_falls_back_to_default() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 100, 0, 100));
        w.u8(0x01).u8(0x00).u16(9).u16(200);
        w.string("v");
        let def = read_edit_text(&w.into_bytes(), no_fonts());
        let (font, logs) = capture_logs(|| def.get_font());
        assert_eq!(font.name(), fontlib::DEFAULT_FONT_NAME);
        assert!(logs.contains("not found in dictionary"));
    }

    #[test]
    fn dynamic_fields_take_setters() {
        let mut def = EditTextDef::dynamic(Rect::new(0, 10, 0, 10));
        assert_eq!(def.alignment(), Alignment::Left);
        def.set_default_text("abc");
        def.set_alignment(Alignment::Right);
        def.set_password(true);
        let font = Arc::new(Font::device("Mono", false, false, None));
        def.set_font(font.clone());
        assert_eq!(def.default_text(), Some("abc"));
        assert_eq!(def.alignment(), Alignment::Right);
        assert!(def.password());
        assert!(Arc::ptr_eq(&def.get_font(), &font));
    }

    #[test]
    fn static_text_records() {
        let mut w = BitWriter::new();
        w.rect(&Rect::new(0, 1000, 0, 200));
        // identity matrix: no scale, no rotate, zero-bit translate
        w.bit(false).bit(false).ubits(5, 0).align();
        w.u8(4).u8(8);
        // style: font 2, colour, x offset, height 240
        w.u8(0x80 | 0x08 | 0x04 | 0x01).u16(2).u8(1).u8(2).u8(3).i16(40).u16(240);
        w.u8(2).ubits(4, 1).sbits(8, 100).ubits(4, 2).sbits(8, -5).align();
        // style: y offset only
        w.u8(0x80 | 0x02).i16(-10);
        w.u8(1).ubits(4, 3).sbits(8, 7).align();
        w.u8(0);
        let bytes = w.into_bytes();
        let mut s = SwfStream::new(&bytes);
        let text = TextDef::read(&mut s, TagType::DEFINE_TEXT).unwrap();

        assert!(text.matrix.is_identity());
        assert_eq!(text.records.len(), 2);
        let first = &text.records[0];
        assert_eq!(first.style.font_id, Some(CharacterId(2)));
        assert_eq!(first.style.color, Rgba::new(1, 2, 3, 255));
        assert_eq!(first.style.x_offset, Some(40));
        assert_eq!(first.style.height, 240);
        assert_eq!(
            first.glyphs,
            vec![
                GlyphEntry { index: 1, advance: 100 },
                GlyphEntry { index: 2, advance: -5 }
            ]
        );
        let second = &text.records[1];
        assert_eq!(second.style.font_id, Some(CharacterId(2)));
        assert_eq!(second.style.x_offset, None);
        assert_eq!(second.style.y_offset, Some(-10));
        assert_eq!(text.glyph_count(), 3);
        assert_eq!(s.tell(), bytes.len());
    }
}
