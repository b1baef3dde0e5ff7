//! Embedded and device fonts.
//!
//! A `Font` is built once by the DefineFont loaders and then shared behind an
//! `Arc`. The embedded tables never change after that. Device glyphs, which
//! come from a system font rasterizer, are fetched on first use and appended
//! to a cache behind a per-font mutex, so lookups from any thread see indices
//! that never move once handed out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::LoaderOptions;
use crate::error::{Error, Result};
use crate::fontlib;
use crate::geometry::Rect;
use crate::shape::ShapeDef;
use crate::stream::SwfStream;
use crate::tag::TagType;

/// Advance reported for a missing glyph, in EM units.
pub const DEFAULT_ADVANCE: f32 = 512.0;

/// EM square of DefineFont and DefineFont2 outlines.
pub const EM_SQUARE: u16 = 1024;

/// EM square of DefineFont3 outlines, which are stored in twentieths.
pub const SUBPIXEL_EM_SQUARE: u16 = 1024 * 20;

/// A glyph outline paired with its advance.
#[derive(Clone, Debug, Default)]
pub struct GlyphInfo {
    /// `None` for glyphs that have an index but nothing to draw.
    pub glyph: Option<Arc<ShapeDef>>,
    /// Horizontal advance in EM units.
    pub advance: f32,
}

impl GlyphInfo {
    /// An embedded glyph.
    pub fn new(glyph: ShapeDef, advance: f32) -> Self {
        GlyphInfo {
            glyph: Some(Arc::new(glyph)),
            advance,
        }
    }
}

/// Supplies outlines for one face of a system font.
pub trait GlyphProvider: Send {
    /// Size of the EM square the outlines are expressed in.
    fn units_per_em(&self) -> u16;

    /// The outline and advance for a character code, or `None` if the face
    /// has no such glyph.
    fn glyph(&mut self, code: u16) -> Option<(ShapeDef, f32)>;
}

/// Opens system font faces by name and style.
pub trait DeviceFontFactory: Send + Sync {
    /// Opens a face, or returns `None` if the system has nothing by that name.
    fn create_face(&self, name: &str, bold: bool, italic: bool) -> Option<Box<dyn GlyphProvider>>;
}

/// An ordered pair of character codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KerningPair {
    /// Code of the first character.
    pub left: u16,
    /// Code of the character that follows it.
    pub right: u16,
}

enum ProviderState {
    Uninitialized,
    Ready(Box<dyn GlyphProvider>),
    /// Creating the face failed once; it is not retried.
    Failed,
}

struct DeviceGlyphs {
    provider: ProviderState,
    glyphs: Vec<GlyphInfo>,
    code_table: HashMap<u16, usize>,
}

impl DeviceGlyphs {
    fn new() -> Self {
        DeviceGlyphs {
            provider: ProviderState::Uninitialized,
            glyphs: Vec::new(),
            code_table: HashMap::new(),
        }
    }
}

/// A font character: embedded glyphs from DefineFont tags, device glyphs
/// created on demand, and the naming, style and layout information that
/// came with them.
///
/// Fonts are shared between threads behind an `Arc`. Everything is fixed
/// once the defining tag is read except the device glyph table, which
/// only grows.
pub struct Font {
    name: String,
    display_name: String,
    copyright_name: String,

    unicode_chars: bool,
    shift_jis_chars: bool,
    ansi_chars: bool,
    italic: bool,
    bold: bool,
    wide_codes: bool,
    subpixel: bool,
    has_layout: bool,
    language_code: u8,

    ascent: f32,
    descent: f32,
    leading: f32,

    embedded_glyphs: Vec<GlyphInfo>,
    embedded_code_table: HashMap<u16, usize>,
    kerning_pairs: HashMap<KerningPair, f32>,

    device_factory: Option<Arc<dyn DeviceFontFactory>>,
    device: Mutex<DeviceGlyphs>,
}

impl Font {
    /// An empty font, to be filled in by `read`.
    pub fn new(device_factory: Option<Arc<dyn DeviceFontFactory>>) -> Font {
        Font {
            name: String::new(),
            display_name: String::new(),
            copyright_name: String::new(),
            unicode_chars: false,
            shift_jis_chars: false,
            ansi_chars: true,
            italic: false,
            bold: false,
            wide_codes: false,
            subpixel: false,
            has_layout: false,
            language_code: 0,
            ascent: 0.0,
            descent: 0.0,
            leading: 0.0,
            embedded_glyphs: Vec::new(),
            embedded_code_table: HashMap::new(),
            kerning_pairs: HashMap::new(),
            device_factory,
            device: Mutex::new(DeviceGlyphs::new()),
        }
    }

    /// A font with no embedded glyphs, drawn entirely with the named system
    /// face.
    pub fn device(
        name: &str,
        bold: bool,
        italic: bool,
        device_factory: Option<Arc<dyn DeviceFontFactory>>,
    ) -> Font {
        let mut font = Font::new(device_factory);
        font.name = name.to_string();
        font.bold = bold;
        font.italic = italic;
        font
    }

    /// Reads a DefineFont, DefineFont2 or DefineFont3 body, after the font
    /// id.
    ///
    /// On error the font keeps whatever was read up to that point. In
    /// particular the glyph table is sized before any outline is read, so a
    /// corrupted offset leaves the later slots empty.
    pub fn read(&mut self, stream: &mut SwfStream, tag: TagType, options: &LoaderOptions) -> Result<()> {
        match tag {
            TagType::DEFINE_FONT => self.read_define_font(stream, options),
            TagType::DEFINE_FONT2 => self.read_define_font2_or_3(stream, options),
            TagType::DEFINE_FONT3 => {
                self.subpixel = true;
                self.read_define_font2_or_3(stream, options)
            }
            other => Err(Error::corrupted(format!(
                "{} is not a font definition tag",
                other
            ))),
        }
    }

    fn read_define_font(&mut self, stream: &mut SwfStream, options: &LoaderOptions) -> Result<()> {
        parse_trace!("reading DefineFont");

        let table_base = stream.tell();
        stream.ensure_bytes(2)?;
        let first = stream.read_u16()?;
        parse_trace!("offset[0] = {}", first);

        let count = (first >> 1) as usize;
        if count == 0 {
            log::error!("Empty embedded glyph table in DefineFont tag");
            return Ok(());
        }

        let mut offsets = Vec::with_capacity(count);
        offsets.push(first as usize);
        if count > 1 {
            stream.ensure_bytes((count - 1) * 2)?;
            for i in 1..count {
                let offset = stream.read_u16()? as usize;
                parse_trace!("offset[{}] = {}", i, offset);
                offsets.push(offset);
            }
        }

        self.embedded_glyphs.resize(count, GlyphInfo::default());
        if !options.load_font_shapes {
            return Ok(());
        }

        for (i, offset) in offsets.iter().enumerate() {
            if !stream.seek(table_base + offset) {
                return Err(Error::corrupted("Glyphs offset table corrupted in DefineFont tag"));
            }
            let glyph = ShapeDef::read_glyph(stream)?;
            self.embedded_glyphs[i].glyph = Some(Arc::new(glyph));
        }
        Ok(())
    }

    fn read_define_font2_or_3(&mut self, stream: &mut SwfStream, options: &LoaderOptions) -> Result<()> {
        parse_trace!("reading DefineFont2 or DefineFont3");

        stream.ensure_bytes(2)?;
        let flags = stream.read_u8()?;
        self.has_layout = flags & 0x80 != 0;
        self.shift_jis_chars = flags & 0x40 != 0;
        self.unicode_chars = flags & 0x20 != 0;
        self.ansi_chars = flags & 0x10 != 0;
        let wide_offsets = flags & 0x08 != 0;
        self.wide_codes = flags & 0x04 != 0;
        self.italic = flags & 0x02 != 0;
        self.bold = flags & 0x01 != 0;

        self.language_code = stream.read_u8()?;

        self.name = stream.read_string_with_length()?;

        stream.ensure_bytes(2)?;
        let glyph_count = stream.read_u16()? as usize;

        parse_trace!(
            " has_layout = {}, shift_jis = {}, unicode = {}, ansi = {}, wide_offsets = {}, \
             wide_codes = {}, italic = {}, bold = {}, name = {}, glyphs count = {}",
            self.has_layout,
            self.shift_jis_chars,
            self.unicode_chars,
            self.ansi_chars,
            wide_offsets,
            self.wide_codes,
            self.italic,
            self.bold,
            self.name,
            glyph_count
        );

        let table_base = stream.tell();
        let offset_size = if wide_offsets { 4 } else { 2 };

        // Some authoring tools write device-only fonts with no offset table
        // at all, not even the code table offset.
        if glyph_count == 0 && stream.bytes_left() < offset_size {
            return Ok(());
        }

        stream.ensure_bytes(offset_size * (glyph_count + 1))?;
        let mut offsets = Vec::with_capacity(glyph_count);
        for i in 0..glyph_count {
            let offset = if wide_offsets {
                stream.read_u32()? as usize
            } else {
                stream.read_u16()? as usize
            };
            parse_trace!("Glyph {} at offset {}", i, offset);
            offsets.push(offset);
        }
        let code_table_offset = if wide_offsets {
            stream.read_u32()? as usize
        } else {
            stream.read_u16()? as usize
        };

        self.embedded_glyphs.resize(glyph_count, GlyphInfo::default());

        if options.load_font_shapes {
            for (i, offset) in offsets.iter().enumerate() {
                // Offsets pointing backwards happen in real files.
                if !stream.seek(table_base + offset) {
                    return Err(Error::corrupted(
                        "Glyphs offset table corrupted in DefineFont2/3 tag",
                    ));
                }
                let glyph = ShapeDef::read_glyph(stream)?;
                self.embedded_glyphs[i].glyph = Some(Arc::new(glyph));
            }

            if table_base + code_table_offset != stream.tell() {
                malformed!("Bad offset in DefineFont2");
                return Ok(());
            }
        } else {
            let code_table_pos = table_base + code_table_offset;
            if code_table_pos >= stream.get_tag_end_position() || !stream.seek(code_table_pos) {
                parse_trace!("No code table or layout in font {}", self.name);
                return Ok(());
            }
        }

        self.read_code_table(stream)?;

        if self.has_layout {
            self.read_layout(stream)?;
        }
        Ok(())
    }

    fn read_layout(&mut self, stream: &mut SwfStream) -> Result<()> {
        stream.ensure_bytes(6)?;
        self.ascent = stream.read_s16()? as f32;
        self.descent = stream.read_s16()? as f32;
        self.leading = stream.read_s16()? as f32;

        let glyph_count = self.embedded_glyphs.len();
        stream.ensure_bytes(glyph_count * 2)?;
        for glyph in &mut self.embedded_glyphs {
            glyph.advance = stream.read_s16()? as f32;
        }

        // Per-glyph bounds. Nothing uses them, but they have to be read to
        // reach the kerning table.
        for _ in 0..glyph_count {
            Rect::read(stream)?;
        }

        stream.ensure_bytes(2)?;
        let kerning_count = stream.read_u16()? as usize;
        let code_size = if self.wide_codes { 2 } else { 1 };
        stream.ensure_bytes(kerning_count * (code_size * 2 + 2))?;
        for _ in 0..kerning_count {
            let (left, right) = if self.wide_codes {
                (stream.read_u16()?, stream.read_u16()?)
            } else {
                (stream.read_u8()? as u16, stream.read_u8()? as u16)
            };
            let adjustment = stream.read_s16()? as f32;
            self.add_kerning_pair(KerningPair { left, right }, adjustment);
        }
        Ok(())
    }

    /// Remembers a kerning adjustment. The first adjustment given for a
    /// pair wins.
    fn add_kerning_pair(&mut self, pair: KerningPair, adjustment: f32) {
        use std::collections::hash_map::Entry;
        match self.kerning_pairs.entry(pair) {
            Entry::Vacant(entry) => {
                entry.insert(adjustment);
            }
            Entry::Occupied(_) => {
                malformed!("Repeated kerning pair found - ignoring");
            }
        }
    }

    fn read_code_table(&mut self, stream: &mut SwfStream) -> Result<()> {
        parse_trace!("reading code table at offset {}", stream.tell());

        if !self.embedded_code_table.is_empty() {
            malformed!("Font {} already has a code table, replacing it", self.name);
            self.embedded_code_table.clear();
        }

        let glyph_count = self.embedded_glyphs.len();
        if self.wide_codes {
            stream.ensure_bytes(glyph_count * 2)?;
            for i in 0..glyph_count {
                let code = stream.read_u16()?;
                self.embedded_code_table.entry(code).or_insert(i);
            }
        } else {
            stream.ensure_bytes(glyph_count)?;
            for i in 0..glyph_count {
                let code = stream.read_u8()? as u16;
                self.embedded_code_table.entry(code).or_insert(i);
            }
        }
        Ok(())
    }

    /// Reads a DefineFontInfo or DefineFontInfo2 body after the font id,
    /// replacing the name, style flags and code table.
    pub fn read_font_info(&mut self, stream: &mut SwfStream, tag: TagType) -> Result<()> {
        self.name = stream.read_string_with_length()?;

        stream.ensure_bytes(1)?;
        let flags = stream.read_u8()?;
        // The top two bits are reserved.
        self.unicode_chars = flags & 0x20 != 0;
        self.shift_jis_chars = flags & 0x10 != 0;
        self.ansi_chars = flags & 0x08 != 0;
        self.italic = flags & 0x04 != 0;
        self.bold = flags & 0x02 != 0;
        self.wide_codes = flags & 0x01 != 0;

        if tag == TagType::DEFINE_FONT_INFO2 {
            stream.ensure_bytes(1)?;
            self.language_code = stream.read_u8()?;
            if !self.wide_codes {
                malformed!("DefineFontInfo2 with 8-bit codes for font {}", self.name);
            }
        }

        self.read_code_table(stream)
    }

    /// Reads a DefineFontName body after the font id.
    pub fn read_font_name(&mut self, stream: &mut SwfStream) -> Result<()> {
        self.display_name = stream.read_string()?;
        self.copyright_name = stream.read_string()?;
        Ok(())
    }

    fn device_glyphs(&self) -> MutexGuard<'_, DeviceGlyphs> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_provider<'a>(&self, device: &'a mut DeviceGlyphs) -> Option<&'a mut Box<dyn GlyphProvider>> {
        if let ProviderState::Uninitialized = device.provider {
            device.provider = match self.create_provider() {
                Some(provider) => ProviderState::Ready(provider),
                None => ProviderState::Failed,
            };
        }
        match device.provider {
            ProviderState::Ready(ref mut provider) => Some(provider),
            _ => None,
        }
    }

    fn create_provider(&self) -> Option<Box<dyn GlyphProvider>> {
        if self.name.is_empty() {
            log::error!("No name associated with this font, can't use device fonts");
            return None;
        }
        let factory = match self.device_factory.clone().or_else(fontlib::device_font_factory) {
            Some(factory) => factory,
            None => {
                log::error!("No device font support, can't use device font {}", self.name);
                return None;
            }
        };
        let provider = factory.create_face(&self.name, self.bold, self.italic);
        if provider.is_none() {
            log::error!("Could not create a device font face {}", self.name);
        }
        provider
    }

    fn device_glyph_index(&self, device: &mut DeviceGlyphs, code: u16) -> Option<usize> {
        if let Some(&index) = device.code_table.get(&code) {
            return Some(index);
        }
        let provider = match self.ensure_provider(device) {
            Some(provider) => provider,
            None => {
                log::error!("Device font provider was not initialized, can't get glyph for {}", code);
                return None;
            }
        };
        let (shape, advance) = match provider.glyph(code) {
            Some(glyph) => glyph,
            None => {
                log::error!(
                    "Could not create shape glyph for character code {} with device font {}",
                    code,
                    self.name
                );
                return None;
            }
        };
        let index = device.glyphs.len();
        device.glyphs.push(GlyphInfo::new(shape, advance));
        device.code_table.insert(code, index);
        Some(index)
    }

    /// Makes sure a device glyph exists for `code` and returns its index.
    /// Asking again for the same code returns the same index without going
    /// back to the rasterizer.
    pub fn add_os_glyph(&self, code: u16) -> Option<usize> {
        let mut device = self.device_glyphs();
        self.device_glyph_index(&mut device, code)
    }

    /// Glyph index for a character code. Device lookups that miss fetch the
    /// glyph from the system font.
    pub fn get_glyph_index(&self, code: u16, embedded: bool) -> Option<usize> {
        if embedded {
            return self.embedded_code_table.get(&code).copied();
        }
        let mut device = self.device_glyphs();
        self.device_glyph_index(&mut device, code)
    }

    /// The outline of a glyph, `None` for an empty glyph or a bad index.
    pub fn get_glyph(&self, index: usize, embedded: bool) -> Option<Arc<ShapeDef>> {
        if embedded {
            self.embedded_glyphs.get(index).and_then(|g| g.glyph.clone())
        } else {
            self.device_glyphs()
                .glyphs
                .get(index)
                .and_then(|g| g.glyph.clone())
        }
    }

    /// Advance of a glyph in EM units. `None` stands for a code that had no
    /// glyph and gets `DEFAULT_ADVANCE`.
    pub fn get_advance(&self, index: Option<usize>, embedded: bool) -> f32 {
        let index = match index {
            Some(index) => index,
            None => return DEFAULT_ADVANCE,
        };
        let advance = if embedded {
            self.embedded_glyphs.get(index).map(|g| g.advance)
        } else {
            self.device_glyphs().glyphs.get(index).map(|g| g.advance)
        };
        advance.unwrap_or_else(|| {
            log::error!("Bad glyph index {} for font {}", index, self.name);
            0.0
        })
    }

    /// Extra advance between two character codes, 0 for unkerned pairs.
    pub fn get_kerning_adjustment(&self, left: u16, right: u16) -> f32 {
        self.kerning_pairs
            .get(&KerningPair { left, right })
            .copied()
            .unwrap_or(0.0)
    }

    /// Size of the EM square glyph coordinates are expressed in. 0 if the
    /// device face can't be opened.
    pub fn units_per_em(&self, embedded: bool) -> u16 {
        if embedded {
            return if self.subpixel {
                SUBPIXEL_EM_SQUARE
            } else {
                EM_SQUARE
            };
        }
        let mut device = self.device_glyphs();
        match self.ensure_provider(&mut device) {
            Some(provider) => provider.units_per_em(),
            None => {
                log::error!("Device font provider was not initialized, can't get unitsPerEM");
                0
            }
        }
    }

    /// Whether this is the font with the given name and style.
    pub fn matches(&self, name: &str, bold: bool, italic: bool) -> bool {
        self.bold == bold && self.italic == italic && self.name == name
    }

    /// The font name, from the defining tag or DefineFontInfo.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full name from DefineFontName.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Copyright line from DefineFontName.
    pub fn copyright_name(&self) -> &str {
        &self.copyright_name
    }

    /// Bold style flag.
    pub fn is_bold(&self) -> bool {
        self.bold
    }

    /// Italic style flag.
    pub fn is_italic(&self) -> bool {
        self.italic
    }

    /// DefineFont3 outlines, in twentieths of a unit.
    pub fn is_subpixel(&self) -> bool {
        self.subpixel
    }

    /// Unicode codes, DefineFontInfo2 and later.
    pub fn is_unicode(&self) -> bool {
        self.unicode_chars
    }

    /// Shift-JIS codes.
    pub fn is_shift_jis(&self) -> bool {
        self.shift_jis_chars
    }

    /// ANSI codes.
    pub fn is_ansi(&self) -> bool {
        self.ansi_chars
    }

    /// Whether the code table uses 16-bit entries.
    pub fn has_wide_codes(&self) -> bool {
        self.wide_codes
    }

    /// Whether ascent, descent, leading and advances were stored.
    pub fn has_layout(&self) -> bool {
        self.has_layout
    }

    /// SWF language code, 0 when unset.
    pub fn language_code(&self) -> u8 {
        self.language_code
    }

    /// Ascent in EM units.
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    /// Descent in EM units.
    pub fn descent(&self) -> f32 {
        self.descent
    }

    /// Leading in EM units.
    pub fn leading(&self) -> f32 {
        self.leading
    }

    /// Number of embedded glyphs.
    pub fn glyph_count(&self) -> usize {
        self.embedded_glyphs.len()
    }

    /// Number of device glyphs created so far.
    pub fn device_glyph_count(&self) -> usize {
        self.device_glyphs().glyphs.len()
    }

    /// Number of kerning pairs.
    pub fn kerning_pair_count(&self) -> usize {
        self.kerning_pairs.len()
    }

    /// Whether text in this font has to fall back to device glyphs.
    pub fn is_device_font(&self) -> bool {
        self.embedded_glyphs.is_empty()
    }
}

// The device cache isn't carried over: copies are made to amend a font
// while loading, before anything has looked up device glyphs through it.
impl Clone for Font {
    fn clone(&self) -> Font {
        Font {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            copyright_name: self.copyright_name.clone(),
            unicode_chars: self.unicode_chars,
            shift_jis_chars: self.shift_jis_chars,
            ansi_chars: self.ansi_chars,
            italic: self.italic,
            bold: self.bold,
            wide_codes: self.wide_codes,
            subpixel: self.subpixel,
            has_layout: self.has_layout,
            language_code: self.language_code,
            ascent: self.ascent,
            descent: self.descent,
            leading: self.leading,
            embedded_glyphs: self.embedded_glyphs.clone(),
            embedded_code_table: self.embedded_code_table.clone(),
            kerning_pairs: self.kerning_pairs.clone(),
            device_factory: self.device_factory.clone(),
            device: Mutex::new(DeviceGlyphs::new()),
        }
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("bold", &self.bold)
            .field("italic", &self.italic)
            .field("subpixel", &self.subpixel)
            .field("glyphs", &self.embedded_glyphs.len())
            .field("codes", &self.embedded_code_table.len())
            .field("kerning_pairs", &self.kerning_pairs.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_util::{capture_logs, BitWriter, EMPTY_GLYPH};

    /// Hands out empty outlines with an advance equal to the code and counts
    /// how often it was asked.
    pub(crate) struct CountingFactory {
        pub faces: AtomicUsize,
        pub glyphs: Arc<AtomicUsize>,
        pub known: Option<&'static str>,
    }

    impl CountingFactory {
        pub fn new(known: Option<&'static str>) -> Self {
            CountingFactory {
                faces: AtomicUsize::new(0),
                glyphs: Arc::new(AtomicUsize::new(0)),
                known,
            }
        }
    }

    struct CountingFace {
        glyphs: Arc<AtomicUsize>,
    }

    impl GlyphProvider for CountingFace {
        fn units_per_em(&self) -> u16 {
            2048
        }

        fn glyph(&mut self, code: u16) -> Option<(ShapeDef, f32)> {
            self.glyphs.fetch_add(1, Ordering::SeqCst);
            if code == 0 {
                return None;
            }
            Some((ShapeDef::default(), code as f32))
        }
    }

    impl DeviceFontFactory for CountingFactory {
        fn create_face(&self, name: &str, _bold: bool, _italic: bool) -> Option<Box<dyn GlyphProvider>> {
            self.faces.fetch_add(1, Ordering::SeqCst);
            if self.known.map_or(true, |known| known == name) {
                Some(Box::new(CountingFace {
                    glyphs: self.glyphs.clone(),
                }))
            } else {
                None
            }
        }
    }

    pub(crate) fn shared(factory: &Arc<CountingFactory>) -> Option<Arc<dyn DeviceFontFactory>> {
        let factory: Arc<dyn DeviceFontFactory> = factory.clone();
        Some(factory)
    }

    pub(crate) struct Font2 {
        pub flags: u8,
        pub name: &'static str,
        pub codes: Vec<u16>,
        pub kerning: Vec<(u16, u16, i16)>,
    }

    impl Font2 {
        pub fn new(codes: &[u16]) -> Self {
            Font2 {
                flags: 0,
                name: "Test",
                codes: codes.to_vec(),
                kerning: Vec::new(),
            }
        }

        /// DefineFont2/3 body after the font id.
        pub fn body(&self) -> Vec<u8> {
            let wide_codes = self.flags & 0x04 != 0;
            let n = self.codes.len();
            let mut w = BitWriter::new();
            w.u8(self.flags).u8(0);
            w.u8(self.name.len() as u8).bytes(self.name.as_bytes());
            w.u16(n as u16);
            let table = (n + 1) * 2;
            for i in 0..=n {
                w.u16((table + i * EMPTY_GLYPH.len()) as u16);
            }
            for _ in 0..n {
                w.bytes(&EMPTY_GLYPH);
            }
            for &code in &self.codes {
                if wide_codes {
                    w.u16(code);
                } else {
                    w.u8(code as u8);
                }
            }
            if self.flags & 0x80 != 0 {
                w.i16(900).i16(200).i16(10);
                for i in 0..n {
                    w.i16(100 + i as i16);
                }
                for _ in 0..n {
                    w.u8(0);
                }
                w.u16(self.kerning.len() as u16);
                for &(left, right, adjust) in &self.kerning {
                    if wide_codes {
                        w.u16(left).u16(right);
                    } else {
                        w.u8(left as u8).u8(right as u8);
                    }
                    w.i16(adjust);
                }
            }
            w.into_bytes()
        }
    }

    fn read_font(tag: TagType, body: &[u8]) -> (Font, Result<()>) {
        let mut font = Font::new(None);
        let mut s = SwfStream::new(body);
        let result = font.read(&mut s, tag, &LoaderOptions::default());
        (font, result)
    }

    #[test]
    fn em_square_depends_on_tag() {
        let body = Font2::new(&[65]).body();
        let (font2, result) = read_font(TagType::DEFINE_FONT2, &body);
        result.unwrap();
        assert_eq!(font2.units_per_em(true), 1024);

        let (font3, result) = read_font(TagType::DEFINE_FONT3, &body);
        result.unwrap();
        assert_eq!(font3.units_per_em(true), 1024 * 20);
        assert!(font3.is_subpixel());
    }

    #[test]
    fn subpixel_is_set_even_if_reading_fails() {
        let body = Font2::new(&[65]).body();
        let (font, result) = read_font(TagType::DEFINE_FONT3, &body[..4]);
        assert!(result.is_err());
        assert_eq!(font.units_per_em(true), SUBPIXEL_EM_SQUARE);
    }

    #[test]
    fn code_table_and_layout() {
        let mut def = Font2::new(&[65, 66, 67]);
        def.flags = 0x80 | 0x04 | 0x01;
        let (font, result) = read_font(TagType::DEFINE_FONT2, &def.body());
        result.unwrap();
        assert_eq!(font.name(), "Test");
        assert!(font.is_bold());
        assert!(!font.is_italic());
        assert_eq!(font.glyph_count(), 3);
        assert_eq!(font.get_glyph_index(66, true), Some(1));
        assert_eq!(font.get_glyph_index(68, true), None);
        assert!(font.get_glyph(2, true).is_some());
        assert!(font.get_glyph(3, true).is_none());
        assert_eq!(font.get_advance(Some(2), true), 102.0);
        assert_eq!(font.ascent(), 900.0);
        assert_eq!(font.leading(), 10.0);
    }

    #[test]
    fn duplicate_codes_keep_the_first_index() {
        let (font, result) = read_font(TagType::DEFINE_FONT2, &Font2::new(&[65, 65]).body());
        result.unwrap();
        assert_eq!(font.get_glyph_index(65, true), Some(0));
    }

    #[test]
    fn default_advance_for_missing_glyph() {
        let font = Font::new(None);
        assert_eq!(font.get_advance(None, true), 512.0);
        assert_eq!(font.get_advance(None, false), 512.0);
        let (font, _) = read_font(TagType::DEFINE_FONT2, &Font2::new(&[65]).body());
        assert_eq!(font.get_advance(None, true), DEFAULT_ADVANCE);
    }

    #[test]
    fn bad_glyph_index_has_no_advance() {
        let font = Font::new(None);
        let (advance, logs) = capture_logs(|| font.get_advance(Some(3), true));
        assert_eq!(advance, 0.0);
        assert!(logs.contains("Bad glyph index"));
    }

    #[test]
    fn first_kerning_pair_wins() {
        let mut def = Font2::new(&[65, 86]);
        def.flags = 0x80;
        def.kerning = vec![(65, 86, -120), (65, 86, 40), (86, 65, -80)];
        let ((font, result), logs) = capture_logs(|| read_font(TagType::DEFINE_FONT2, &def.body()));
        result.unwrap();
        assert_eq!(font.get_kerning_adjustment(65, 86), -120.0);
        assert_eq!(font.get_kerning_adjustment(86, 65), -80.0);
        assert_eq!(font.get_kerning_adjustment(65, 65), 0.0);
        assert_eq!(font.kerning_pair_count(), 2);
        assert_eq!(logs.malformed(), 1);
    }

    #[test]
    fn bad_code_table_offset_skips_the_rest() {
        let mut body = Font2::new(&[65]).body();
        // code table offset sits after the name (2 + 1 + 4) and glyph count
        let code_offset_pos = 2 + 1 + 4 + 2 + 2;
        body[code_offset_pos] += 1;
        let ((font, result), logs) = capture_logs(|| read_font(TagType::DEFINE_FONT2, &body));
        result.unwrap();
        assert_eq!(font.glyph_count(), 1);
        assert_eq!(font.get_glyph_index(65, true), None);
        assert!(logs.contains("Bad offset in DefineFont2"));
    }

    #[test]
    fn font_shapes_can_be_skipped() {
        let body = Font2::new(&[65, 66]).body();
        let mut font = Font::new(None);
        let mut s = SwfStream::new(&body);
        let options = LoaderOptions::default().with_font_shapes(false);
        font.read(&mut s, TagType::DEFINE_FONT2, &options).unwrap();
        assert_eq!(font.glyph_count(), 2);
        assert!(font.get_glyph(0, true).is_none());
        assert_eq!(font.get_glyph_index(66, true), Some(1));
    }

    #[test]
    fn device_only_font_without_offsets() {
        let mut w = BitWriter::new();
        w.u8(0).u8(0).u8(5).bytes(b"Arial").u16(0);
        let body = w.into_bytes();
        let (font, result) = read_font(TagType::DEFINE_FONT2, &body);
        result.unwrap();
        assert!(font.is_device_font());
        assert_eq!(font.name(), "Arial");
    }

    fn define_font_v1(offsets: &[u16], glyphs: usize) -> Vec<u8> {
        let mut w = BitWriter::new();
        for &offset in offsets {
            w.u16(offset);
        }
        for _ in 0..glyphs {
            w.bytes(&EMPTY_GLYPH);
        }
        w.into_bytes()
    }

    #[test]
    fn define_font_reads_every_glyph() {
        let body = define_font_v1(&[4, 6], 2);
        let (font, result) = read_font(TagType::DEFINE_FONT, &body);
        result.unwrap();
        assert_eq!(font.glyph_count(), 2);
        assert!(font.get_glyph(1, true).is_some());
        assert_eq!(font.units_per_em(true), EM_SQUARE);
    }

    #[test]
    fn corrupted_offset_table_leaves_a_partial_font() {
        let body = define_font_v1(&[6, 8, 400], 2);
        let (font, result) = read_font(TagType::DEFINE_FONT, &body);
        match result {
            Err(Error::Corrupted(ref msg)) => assert!(msg.contains("Glyphs offset table corrupted")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(font.glyph_count(), 3);
        assert!(font.get_glyph(0, true).is_some());
        assert!(font.get_glyph(1, true).is_some());
        assert!(font.get_glyph(2, true).is_none());
    }

    #[test]
    fn font_info_replaces_name_and_codes() {
        let body = define_font_v1(&[4, 6], 2);
        let (mut font, _) = read_font(TagType::DEFINE_FONT, &body);

        let mut w = BitWriter::new();
        w.u8(5).bytes(b"Serif").u8(0x20 | 0x04 | 0x01).u8(1).u16(0x263A).u16(66);
        let info = w.into_bytes();
        let mut s = SwfStream::new(&info);
        font.read_font_info(&mut s, TagType::DEFINE_FONT_INFO2).unwrap();
        assert_eq!(font.name(), "Serif");
        assert!(font.is_italic());
        assert!(font.is_unicode());
        assert_eq!(font.language_code(), 1);
        assert_eq!(font.get_glyph_index(0x263A, true), Some(0));
        assert_eq!(font.get_glyph_index(66, true), Some(1));
    }

    #[test]
    fn font_name_strings() {
        let mut font = Font::new(None);
        let data = b"Gill Sans\0(c) nobody\0";
        let mut s = SwfStream::new(data);
        font.read_font_name(&mut s).unwrap();
        assert_eq!(font.display_name(), "Gill Sans");
        assert_eq!(font.copyright_name(), "(c) nobody");
    }

    #[test]
    fn device_glyphs_are_cached() {
        let factory = Arc::new(CountingFactory::new(None));
        let font = Font::device("_sans", false, false, shared(&factory));

        let first = font.get_glyph_index(65, false);
        let second = font.get_glyph_index(65, false);
        assert_eq!(first, Some(0));
        assert_eq!(first, second);
        assert_eq!(factory.glyphs.load(Ordering::SeqCst), 1);
        assert_eq!(factory.faces.load(Ordering::SeqCst), 1);

        assert_eq!(font.add_os_glyph(66), Some(1));
        assert_eq!(font.add_os_glyph(65), Some(0));
        assert_eq!(factory.glyphs.load(Ordering::SeqCst), 2);
        assert_eq!(font.get_advance(Some(1), false), 66.0);
        assert!(font.get_glyph(1, false).is_some());
        assert_eq!(font.units_per_em(false), 2048);
        assert_eq!(font.device_glyph_count(), 2);
    }

    #[test]
    fn embedded_lookup_never_touches_the_device() {
        let factory = Arc::new(CountingFactory::new(None));
        let font = Font::device("_sans", false, false, shared(&factory));
        assert_eq!(font.get_glyph_index(65, true), None);
        assert_eq!(factory.faces.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_device_face_is_not_retried() {
        let factory = Arc::new(CountingFactory::new(Some("Helvetica")));
        let font = Font::device("NoSuchFont", true, false, shared(&factory));
        let (index, logs) = capture_logs(|| font.get_glyph_index(65, false));
        assert_eq!(index, None);
        assert!(logs.contains("Could not create a device font face"));
        assert_eq!(font.get_glyph_index(66, false), None);
        assert_eq!(font.units_per_em(false), 0);
        assert_eq!(factory.faces.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_device_glyph_is_not_cached() {
        let factory = Arc::new(CountingFactory::new(None));
        let font = Font::device("_sans", false, false, shared(&factory));
        assert_eq!(font.add_os_glyph(0), None);
        assert_eq!(font.add_os_glyph(0), None);
        assert_eq!(factory.glyphs.load(Ordering::SeqCst), 2);
        assert_eq!(font.add_os_glyph(1), Some(0));
    }

    #[test]
    fn matches_name_and_style() {
        let font = Font::device("Verdana", true, false, None);
        assert!(font.matches("Verdana", true, false));
        assert!(!font.matches("Verdana", false, false));
        assert!(!font.matches("verdana", true, false));
    }

    #[test]
    fn clone_starts_with_an_empty_device_cache() {
        let factory = Arc::new(CountingFactory::new(None));
        let font = Font::device("_sans", false, false, shared(&factory));
        font.add_os_glyph(65);
        let copy = font.clone();
        assert_eq!(copy.device_glyph_count(), 0);
        assert_eq!(copy.name(), "_sans");
    }
}
