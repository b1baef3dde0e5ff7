//! Tag codes and the loop that hands each tag to its loader.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::error::Result;
use crate::loaders;
use crate::movie::LoadContext;
use crate::sound;
use crate::stream::SwfStream;

/// A SWF tag code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagType(pub u16);

#[allow(missing_docs)]
impl TagType {
    pub const END: TagType = TagType(0);
    pub const SHOW_FRAME: TagType = TagType(1);
    pub const DEFINE_SHAPE: TagType = TagType(2);
    pub const PLACE_OBJECT: TagType = TagType(4);
    pub const REMOVE_OBJECT: TagType = TagType(5);
    pub const DEFINE_BITS: TagType = TagType(6);
    pub const DEFINE_BUTTON: TagType = TagType(7);
    pub const JPEG_TABLES: TagType = TagType(8);
    pub const SET_BACKGROUND_COLOR: TagType = TagType(9);
    pub const DEFINE_FONT: TagType = TagType(10);
    pub const DEFINE_TEXT: TagType = TagType(11);
    pub const DO_ACTION: TagType = TagType(12);
    pub const DEFINE_FONT_INFO: TagType = TagType(13);
    pub const DEFINE_SOUND: TagType = TagType(14);
    pub const START_SOUND: TagType = TagType(15);
    pub const DEFINE_BUTTON_SOUND: TagType = TagType(17);
    pub const SOUND_STREAM_HEAD: TagType = TagType(18);
    pub const SOUND_STREAM_BLOCK: TagType = TagType(19);
    pub const DEFINE_BITS_LOSSLESS: TagType = TagType(20);
    pub const DEFINE_BITS_JPEG2: TagType = TagType(21);
    pub const DEFINE_SHAPE2: TagType = TagType(22);
    pub const DEFINE_BUTTON_CXFORM: TagType = TagType(23);
    pub const PROTECT: TagType = TagType(24);
    pub const PLACE_OBJECT2: TagType = TagType(26);
    pub const REMOVE_OBJECT2: TagType = TagType(28);
    pub const DEFINE_SHAPE3: TagType = TagType(32);
    pub const DEFINE_TEXT2: TagType = TagType(33);
    pub const DEFINE_BUTTON2: TagType = TagType(34);
    pub const DEFINE_BITS_JPEG3: TagType = TagType(35);
    pub const DEFINE_BITS_LOSSLESS2: TagType = TagType(36);
    pub const DEFINE_EDIT_TEXT: TagType = TagType(37);
    pub const DEFINE_SPRITE: TagType = TagType(39);
    pub const FRAME_LABEL: TagType = TagType(43);
    pub const SOUND_STREAM_HEAD2: TagType = TagType(45);
    pub const DEFINE_MORPH_SHAPE: TagType = TagType(46);
    pub const DEFINE_FONT2: TagType = TagType(48);
    pub const EXPORT_ASSETS: TagType = TagType(56);
    pub const IMPORT_ASSETS: TagType = TagType(57);
    pub const DO_INIT_ACTION: TagType = TagType(59);
    pub const DEFINE_VIDEO_STREAM: TagType = TagType(60);
    pub const VIDEO_FRAME: TagType = TagType(61);
    pub const DEFINE_FONT_INFO2: TagType = TagType(62);
    pub const FILE_ATTRIBUTES: TagType = TagType(69);
    pub const PLACE_OBJECT3: TagType = TagType(70);
    pub const DO_ABC: TagType = TagType(72);
    pub const DEFINE_FONT_ALIGN_ZONES: TagType = TagType(73);
    pub const CSM_TEXT_SETTINGS: TagType = TagType(74);
    pub const DEFINE_FONT3: TagType = TagType(75);
    pub const SYMBOL_CLASS: TagType = TagType(76);
    pub const METADATA: TagType = TagType(77);
    pub const DEFINE_SCALING_GRID: TagType = TagType(78);
    pub const DO_ABC_DEFINE: TagType = TagType(82);
    pub const DEFINE_SHAPE4: TagType = TagType(83);
    pub const DEFINE_MORPH_SHAPE2: TagType = TagType(84);
    pub const DEFINE_SCENE_AND_FRAME_LABEL_DATA: TagType = TagType(86);
    pub const DEFINE_BINARY_DATA: TagType = TagType(87);
    pub const DEFINE_FONT_NAME: TagType = TagType(88);
}

impl TagType {
    /// The tag's name as Adobe documents it, or "unknown".
    pub fn name(self) -> &'static str {
        match self {
            TagType::END => "End",
            TagType::SHOW_FRAME => "ShowFrame",
            TagType::DEFINE_SHAPE => "DefineShape",
            TagType::PLACE_OBJECT => "PlaceObject",
            TagType::REMOVE_OBJECT => "RemoveObject",
            TagType::DEFINE_BITS => "DefineBits",
            TagType::DEFINE_BUTTON => "DefineButton",
            TagType::JPEG_TABLES => "JPEGTables",
            TagType::SET_BACKGROUND_COLOR => "SetBackgroundColor",
            TagType::DEFINE_FONT => "DefineFont",
            TagType::DEFINE_TEXT => "DefineText",
            TagType::DO_ACTION => "DoAction",
            TagType::DEFINE_FONT_INFO => "DefineFontInfo",
            TagType::DEFINE_SOUND => "DefineSound",
            TagType::START_SOUND => "StartSound",
            TagType::DEFINE_BUTTON_SOUND => "DefineButtonSound",
            TagType::SOUND_STREAM_HEAD => "SoundStreamHead",
            TagType::SOUND_STREAM_BLOCK => "SoundStreamBlock",
            TagType::DEFINE_BITS_LOSSLESS => "DefineBitsLossless",
            TagType::DEFINE_BITS_JPEG2 => "DefineBitsJPEG2",
            TagType::DEFINE_SHAPE2 => "DefineShape2",
            TagType::DEFINE_BUTTON_CXFORM => "DefineButtonCxform",
            TagType::PROTECT => "Protect",
            TagType::PLACE_OBJECT2 => "PlaceObject2",
            TagType::REMOVE_OBJECT2 => "RemoveObject2",
            TagType::DEFINE_SHAPE3 => "DefineShape3",
            TagType::DEFINE_TEXT2 => "DefineText2",
            TagType::DEFINE_BUTTON2 => "DefineButton2",
            TagType::DEFINE_BITS_JPEG3 => "DefineBitsJPEG3",
            TagType::DEFINE_BITS_LOSSLESS2 => "DefineBitsLossless2",
            TagType::DEFINE_EDIT_TEXT => "DefineEditText",
            TagType::DEFINE_SPRITE => "DefineSprite",
            TagType::FRAME_LABEL => "FrameLabel",
            TagType::SOUND_STREAM_HEAD2 => "SoundStreamHead2",
            TagType::DEFINE_MORPH_SHAPE => "DefineMorphShape",
            TagType::DEFINE_FONT2 => "DefineFont2",
            TagType::EXPORT_ASSETS => "ExportAssets",
            TagType::IMPORT_ASSETS => "ImportAssets",
            TagType::DO_INIT_ACTION => "DoInitAction",
            TagType::DEFINE_VIDEO_STREAM => "DefineVideoStream",
            TagType::VIDEO_FRAME => "VideoFrame",
            TagType::DEFINE_FONT_INFO2 => "DefineFontInfo2",
            TagType::FILE_ATTRIBUTES => "FileAttributes",
            TagType::PLACE_OBJECT3 => "PlaceObject3",
            TagType::DO_ABC => "DoABC",
            TagType::DEFINE_FONT_ALIGN_ZONES => "DefineFontAlignZones",
            TagType::CSM_TEXT_SETTINGS => "CSMTextSettings",
            TagType::DEFINE_FONT3 => "DefineFont3",
            TagType::SYMBOL_CLASS => "SymbolClass",
            TagType::METADATA => "Metadata",
            TagType::DEFINE_SCALING_GRID => "DefineScalingGrid",
            TagType::DO_ABC_DEFINE => "DoABCDefine",
            TagType::DEFINE_SHAPE4 => "DefineShape4",
            TagType::DEFINE_MORPH_SHAPE2 => "DefineMorphShape2",
            TagType::DEFINE_SCENE_AND_FRAME_LABEL_DATA => "DefineSceneAndFrameLabelData",
            TagType::DEFINE_BINARY_DATA => "DefineBinaryData",
            TagType::DEFINE_FONT_NAME => "DefineFontName",
            _ => "unknown",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Reads one tag body. The stream is positioned after the tag header and
/// bounded to the tag.
pub type TagLoader = fn(&mut SwfStream, TagType, &mut LoadContext) -> Result<()>;

/// Maps tag codes to loaders. Tags with no entry are skipped.
#[derive(Clone, Default)]
pub struct TagLoadersTable {
    loaders: HashMap<TagType, TagLoader>,
}

impl TagLoadersTable {
    /// An empty table.
    pub fn new() -> Self {
        TagLoadersTable::default()
    }

    /// Registers `loader` for `tag`. Returns false, keeping the existing
    /// loader, if one is already registered.
    pub fn register(&mut self, tag: TagType, loader: TagLoader) -> bool {
        if self.loaders.contains_key(&tag) {
            return false;
        }
        self.loaders.insert(tag, loader);
        true
    }

    /// The loader registered for `tag`.
    pub fn get(&self, tag: TagType) -> Option<TagLoader> {
        self.loaders.get(&tag).copied()
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Whether no loader is registered.
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Every loader this crate provides.
    pub fn standard() -> &'static TagLoadersTable {
        static STANDARD: OnceLock<TagLoadersTable> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut table = TagLoadersTable::new();
            loaders::register_all(&mut table);
            table.register(TagType::DEFINE_SOUND, sound::define_sound_loader);
            table.register(TagType::SOUND_STREAM_HEAD, sound::sound_stream_head_loader);
            table.register(TagType::SOUND_STREAM_HEAD2, sound::sound_stream_head_loader);
            table.register(TagType::SOUND_STREAM_BLOCK, sound::sound_stream_block_loader);
            table
        })
    }
}

fn report_unimplemented(tag: TagType) {
    static REPORTED: Mutex<BTreeSet<u16>> = Mutex::new(BTreeSet::new());
    let first = REPORTED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(tag.0);
    if first {
        log::info!(
            target: crate::logging::UNIMPLEMENTED,
            "Unimplemented tag {}, skipping",
            tag
        );
    }
}

/// Reads tags up to an End tag or the end of the enclosing tag, using the
/// standard loaders.
pub fn read_tags(stream: &mut SwfStream, ctx: &mut LoadContext) -> Result<()> {
    read_tags_with(TagLoadersTable::standard(), stream, ctx)
}

/// Tag loop. After each tag the stream is moved to the end the header
/// advertised, whatever the loader did, so one bad tag can't throw off the
/// ones after it.
pub fn read_tags_with(loaders: &TagLoadersTable, stream: &mut SwfStream, ctx: &mut LoadContext) -> Result<()> {
    while stream.bytes_left() > 0 {
        if ctx.is_cancelled() {
            log::debug!("Loading cancelled at offset {}", stream.tell());
            return Ok(());
        }

        let (code, bounds) = stream.open_tag()?;
        let tag = TagType(code);

        match tag {
            TagType::END => {
                stream.close_tag()?;
                if !ctx.is_sprite() && stream.bytes_left() > 0 {
                    parse_trace!("{} bytes after the End tag ignored", stream.bytes_left());
                }
                return Ok(());
            }
            TagType::SHOW_FRAME => ctx.show_frame(),
            _ => match loaders.get(tag) {
                Some(loader) => match loader(stream, tag, ctx) {
                    Ok(()) => {
                        let left = bounds.end.saturating_sub(stream.tell());
                        if left > 0 {
                            malformed!(
                                "Tag {} at offset {} left {} bytes unparsed",
                                tag,
                                bounds.start,
                                left
                            );
                        }
                    }
                    Err(err) => log::error!(
                        "Parsing exception in tag {} at offset {}: {}",
                        tag,
                        bounds.start,
                        err
                    ),
                },
                None => report_unimplemented(tag),
            },
        }

        stream.close_tag()?;
    }
    Ok(())
}
