//! Loaders for the definition and control tags that don't live next to
//! their decoder.
//!
//! Every loader reads the character id itself, builds the definition in
//! full and only then publishes it. Tags that amend an earlier definition
//! work on a copy and swap it in.

use std::sync::Arc;

use crate::bitmap::{self, BitmapDef, JpegBitmap, LosslessBitmap};
use crate::button::{ButtonDef, ButtonSoundDef};
use crate::error::Result;
use crate::font::Font;
use crate::geometry::Rgba;
use crate::morph::MorphShapeDef;
use crate::movie::{Character, CharacterId, Dictionary, FileAttributes, LoadContext, SpriteDefinition, Timeline};
use crate::shape::ShapeDef;
use crate::stream::SwfStream;
use crate::tag::{self, TagLoadersTable, TagType};
use crate::text::{EditTextDef, TextDef};

fn read_id(stream: &mut SwfStream) -> Result<CharacterId> {
    stream.ensure_bytes(2)?;
    Ok(CharacterId(stream.read_u16()?))
}

/// DefineShape, DefineShape2, DefineShape3 and DefineShape4.
pub fn define_shape_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let version = match tag {
        TagType::DEFINE_SHAPE => 1,
        TagType::DEFINE_SHAPE2 => 2,
        TagType::DEFINE_SHAPE3 => 3,
        _ => 4,
    };
    let id = read_id(stream)?;
    parse_trace!("  shape_loader: id = {}", id);
    let shape = ShapeDef::read(stream, version)?;
    ctx.add_character(id, Character::Shape(Arc::new(shape)));
    Ok(())
}

/// DefineMorphShape and DefineMorphShape2.
pub fn define_morph_shape_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let version = if tag == TagType::DEFINE_MORPH_SHAPE2 { 2 } else { 1 };
    let id = read_id(stream)?;
    parse_trace!("  shape_morph_loader: id = {}", id);
    let morph = MorphShapeDef::read(stream, version)?;
    ctx.add_character(id, Character::MorphShape(Arc::new(morph)));
    Ok(())
}

/// DefineFont, DefineFont2 and DefineFont3.
///
/// A font that fails half way is still defined with what could be read.
pub fn define_font_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let mut font = Font::new(ctx.services().device_fonts.clone());
    if let Err(err) = font.read(stream, tag, ctx.options()) {
        log::error!("Error reading {} for font {}: {}", tag, id, err);
    }
    ctx.add_font(id, Arc::new(font));
    Ok(())
}

/// DefineFontInfo and DefineFontInfo2.
pub fn define_font_info_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let font = match ctx.get_font(id) {
        Some(font) => font,
        None => {
            malformed!("{} tag refers to unknown font id {}", tag, id);
            return Ok(());
        }
    };
    let mut amended = Font::clone(&font);
    amended.read_font_info(stream, tag)?;
    ctx.replace(id, Character::Font(Arc::new(amended)));
    Ok(())
}

/// DefineFontName.
pub fn define_font_name_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let font = match ctx.get_font(id) {
        Some(font) => font,
        None => {
            malformed!("DefineFontName tag refers to unknown font id {}", id);
            return Ok(());
        }
    };
    let mut amended = Font::clone(&font);
    amended.read_font_name(stream)?;
    ctx.replace(id, Character::Font(Arc::new(amended)));
    Ok(())
}

/// DefineText and DefineText2.
pub fn define_text_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    parse_trace!("  text_character, id = {}", id);
    let text = TextDef::read(stream, tag)?;
    ctx.add_character(id, Character::Text(Arc::new(text)));
    Ok(())
}

/// DefineEditText. The font is resolved on first use.
pub fn define_edit_text_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    parse_trace!("  edit_text_char, id = {}", id);
    let def = EditTextDef::read(stream, ctx.font_resolver())?;
    ctx.add_character(id, Character::EditText(Arc::new(def)));
    Ok(())
}

/// DefineButton and DefineButton2.
pub fn define_button_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    parse_trace!("  button character loader: char_id = {}", id);
    let button = ButtonDef::read(stream, tag, ctx)?;
    ctx.add_character(id, Character::Button(Arc::new(button)));
    Ok(())
}

/// DefineButtonSound.
pub fn define_button_sound_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let button = match ctx.get_button(id) {
        Some(button) => button,
        None => {
            malformed!("DEFINEBUTTONSOUND refers to an unknown button id {}", id);
            return Ok(());
        }
    };
    if button.sound.is_some() {
        malformed!("Attempt to redefine button sound ignored");
        return Ok(());
    }
    let sound = ButtonSoundDef::read(stream, ctx)?;
    let mut amended = ButtonDef::clone(&button);
    amended.sound = Some(sound);
    ctx.replace(id, Character::Button(Arc::new(amended)));
    Ok(())
}

/// DefineButtonCxform.
pub fn define_button_cxform_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let button = match ctx.get_button(id) {
        Some(button) => button,
        None => {
            malformed!("DEFINEBUTTONCXFORM refers to an unknown button id {}", id);
            return Ok(());
        }
    };
    let mut amended = ButtonDef::clone(&button);
    amended.read_cxform(stream)?;
    ctx.replace(id, Character::Button(Arc::new(amended)));
    Ok(())
}

/// JPEGTables.
pub fn jpeg_tables_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let tables = bitmap::read_jpeg_tables(stream)?;
    parse_trace!("  jpeg_tables_loader: {} bytes", tables.len());
    if tables.is_empty() {
        // Some encoders emit an empty tag when every DefineBits is complete.
        return Ok(());
    }
    ctx.set_jpeg_tables(tables);
    Ok(())
}

/// DefineBits, DefineBitsJPEG2 and DefineBitsJPEG3.
pub fn define_bits_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let tables = if tag == TagType::DEFINE_BITS {
        ctx.jpeg_tables()
    } else {
        None
    };
    let jpeg = JpegBitmap::read(stream, tag, tables)?;
    parse_trace!("  {}: id = {}, {:?}, {} bytes", tag, id, jpeg.format, jpeg.data.len());
    ctx.add_character(id, Character::Bitmap(Arc::new(BitmapDef::Jpeg(jpeg))));
    Ok(())
}

/// DefineBitsLossless and DefineBitsLossless2.
pub fn define_bits_lossless_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let id = read_id(stream)?;
    let bitmap = LosslessBitmap::read(stream, tag)?;
    ctx.add_character(id, Character::Bitmap(Arc::new(BitmapDef::Lossless(bitmap))));
    Ok(())
}

/// DefineSprite. The nested tags get their own dictionary and timeline.
pub fn define_sprite_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    stream.ensure_bytes(4)?;
    let id = CharacterId(stream.read_u16()?);
    let frame_count = stream.read_u16()?;
    parse_trace!("  sprite: char id = {}, frames = {}", id, frame_count);

    if ctx.sprite_depth() >= ctx.options().max_sprite_depth {
        malformed!(
            "DefineSprite {} nested deeper than {} levels, skipped",
            id,
            ctx.options().max_sprite_depth
        );
        return Ok(());
    }
    if frame_count == 0 {
        malformed!("DefineSprite {} advertises no frames", id);
    }

    let dictionary = Arc::new(Dictionary::new());
    let timeline = Timeline::new(frame_count);
    {
        let mut sprite_ctx = ctx.sprite(dictionary.clone(), &timeline);
        if let Err(err) = tag::read_tags(stream, &mut sprite_ctx) {
            log::error!("Error while parsing tags of sprite {}: {}", id, err);
        }
    }

    let sprite = SpriteDefinition::new(id, dictionary, timeline);
    ctx.add_character(id, Character::Sprite(Arc::new(sprite)));
    Ok(())
}

/// FrameLabel.
pub fn frame_label_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let label = stream.read_string()?;
    parse_trace!("  frame_label_loader: {}", label);
    ctx.add_frame_name(&label);

    if stream.bytes_left() > 0 {
        stream.ensure_bytes(1)?;
        if stream.read_u8()? == 1 {
            unimplemented_once!("anchor-labeled frame not supported");
        }
    }
    Ok(())
}

/// ExportAssets.
pub fn export_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    if ctx.is_sprite() {
        malformed!("EXPORT tag inside DEFINESPRITE");
    }
    stream.ensure_bytes(2)?;
    let count = stream.read_u16()?;
    parse_trace!("  export: count = {}", count);

    for _ in 0..count {
        let id = read_id(stream)?;
        let name = stream.read_string()?;
        parse_trace!("  export: id = {}, name = {}", id, name);
        if ctx.get_character(id).is_none() {
            malformed!("don't know how to export resource '{}' with id {}", name, id);
        }
        ctx.add_export(&name, id);
    }
    Ok(())
}

/// SetBackgroundColor.
pub fn set_background_color_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let color = Rgba::read_rgb(stream)?;
    parse_trace!("  set_background_color: {:?}", color);
    ctx.set_background_color(color);
    Ok(())
}

/// FileAttributes.
pub fn file_attributes_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    stream.ensure_bytes(4)?;
    let attributes = FileAttributes::from_bits(stream.read_u32()?);
    parse_trace!("  file attributes: {:?}", attributes);
    if ctx.is_sprite() {
        malformed!("FileAttributes tag inside DEFINESPRITE");
    }
    ctx.set_file_attributes(attributes);
    Ok(())
}

/// Metadata.
pub fn metadata_loader(stream: &mut SwfStream, _tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    let metadata = stream.read_string()?;
    parse_trace!("  metadata: {} bytes", metadata.len());
    ctx.set_metadata(metadata);
    Ok(())
}

/// Protect and other tags read only to be dropped.
pub fn null_loader(_stream: &mut SwfStream, tag: TagType, _ctx: &mut LoadContext) -> Result<()> {
    parse_trace!("  ignoring {}", tag);
    Ok(())
}

/// Adds every loader in this module to `table`.
pub fn register_all(table: &mut TagLoadersTable) {
    let loaders: &[(TagType, tag::TagLoader)] = &[
        (TagType::DEFINE_SHAPE, define_shape_loader),
        (TagType::DEFINE_SHAPE2, define_shape_loader),
        (TagType::DEFINE_SHAPE3, define_shape_loader),
        (TagType::DEFINE_SHAPE4, define_shape_loader),
        (TagType::DEFINE_MORPH_SHAPE, define_morph_shape_loader),
        (TagType::DEFINE_MORPH_SHAPE2, define_morph_shape_loader),
        (TagType::DEFINE_FONT, define_font_loader),
        (TagType::DEFINE_FONT2, define_font_loader),
        (TagType::DEFINE_FONT3, define_font_loader),
        (TagType::DEFINE_FONT_INFO, define_font_info_loader),
        (TagType::DEFINE_FONT_INFO2, define_font_info_loader),
        (TagType::DEFINE_FONT_NAME, define_font_name_loader),
        (TagType::DEFINE_TEXT, define_text_loader),
        (TagType::DEFINE_TEXT2, define_text_loader),
        (TagType::DEFINE_EDIT_TEXT, define_edit_text_loader),
        (TagType::DEFINE_BUTTON, define_button_loader),
        (TagType::DEFINE_BUTTON2, define_button_loader),
        (TagType::DEFINE_BUTTON_SOUND, define_button_sound_loader),
        (TagType::DEFINE_BUTTON_CXFORM, define_button_cxform_loader),
        (TagType::JPEG_TABLES, jpeg_tables_loader),
        (TagType::DEFINE_BITS, define_bits_loader),
        (TagType::DEFINE_BITS_JPEG2, define_bits_loader),
        (TagType::DEFINE_BITS_JPEG3, define_bits_loader),
        (TagType::DEFINE_BITS_LOSSLESS, define_bits_lossless_loader),
        (TagType::DEFINE_BITS_LOSSLESS2, define_bits_lossless_loader),
        (TagType::DEFINE_SPRITE, define_sprite_loader),
        (TagType::FRAME_LABEL, frame_label_loader),
        (TagType::EXPORT_ASSETS, export_loader),
        (TagType::SET_BACKGROUND_COLOR, set_background_color_loader),
        (TagType::FILE_ATTRIBUTES, file_attributes_loader),
        (TagType::METADATA, metadata_loader),
        (TagType::PROTECT, null_loader),
    ];
    for &(tag, loader) in loaders {
        if !table.register(tag, loader) {
            log::warn!("Loader for tag {} registered twice", tag);
        }
    }
}
