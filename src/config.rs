//! Loader configuration and the collaborators shared by every parse context.

use std::env;
use std::fmt;
use std::sync::Arc;

use crate::font::DeviceFontFactory;
use crate::sound::{MediaHandler, SoundHandler};

/// Knobs controlling how much work the tag loaders do.
#[derive(Clone, Debug, PartialEq)]
pub struct LoaderOptions {
    /// Decode glyph outlines of embedded fonts. When off, DefineFont2/3 skip
    /// straight to the code table and glyphs are left empty.
    pub load_font_shapes: bool,
    /// How deep DefineSprite tags may nest before being skipped.
    pub max_sprite_depth: usize,
    /// Report action buffers that don't end with the END action.
    pub verify_action_end: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            load_font_shapes: true,
            max_sprite_depth: 8,
            verify_action_end: true,
        }
    }
}

impl LoaderOptions {
    /// Defaults, overridden by `SWF_TAGS_LOAD_FONT_SHAPES` (`0`/`false` to
    /// disable) and `SWF_TAGS_MAX_SPRITE_DEPTH`.
    pub fn from_env() -> Self {
        let mut options = LoaderOptions::default();
        if let Ok(value) = env::var("SWF_TAGS_LOAD_FONT_SHAPES") {
            options.load_font_shapes = !matches!(value.trim(), "0" | "false" | "no" | "off");
        }
        if let Ok(value) = env::var("SWF_TAGS_MAX_SPRITE_DEPTH") {
            match value.trim().parse() {
                Ok(depth) => options.max_sprite_depth = depth,
                Err(_) => log::warn!("ignoring bad SWF_TAGS_MAX_SPRITE_DEPTH value {:?}", value),
            }
        }
        options
    }

    /// Whether glyph outlines are parsed or skipped.
    pub fn with_font_shapes(mut self, load: bool) -> Self {
        self.load_font_shapes = load;
        self
    }

    /// Bounds sprite nesting.
    pub fn with_max_sprite_depth(mut self, depth: usize) -> Self {
        self.max_sprite_depth = depth;
        self
    }

    /// Whether action blocks must end with an END action.
    pub fn with_action_end_check(mut self, check: bool) -> Self {
        self.verify_action_end = check;
        self
    }
}

/// External services the loaders hand parsed resources to.
///
/// Cloning is cheap; sprites get a clone of their movie's services.
#[derive(Clone, Default)]
pub struct LoaderServices {
    /// Receives DefineSound payloads and sound streams. Without one, sounds
    /// are not defined.
    pub sound_handler: Option<Arc<dyn SoundHandler>>,
    /// Asked for decoder input padding.
    pub media_handler: Option<Arc<dyn MediaHandler>>,
    /// Creates device glyphs for fonts that have none embedded.
    pub device_fonts: Option<Arc<dyn DeviceFontFactory>>,
}

impl LoaderServices {
    /// Sets the sound handler.
    pub fn with_sound_handler(mut self, handler: Arc<dyn SoundHandler>) -> Self {
        self.sound_handler = Some(handler);
        self
    }

    /// Sets the media handler.
    pub fn with_media_handler(mut self, handler: Arc<dyn MediaHandler>) -> Self {
        self.media_handler = Some(handler);
        self
    }

    /// Sets the device font factory for fonts loaded with these services.
    pub fn with_device_fonts(mut self, factory: Arc<dyn DeviceFontFactory>) -> Self {
        self.device_fonts = Some(factory);
        self
    }

    /// Extra bytes decoders want after an encoded payload.
    pub fn input_padding(&self) -> usize {
        self.media_handler
            .as_ref()
            .map_or(0, |handler| handler.input_padding_size())
    }
}

impl fmt::Debug for LoaderServices {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoaderServices")
            .field("sound_handler", &self.sound_handler.is_some())
            .field("media_handler", &self.media_handler.is_some())
            .field("device_fonts", &self.device_fonts.is_some())
            .finish()
    }
}
