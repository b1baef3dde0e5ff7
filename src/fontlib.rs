//! Process-wide font registry.
//!
//! Holds the device font factory used by fonts that weren't given one, the
//! `_sans` fallback used by text fields whose font can't be resolved, and
//! fonts registered by the host application.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::font::{DeviceFontFactory, Font};

/// Name of the fallback device font.
pub const DEFAULT_FONT_NAME: &str = "_sans";

struct Registry {
    fonts: Vec<Arc<Font>>,
    default_font: Option<Arc<Font>>,
    factory: Option<Arc<dyn DeviceFontFactory>>,
}

static REGISTRY: RwLock<Registry> = RwLock::new(Registry {
    fonts: Vec::new(),
    default_font: None,
    factory: None,
});

fn read() -> RwLockReadGuard<'static, Registry> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, Registry> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner)
}

/// Installs the rasterizer used for device glyphs. The default font is
/// rebuilt on next use so it picks up the new factory.
pub fn set_device_font_factory(factory: Arc<dyn DeviceFontFactory>) {
    let mut registry = write();
    registry.factory = Some(factory);
    registry.default_font = None;
}

/// The factory set by `set_device_font_factory`, if any.
pub fn device_font_factory() -> Option<Arc<dyn DeviceFontFactory>> {
    read().factory.clone()
}

/// The `_sans` device font, created on first use.
pub fn default_font() -> Arc<Font> {
    if let Some(font) = read().default_font.clone() {
        return font;
    }
    let mut registry = write();
    let factory = registry.factory.clone();
    registry
        .default_font
        .get_or_insert_with(|| Arc::new(Font::device(DEFAULT_FONT_NAME, false, false, factory)))
        .clone()
}

/// Registers an application font, findable by `get_font`.
pub fn add_font(font: Arc<Font>) {
    let mut registry = write();
    if registry.fonts.iter().any(|known| Arc::ptr_eq(known, &font)) {
        return;
    }
    registry.fonts.push(font);
}

/// Finds a registered application font by name and style.
pub fn get_font(name: &str, bold: bool, italic: bool) -> Option<Arc<Font>> {
    read()
        .fonts
        .iter()
        .find(|font| font.matches(name, bold, italic))
        .cloned()
}

/// Number of registered application fonts.
pub fn font_count() -> usize {
    read().fonts.len()
}

/// Forgets registered fonts and the default font. The factory stays.
pub fn clear() {
    let mut registry = write();
    registry.fonts.clear();
    registry.default_font = None;
}
