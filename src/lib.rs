//! A library for parsing the tag stream of a .swf file into a dictionary of
//! characters: fonts, shapes, morph shapes, bitmaps, sounds, buttons, static
//! and editable text, and sprites with their own nested dictionaries.
//!
//! * [Github repo](https://github.com/iirelu/swf-headers)
//!
//! Reading starts with [`SwfHeaders`], which parses the prologue of any SWF
//! file and hands back a readable stream of everything after the header
//! with all compression issues sorted out. [`MovieDefinition`] then runs
//! the tag loaders over that stream, either on the calling thread or on a
//! background thread while the dictionary is already being queried.
//!
//! Malformed input is the norm rather than the exception for SWF files, so
//! very little is fatal: a broken tag is logged and skipped, and the next
//! tag is read from where the broken one's header said it ends. Reports go
//! through the `log` facade under the `swf::parse`, `swf::malformed` and
//! `swf::unimplemented` targets.
//!
//! ```rust,no_run
//! use swf_tags::{load_movie, CharacterId, LoaderOptions, LoaderServices};
//!
//! let movie = load_movie("example.swf", LoaderServices::default(), LoaderOptions::from_env())?;
//! if let Some(font) = movie.dictionary().get_font(CharacterId(1)) {
//!     println!("font {} has {} glyphs", font.name(), font.glyph_count());
//! }
//! # Ok::<(), swf_tags::Error>(())
//! ```

#![warn(missing_docs)]

#[macro_use]
pub mod logging;

pub mod bitmap;
pub mod button;
pub mod config;
mod decoded_swf;
mod error;
pub mod filters;
pub mod font;
pub mod fontlib;
pub mod geometry;
pub mod loaders;
pub mod morph;
pub mod movie;
pub mod shape;
pub mod sound;
pub mod stream;
pub mod tag;
pub mod text;

#[cfg(test)]
mod test_util;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

pub use config::{LoaderOptions, LoaderServices};
pub use decoded_swf::DecodedSwf;
pub use error::{Error, Result};
pub use font::Font;
pub use geometry::Rect;
pub use movie::{Character, CharacterId, CharacterKind, Dictionary, MovieDefinition};
pub use stream::SwfStream;
pub use tag::TagType;

/// An enum representing all the valid signatures of a SWF file.
///
/// The first three bytes of a SWF file act as the magic numbers. FWS (SWF
/// backwards) designates an uncompressed file. CWS was introduced with SWF
/// 6, and specifies that all bytes beyond the first 8 are compressed using
/// zlib. ZWS was added with SWF 13, and is the same concept with LZMA
/// instead of zlib.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Signature {
    /// A signature of FWS, meaning an uncompressed SWF file.
    Uncompressed,
    /// A signature of CWS, meaning a zlib-compressed SWF file.
    ZlibCompressed,
    /// A signature of ZWS, meaning an LZMA-compressed SWF file.
    LzmaCompressed,
}

/// The SWF header: the 8 byte prologue plus the stage rectangle, frame
/// rate and frame count that open the (possibly compressed) body.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SwfHeaders {
    signature: Signature,
    version: u8,
    file_length: u32,
    frame_size: Rect,
    frame_rate: u16,
    frame_count: u16,
    header_length: usize,
}

impl SwfHeaders {
    /// Wraps over read_from(), taking a path and opening it for you.
    pub fn open<T: AsRef<Path>>(path: T) -> Result<(Self, DecodedSwf<BufReader<File>>)> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// Parses the headers of a SWF file, returning them along with a
    /// readable DecodedSwf positioned at the first tag.
    pub fn read_from<R: Read>(mut reader: R) -> Result<(Self, DecodedSwf<R>)> {
        // Everything is little endian.
        //
        // Signature: u8. Either 'F', 'C', or 'Z' for uncompressed, zlib, or LZMA respectively
        // Magic number: u8. Always 0x57 ('W')
        // Magic number: u8. Always 0x53 ('S')
        // Version: u8
        // File length: u32, uncompressed
        // Frame size: a variable-length RECT
        // Frame rate: 8.8 fixed point
        // Frame count: u16

        let signature = match reader.read_u8()? {
            b'F' => Signature::Uncompressed,
            b'C' => Signature::ZlibCompressed,
            b'Z' => Signature::LzmaCompressed,
            _ => return Err(Error::NotSwf),
        };

        match (reader.read_u8()?, reader.read_u8()?) {
            (0x57, 0x53) => {}
            _ => return Err(Error::NotSwf),
        }

        let version = reader.read_u8()?;
        let file_length = reader.read_u32::<LittleEndian>()?;

        // From the 8th byte on the rest of the file may be compressed.
        let mut decoded = DecodedSwf::decompress(reader, signature, file_length)?;

        let (frame_size, rect_length) = read_rect(&mut decoded)?;
        let frame_rate = decoded.read_u16::<LittleEndian>()?;
        let frame_count = decoded.read_u16::<LittleEndian>()?;

        let headers = SwfHeaders {
            signature,
            version,
            file_length,
            frame_size,
            frame_rate,
            frame_count,
            header_length: 8 + rect_length + 4,
        };
        log::debug!("{:?}", headers);
        Ok((headers, decoded))
    }

    /// Returns the signature as an enum representing all valid values.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Returns the version number.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the uncompressed total file length in bytes.
    pub fn file_length(&self) -> u32 {
        self.file_length
    }

    /// Bytes before the first tag, once decompressed.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Returns the stage rectangle in twips.
    pub fn frame_size(&self) -> Rect {
        self.frame_size
    }

    /// Returns the dimensions in twips (the measurement unit flash uses, 1/20th of a pixel).
    pub fn dimensions_twips(&self) -> (u32, u32) {
        (
            self.frame_size.width().max(0) as u32,
            self.frame_size.height().max(0) as u32,
        )
    }

    /// Returns the dimensions in pixels (converted from twips, sometimes losing accuracy).
    pub fn dimensions(&self) -> (u32, u32) {
        let (width, height) = self.dimensions_twips();
        (width / 20, height / 20)
    }

    /// Returns the frame rate, fractional part included.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate as f32 / 256.0
    }

    /// Returns the frame count.
    pub fn frame_count(&self) -> u16 {
        self.frame_count
    }
}

/// Reads the variable-length RECT that opens the body, returning it with its
/// length in bytes.
fn read_rect<T: Read>(reader: &mut T) -> Result<(Rect, usize)> {
    let first_byte = reader.read_u8()?;
    let nbits = (first_byte >> 3) as usize;
    let nbytes = (5 + nbits * 4 + 7) / 8;

    let mut bytes = vec![0u8; nbytes];
    bytes[0] = first_byte;
    reader.read_exact(&mut bytes[1..])?;

    let mut stream = SwfStream::new(&bytes);
    Ok((Rect::read(&mut stream)?, nbytes))
}

/// Opens and loads a movie on the calling thread.
pub fn load_movie<T: AsRef<Path>>(
    path: T,
    services: LoaderServices,
    options: LoaderOptions,
) -> Result<MovieDefinition> {
    let path = path.as_ref();
    log::info!("Loading {}", path.display());
    MovieDefinition::load(BufReader::new(File::open(path)?), services, options)
}
