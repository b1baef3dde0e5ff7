use std::io::{self, BufReader, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use lzma_rs::decompress::{Options, UnpackedSize};

use crate::error::Error;
use crate::Signature;

enum Inner<R: Read> {
    Raw(R),
    Zlib(ZlibDecoder<R>),
    Lzma(Cursor<Vec<u8>>),
}

/// Handles decompressing swf innards and reading the results.
pub struct DecodedSwf<R: Read> {
    inner: Inner<R>,
}

impl<R: Read> DecodedSwf<R> {
    /// Takes a reader positioned just after the 8 byte prologue and the swf
    /// signature, and returns a DecodedSwf that handles all the compression
    /// for you. `file_length` is the uncompressed length from the prologue.
    pub fn decompress(mut reader: R, sig: Signature, file_length: u32) -> Result<Self, Error> {
        let inner = match sig {
            Signature::Uncompressed => Inner::Raw(reader),
            Signature::ZlibCompressed => Inner::Zlib(ZlibDecoder::new(reader)),
            Signature::LzmaCompressed => {
                // ZWS layout: compressed length, the 5 LZMA property bytes,
                // then a raw stream with no size field.
                let compressed_length = reader.read_u32::<LittleEndian>()?;
                let mut props = [0u8; 5];
                reader.read_exact(&mut props)?;

                let unpacked = (file_length as u64).saturating_sub(8);
                log::debug!(
                    "LZMA body: {} bytes compressed, {} expected",
                    compressed_length,
                    unpacked
                );
                let options = Options {
                    unpacked_size: UnpackedSize::UseProvided(Some(unpacked)),
                    ..Options::default()
                };
                let mut input = BufReader::new((&props[..]).chain(reader));
                // Both lengths come from the file; let the buffer grow with
                // what actually decodes.
                let mut out = Vec::new();
                lzma_rs::lzma_decompress_with_options(&mut input, &mut out, &options)?;
                Inner::Lzma(Cursor::new(out))
            }
        };
        Ok(DecodedSwf { inner })
    }
}

impl<R: Read> Read for DecodedSwf<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            Inner::Raw(ref mut f) => f.read(buf),
            Inner::Zlib(ref mut f) => f.read(buf),
            Inner::Lzma(ref mut f) => f.read(buf),
        }
    }
}
