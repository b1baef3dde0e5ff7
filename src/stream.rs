//! A cursor over the decompressed tag stream.
//!
//! SWF mixes byte-aligned little-endian integers with MSB-first bit fields,
//! so the reader keeps a partially consumed byte around. Every aligned read
//! drops the leftover bits of that byte first.
//!
//! The reader also keeps a stack of open tag boundaries. Reads and seeks are
//! never allowed to leave the innermost open tag, which is what keeps one
//! broken tag from spilling into the next.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Where a tag lives in the stream, as read from its header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TagBounds {
    /// Offset of the tag header.
    pub start: usize,
    /// Offset one past the last byte of the tag body.
    pub end: usize,
}

/// Reads SWF primitives from a byte buffer, keeping track of the tags
/// being read so that no read crosses the end of the innermost one.
#[derive(Debug)]
pub struct SwfStream<'a> {
    data: &'a [u8],
    pos: usize,
    current_byte: u8,
    unused_bits: u8,
    tag_bounds: Vec<TagBounds>,
}

impl<'a> SwfStream<'a> {
    /// A stream at the start of `data`, outside of any tag.
    pub fn new(data: &'a [u8]) -> Self {
        SwfStream {
            data,
            pos: 0,
            current_byte: 0,
            unused_bits: 0,
            tag_bounds: Vec::new(),
        }
    }

    /// Fails unless `needed` more bytes can be read before the end of the
    /// current tag. Call it before every group of fixed-size reads.
    pub fn ensure_bytes(&self, needed: usize) -> Result<()> {
        let left = self.get_tag_end_position().saturating_sub(self.pos);
        if left < needed {
            return Err(Error::PrematureEnd { needed, left });
        }
        Ok(())
    }

    /// Bit-level counterpart of `ensure_bytes`, counting the bits still
    /// pending in the current byte.
    pub fn ensure_bits(&self, needed: usize) -> Result<()> {
        let bytes_left = self.get_tag_end_position().saturating_sub(self.pos);
        let left = bytes_left * 8 + self.unused_bits as usize;
        if left < needed {
            return Err(Error::PrematureEnd { needed, left });
        }
        Ok(())
    }

    /// Drops whatever is left of a partially read byte.
    pub fn align(&mut self) {
        self.unused_bits = 0;
    }

    fn next_byte(&mut self) -> Result<u8> {
        if self.pos >= self.get_tag_end_position() {
            return Err(Error::PrematureEnd { needed: 1, left: 0 });
        }
        let byte = *self.data.get(self.pos).ok_or(Error::EndOfStream)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        self.align();
        let left = self.get_tag_end_position().saturating_sub(self.pos);
        if left < count {
            return Err(Error::PrematureEnd { needed: count, left });
        }
        let end = self.pos + count;
        let bytes = self.data.get(self.pos..end).ok_or(Error::EndOfStream)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Reads one bit of a bit field, most significant first.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.unused_bits == 0 {
            self.current_byte = self.next_byte()?;
            self.unused_bits = 8;
        }
        self.unused_bits -= 1;
        Ok((self.current_byte >> self.unused_bits) & 1 != 0)
    }

    /// Reads an unsigned bit field of up to 32 bits, most significant bit
    /// first.
    pub fn read_uint(&mut self, bitcount: u32) -> Result<u32> {
        if bitcount > 32 {
            return Err(Error::corrupted("Unexpectedly long value advertised."));
        }
        let mut value: u64 = 0;
        for _ in 0..bitcount {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value as u32)
    }

    /// Reads a two's complement bit field of up to 32 bits.
    pub fn read_sint(&mut self, bitcount: u32) -> Result<i32> {
        let value = self.read_uint(bitcount)?;
        if bitcount == 0 || bitcount == 32 {
            return Ok(value as i32);
        }
        if value & (1 << (bitcount - 1)) != 0 {
            Ok((value | (!0u32 << bitcount)) as i32)
        } else {
            Ok(value as i32)
        }
    }

    /// Byte reads align to the next whole byte first.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.align();
        self.next_byte()
    }

    /// Reads one byte, signed.
    pub fn read_s8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a little-endian unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    /// Reads a little-endian signed 16-bit integer.
    pub fn read_s16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    /// Reads a little-endian unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Reads a little-endian signed 32-bit integer.
    pub fn read_s32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// 16.16 signed fixed point.
    pub fn read_fixed(&mut self) -> Result<f32> {
        Ok((self.read_s32()? as f64 / 65536.0) as f32)
    }

    /// 16.16 unsigned fixed point.
    pub fn read_ufixed(&mut self) -> Result<f32> {
        Ok((self.read_u32()? as f64 / 65536.0) as f32)
    }

    /// 8.8 unsigned fixed point.
    pub fn read_short_ufixed(&mut self) -> Result<f32> {
        Ok(self.read_u16()? as f32 / 256.0)
    }

    /// 8.8 signed fixed point.
    pub fn read_short_sfixed(&mut self) -> Result<f32> {
        Ok(self.read_s16()? as f32 / 256.0)
    }

    /// IEEE single precision, little-endian.
    pub fn read_long_float(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// A count byte, escaped to a u16 when it reads 0xFF.
    pub fn read_variable_count(&mut self) -> Result<u16> {
        self.ensure_bytes(1)?;
        let count = self.read_u8()?;
        if count == 0xFF {
            self.ensure_bytes(2)?;
            return self.read_u16();
        }
        Ok(count as u16)
    }

    /// Borrows the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Reads a NUL-terminated string. The terminator is consumed but not
    /// stored.
    pub fn read_string(&mut self) -> Result<String> {
        self.align();
        let mut bytes = Vec::new();
        loop {
            self.ensure_bytes(1)?;
            match self.next_byte()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a string prefixed by its length in one byte.
    pub fn read_string_with_length(&mut self) -> Result<String> {
        self.align();
        self.ensure_bytes(1)?;
        let len = self.read_u8()? as usize;
        self.read_string_of_length(len)
    }

    /// Reads `len` bytes as a string, dropping trailing NULs, which some
    /// authoring tools leave in length-prefixed strings.
    pub fn read_string_of_length(&mut self, len: usize) -> Result<String> {
        self.ensure_bytes(len)?;
        let bytes = self.take(len)?;
        let trimmed = match bytes.iter().rposition(|&b| b != 0) {
            Some(last) => &bytes[..=last],
            None => &bytes[..0],
        };
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    /// Current byte offset.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Moves to an absolute offset. Refuses, returning false, to leave the
    /// innermost open tag or the buffer.
    pub fn seek(&mut self, pos: usize) -> bool {
        self.align();
        if let Some(bounds) = self.tag_bounds.last() {
            if pos > bounds.end {
                log::error!("Attempt to seek past the end of an opened tag");
                return false;
            }
            if pos < bounds.start {
                log::error!("Attempt to seek before start of an opened tag");
                return false;
            }
        }
        if pos > self.data.len() {
            malformed!("Unexpected end of stream");
            return false;
        }
        self.pos = pos;
        true
    }

    /// Skips forward, with the same limits as `seek`.
    pub fn skip_bytes(&mut self, count: usize) -> bool {
        let target = self.pos + count;
        self.seek(target)
    }

    /// One past the last byte the current tag may use, or the end of the
    /// buffer outside of any tag.
    pub fn get_tag_end_position(&self) -> usize {
        match self.tag_bounds.last() {
            Some(bounds) => bounds.end,
            None => self.data.len(),
        }
    }

    /// Bytes left before the end of the innermost open tag.
    pub fn bytes_left(&self) -> usize {
        self.get_tag_end_position().saturating_sub(self.pos)
    }

    /// Number of tags currently open.
    pub fn tag_depth(&self) -> usize {
        self.tag_bounds.len()
    }

    /// Reads a tag header and pushes its bounds. Returns the raw tag code and
    /// the bounds.
    pub fn open_tag(&mut self) -> Result<(u16, TagBounds)> {
        self.align();
        let start = self.pos;
        self.ensure_bytes(2)?;
        let header = self.read_u16()?;
        let code = header >> 6;
        let mut length = (header & 0x3F) as usize;
        if length == 0x3F {
            self.ensure_bytes(4)?;
            length = self.read_u32()? as usize;
        }

        let mut end = self.pos.checked_add(length).ok_or_else(|| {
            Error::corrupted(format!(
                "Invalid tag end position advertised (tag length {}).",
                length
            ))
        })?;

        if let Some(container) = self.tag_bounds.last() {
            if end > container.end {
                malformed!(
                    "Tag {} starting at offset {} is advertised to end at offset {}, \
                     which is after end of previously opened tag starting at offset {} \
                     and ending at offset {}. Making it end where container tag ends.",
                    code,
                    start,
                    end,
                    container.start,
                    container.end
                );
                end = container.end;
            }
        }

        let bounds = TagBounds { start, end };
        self.tag_bounds.push(bounds);
        parse_trace!(
            "SWF[{}]: tag type = {}, tag length = {}, end tag = {}",
            start,
            code,
            length,
            end
        );
        Ok((code, bounds))
    }

    /// Pops the innermost tag and moves to its end, whatever the loader left
    /// unread.
    pub fn close_tag(&mut self) -> Result<()> {
        let bounds = self
            .tag_bounds
            .pop()
            .ok_or_else(|| Error::corrupted("close_tag called with no open tag"))?;
        self.unused_bits = 0;
        if bounds.end > self.data.len() {
            self.pos = self.data.len();
            return Err(Error::corrupted("Could not seek to reported end of tag"));
        }
        self.pos = bounds.end;
        Ok(())
    }

    /// Seeks to the end of the innermost open tag.
    pub fn skip_to_tag_end(&mut self) {
        let end = self.get_tag_end_position();
        self.seek(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let data = [0x34, 0x12, 0xFE, 0xFF, 0x78, 0x56, 0x34, 0x12];
        let mut s = SwfStream::new(&data);
        assert_eq!(s.read_u16().unwrap(), 0x1234);
        assert_eq!(s.read_s16().unwrap(), -2);
        assert_eq!(s.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(s.tell(), 8);
    }

    #[test]
    fn reads_bit_fields_msb_first() {
        let data = [0b1011_0011, 0b1000_0000];
        let mut s = SwfStream::new(&data);
        assert!(s.read_bit().unwrap());
        assert_eq!(s.read_uint(3).unwrap(), 0b011);
        // spans the byte boundary: 0011 then 1
        assert_eq!(s.read_sint(5).unwrap(), 7);
        assert_eq!(s.read_sint(2).unwrap(), 0);
        s.align();
        assert_eq!(s.tell(), 2);
    }

    #[test]
    fn sign_extends() {
        let data = [0b1110_0000];
        let mut s = SwfStream::new(&data);
        assert_eq!(s.read_sint(3).unwrap(), -1);
    }

    #[test]
    fn aligned_read_discards_pending_bits() {
        let data = [0xFF, 0x2A];
        let mut s = SwfStream::new(&data);
        s.read_uint(3).unwrap();
        assert_eq!(s.read_u8().unwrap(), 0x2A);
    }

    #[test]
    fn fixed_point_formats() {
        let data = [
            0x00, 0x80, 0x01, 0x00, // 1.5 as 16.16
            0x80, 0x01, // 1.5 as 8.8
            0x00, 0xFF, // -1.0 as signed 8.8
        ];
        let mut s = SwfStream::new(&data);
        assert_eq!(s.read_fixed().unwrap(), 1.5);
        assert_eq!(s.read_short_ufixed().unwrap(), 1.5);
        assert_eq!(s.read_short_sfixed().unwrap(), -1.0);
    }

    #[test]
    fn strings() {
        let data = b"abc\0\x05hi\0\0\0";
        let mut s = SwfStream::new(data);
        assert_eq!(s.read_string().unwrap(), "abc");
        assert_eq!(s.read_string_with_length().unwrap(), "hi");
        assert_eq!(s.bytes_left(), 0);
    }

    #[test]
    fn ensure_bytes_is_bounded_by_the_open_tag() {
        // tag 9, length 3, then 4 more bytes of the next tag
        let data = [0x43, 0x02, 1, 2, 3, 0, 0, 0, 0];
        let mut s = SwfStream::new(&data);
        let (code, bounds) = s.open_tag().unwrap();
        assert_eq!(code, 9);
        assert_eq!(bounds, TagBounds { start: 0, end: 5 });
        assert!(s.ensure_bytes(3).is_ok());
        match s.ensure_bytes(4) {
            Err(Error::PrematureEnd { needed: 4, left: 3 }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.read_u32().is_err());
        s.close_tag().unwrap();
        assert_eq!(s.tell(), 5);
    }

    #[test]
    fn long_tag_header() {
        let mut data = vec![0x7F, 0x02, 70, 0, 0, 0];
        data.extend(vec![0u8; 70]);
        let mut s = SwfStream::new(&data);
        let (code, bounds) = s.open_tag().unwrap();
        assert_eq!(code, 9);
        assert_eq!(bounds.end, 76);
    }

    #[test]
    fn seek_is_refused_outside_the_tag() {
        let data = [0x42, 0x00, 0xAA, 0xBB, 0xCC];
        let mut s = SwfStream::new(&data);
        s.open_tag().unwrap();
        assert!(!s.seek(5));
        assert!(s.seek(4));
        assert!(s.seek(0));
        assert_eq!(s.tell(), 0);
    }

    #[test]
    fn nested_tag_is_clamped_to_its_container() {
        // outer tag 39 with 4 bytes; inner header claims 10 bytes
        let data = [0xC4, 0x09, 0x0A, 0x00, 0, 0];
        let mut s = SwfStream::new(&data);
        s.open_tag().unwrap();
        let (_, inner) = s.open_tag().unwrap();
        assert_eq!(inner.end, 6);
    }

    #[test]
    fn close_tag_past_buffer_is_an_error() {
        let data = [0x4A, 0x00, 1, 2];
        let mut s = SwfStream::new(&data);
        s.open_tag().unwrap();
        assert!(s.close_tag().is_err());
    }

    #[test]
    fn oversized_bit_field_is_refused() {
        let data = [0u8; 8];
        let mut s = SwfStream::new(&data);
        assert!(s.read_uint(33).is_err());
        assert_eq!(s.read_uint(32).unwrap(), 0);
    }
}
