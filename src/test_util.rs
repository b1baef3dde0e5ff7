//! Fixture builders and log capture shared by the unit tests.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::geometry::Rect;

/// Writes SWF bit fields MSB first and little-endian integers, the mirror of
/// `SwfStream`.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter::default()
    }

    pub fn bit(&mut self, set: bool) -> &mut Self {
        if self.bit_pos == 0 {
            self.bytes.push(0);
        }
        if set {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> self.bit_pos;
        }
        self.bit_pos = (self.bit_pos + 1) % 8;
        self
    }

    pub fn ubits(&mut self, nbits: u32, value: u32) -> &mut Self {
        for i in (0..nbits).rev() {
            self.bit((value >> i) & 1 != 0);
        }
        self
    }

    pub fn sbits(&mut self, nbits: u32, value: i32) -> &mut Self {
        self.ubits(nbits, value as u32)
    }

    pub fn align(&mut self) -> &mut Self {
        self.bit_pos = 0;
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.align();
        self.bytes.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.align();
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.u16(value as u16)
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.align();
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// 16.16 fixed point.
    pub fn fixed(&mut self, value: f32) -> &mut Self {
        self.u32((value * 65536.0) as i32 as u32)
    }

    /// 8.8 fixed point.
    pub fn fixed8(&mut self, value: f32) -> &mut Self {
        self.u16((value * 256.0) as i16 as u16)
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.align();
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.align();
        self.bytes.extend_from_slice(data);
        self
    }

    /// A NUL-terminated string.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes());
        self.u8(0)
    }

    pub fn rect(&mut self, rect: &Rect) -> &mut Self {
        let nbits = [rect.x_min, rect.x_max, rect.y_min, rect.y_max]
            .iter()
            .map(|&v| signed_bits(v))
            .max()
            .unwrap_or(0);
        self.align();
        self.ubits(5, nbits);
        for &v in &[rect.x_min, rect.x_max, rect.y_min, rect.y_max] {
            self.sbits(nbits, v);
        }
        self.align()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn signed_bits(value: i32) -> u32 {
    let magnitude = if value < 0 { !value } else { value };
    32 - magnitude.leading_zeros() + 1
}

/// Frames a tag body with a short or long header as needed.
pub fn tag(code: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    if body.len() < 0x3F {
        out.extend_from_slice(&((code << 6) | body.len() as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&((code << 6) | 0x3F).to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(body);
    out
}

/// An uncompressed movie: FWS header, 550x400 stage, 24 fps, the given tags
/// and an End tag.
pub fn swf_file(version: u8, frame_count: u16, tags: &[Vec<u8>]) -> Vec<u8> {
    let mut body = BitWriter::new();
    body.rect(&Rect::new(0, 11000, 0, 8000));
    body.u16(24 << 8);
    body.u16(frame_count);
    for t in tags {
        body.bytes(t);
    }
    body.bytes(&tag(0, &[]));
    let body = body.into_bytes();

    let mut out = b"FWS".to_vec();
    out.push(version);
    out.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// DefineShape with an empty outline and no styles.
pub fn empty_shape(id: u16) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.u16(id).rect(&Rect::new(0, 20, 0, 20));
    // fill count, line count, style bits, end record
    w.u8(0).u8(0).u8(0).u8(0);
    tag(2, &w.into_bytes())
}

/// The smallest glyph outline: a SHAPE with one fill bit, one line bit and
/// an immediate end record.
pub const EMPTY_GLYPH: [u8; 2] = [0x10, 0x00];

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(String, Level, String)>>> = RefCell::new(None);
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            if let Some(ref mut entries) = *captured.borrow_mut() {
                entries.push((
                    record.target().to_string(),
                    record.level(),
                    record.args().to_string(),
                ));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Log lines emitted on this thread while `f` ran.
pub struct CapturedLogs(pub Vec<(String, Level, String)>);

impl CapturedLogs {
    pub fn count(&self, target: &str) -> usize {
        self.0.iter().filter(|(t, _, _)| t == target).count()
    }

    pub fn malformed(&self) -> usize {
        self.count(crate::logging::MALFORMED)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|(_, _, msg)| msg.contains(needle))
    }
}

pub fn capture_logs<T, F: FnOnce() -> T>(f: F) -> (T, CapturedLogs) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let result = f();
    let entries = CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default());
    (result, CapturedLogs(entries))
}
