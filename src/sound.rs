//! Event sounds, streaming sound headers and blocks.
//!
//! Decoding is up to the host's `SoundHandler`. The loaders here only work
//! out the format and hand over the encoded bytes; what gets stored in the
//! dictionary is the handle the sound handler gave back, not the SWF id.

use std::fmt;

use crate::error::Result;
use crate::movie::{CharacterId, LoadContext};
use crate::stream::SwfStream;
use crate::tag::TagType;

const SAMPLE_RATES: [u32; 4] = [5512, 11025, 22050, 44100];

/// Sample rate for a SWF rate index. Out of range indices are reported and
/// treated as 0.
pub fn sample_rate_from_index(index: u32) -> u32 {
    match SAMPLE_RATES.get(index as usize) {
        Some(&rate) => rate,
        None => {
            malformed!(
                "sound sample rate index {} (expected 0 to {})",
                index,
                SAMPLE_RATES.len() - 1
            );
            SAMPLE_RATES[0]
        }
    }
}

/// The SoundFormat field of sound tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    /// Uncompressed PCM in the platform's byte order.
    Raw,
    /// Flash ADPCM.
    Adpcm,
    /// MP3.
    Mp3,
    /// Uncompressed little-endian PCM.
    Uncompressed,
    /// Nellymoser at 16kHz.
    Nellymoser16,
    /// Nellymoser at 8kHz.
    Nellymoser8,
    /// Nellymoser at the tag's rate.
    Nellymoser,
    /// Speex.
    Speex,
    /// A format code this crate doesn't know.
    Unknown(u8),
}

impl From<u32> for AudioCodec {
    fn from(id: u32) -> Self {
        match id {
            0 => AudioCodec::Raw,
            1 => AudioCodec::Adpcm,
            2 => AudioCodec::Mp3,
            3 => AudioCodec::Uncompressed,
            4 => AudioCodec::Nellymoser16,
            5 => AudioCodec::Nellymoser8,
            6 => AudioCodec::Nellymoser,
            11 => AudioCodec::Speex,
            other => AudioCodec::Unknown(other as u8),
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AudioCodec::Raw => write!(f, "raw"),
            AudioCodec::Adpcm => write!(f, "ADPCM"),
            AudioCodec::Mp3 => write!(f, "MP3"),
            AudioCodec::Uncompressed => write!(f, "uncompressed"),
            AudioCodec::Nellymoser16 => write!(f, "Nellymoser 16kHz"),
            AudioCodec::Nellymoser8 => write!(f, "Nellymoser 8kHz"),
            AudioCodec::Nellymoser => write!(f, "Nellymoser"),
            AudioCodec::Speex => write!(f, "Speex"),
            AudioCodec::Unknown(id) => write!(f, "unknown codec {}", id),
        }
    }
}

/// Format of an event sound or a sound stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoundInfo {
    /// Encoding of the samples.
    pub codec: AudioCodec,
    /// Samples per second.
    pub sample_rate: u32,
    /// Total sample count, or samples per block for a stream.
    pub sample_count: u32,
    /// 16 rather than 8 bit samples.
    pub is_16bit: bool,
    /// Two channels.
    pub stereo: bool,
    /// MP3 only. Positive values skip samples at the start, negative ones
    /// play silence first.
    pub delay_seek: i16,
}

/// Receives encoded sounds. Implemented by the host's audio backend.
pub trait SoundHandler: Send + Sync {
    /// Registers a sound and returns its handle. `data` is `None` for a
    /// sound stream, whose data arrives later through `append_sound`.
    fn create_sound(&self, data: Option<Vec<u8>>, info: SoundInfo) -> Option<i32>;

    /// Adds a block to a sound stream created with `create_sound(None, ..)`.
    fn append_sound(&self, handle: i32, data: Vec<u8>);
}

/// Decoder preferences shared by sound and video handlers.
pub trait MediaHandler: Send + Sync {
    /// Bytes of zeroed slack decoders may read past the end of their input.
    fn input_padding_size(&self) -> usize {
        0
    }
}

/// An event sound as stored in the dictionary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoundSample {
    /// Handle returned by `SoundHandler::create_sound`.
    pub handler_id: i32,
}

/// The stream a timeline is currently loading blocks into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoundStreamHead {
    /// Handle returned by `SoundHandler::create_sound`.
    pub handler_id: i32,
    /// Format from the head tag.
    pub info: SoundInfo,
}

/// One point of a volume envelope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoundEnvelope {
    /// Position in 44kHz samples.
    pub position: u32,
    /// Left channel level, 0 to 32768.
    pub left_level: u16,
    /// Right channel level, 0 to 32768.
    pub right_level: u16,
}

/// How a sound is started: SWF's SOUNDINFO record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoundStyle {
    /// Stop the sound instead of starting it.
    pub stop_playback: bool,
    /// Don't start if already playing.
    pub no_multiple: bool,
    /// First sample to play.
    pub in_point: Option<u32>,
    /// Sample to stop at.
    pub out_point: Option<u32>,
    /// Loop count, 0 when the record has none.
    pub loop_count: u16,
    /// Volume envelope points.
    pub envelopes: Vec<SoundEnvelope>,
}

impl SoundStyle {
    /// Reads a SOUNDINFO record.
    pub fn read(stream: &mut SwfStream) -> Result<SoundStyle> {
        stream.ensure_bytes(1)?;
        let flags = stream.read_u8()?;
        let mut style = SoundStyle {
            stop_playback: flags & 0x20 != 0,
            no_multiple: flags & 0x10 != 0,
            ..SoundStyle::default()
        };
        let has_envelope = flags & 0x08 != 0;
        let has_loops = flags & 0x04 != 0;
        let has_out_point = flags & 0x02 != 0;
        let has_in_point = flags & 0x01 != 0;

        if has_in_point {
            stream.ensure_bytes(4)?;
            style.in_point = Some(stream.read_u32()?);
        }
        if has_out_point {
            stream.ensure_bytes(4)?;
            style.out_point = Some(stream.read_u32()?);
        }
        if has_loops {
            stream.ensure_bytes(2)?;
            style.loop_count = stream.read_u16()?;
        }
        if has_envelope {
            stream.ensure_bytes(1)?;
            let count = stream.read_u8()? as usize;
            stream.ensure_bytes(count * 8)?;
            for _ in 0..count {
                style.envelopes.push(SoundEnvelope {
                    position: stream.read_u32()?,
                    left_level: stream.read_u16()?,
                    right_level: stream.read_u16()?,
                });
            }
        }
        Ok(style)
    }
}

/// DefineSound.
pub fn define_sound_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    debug_assert_eq!(tag, TagType::DEFINE_SOUND);

    stream.ensure_bytes(2 + 1 + 4)?;
    let id = CharacterId(stream.read_u16()?);
    let codec = AudioCodec::from(stream.read_uint(4)?);
    let sample_rate = sample_rate_from_index(stream.read_uint(2)?);
    let is_16bit = stream.read_bit()?;
    let stereo = stream.read_bit()?;
    let sample_count = stream.read_u32()?;

    let mut delay_seek = 0;
    if codec == AudioCodec::Mp3 {
        stream.ensure_bytes(2)?;
        delay_seek = stream.read_s16()?;
        if delay_seek != 0 {
            unimplemented_once!("MP3 delay seek");
        }
    }

    parse_trace!(
        "define sound: ch={}, format={}, rate={}, 16={}, stereo={}, ct={}",
        id,
        codec,
        sample_rate,
        is_16bit,
        stereo,
        sample_count
    );

    let handler = match ctx.services().sound_handler.clone() {
        Some(handler) => handler,
        None => {
            log::error!(
                "There is no sound handler currently active, so character with id {} \
                 will NOT be added to the dictionary",
                id
            );
            return Ok(());
        }
    };

    let length = stream.bytes_left();
    let mut data = Vec::with_capacity(length + ctx.services().input_padding());
    data.extend_from_slice(stream.read_bytes(length)?);

    let info = SoundInfo {
        codec,
        sample_rate,
        sample_count,
        is_16bit,
        stereo,
        delay_seek,
    };
    if let Some(handler_id) = handler.create_sound(Some(data), info) {
        ctx.add_sound_sample(id, SoundSample { handler_id });
    }
    Ok(())
}

/// SoundStreamHead and SoundStreamHead2.
pub fn sound_stream_head_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    debug_assert!(tag == TagType::SOUND_STREAM_HEAD || tag == TagType::SOUND_STREAM_HEAD2);

    let handler = match ctx.services().sound_handler.clone() {
        Some(handler) => handler,
        None => return Ok(()),
    };

    stream.ensure_bytes(4)?;
    stream.read_uint(4)?;
    let playback_rate = sample_rate_from_index(stream.read_uint(2)?);
    let playback_16bit = stream.read_bit()?;
    let playback_stereo = stream.read_bit()?;

    let codec_id = stream.read_uint(4)?;
    let rate_index = stream.read_uint(2)?;
    let is_16bit = stream.read_bit()?;
    let stereo = stream.read_bit()?;

    // An all-zero format continues the current stream.
    if codec_id == 0 && rate_index == 0 && !is_16bit && !stereo {
        return Ok(());
    }

    let codec = AudioCodec::from(codec_id);
    let sample_rate = sample_rate_from_index(rate_index);

    if playback_rate != sample_rate {
        unimplemented_once!(
            "Different stream/playback sound rate ({}/{}). This seems common in SWF files, \
             so we'll warn only once.",
            sample_rate,
            playback_rate
        );
    }
    if playback_16bit != is_16bit {
        unimplemented_once!("Different stream/playback sample size");
    }
    if playback_stereo != stereo {
        unimplemented_once!("Different stream/playback channels");
    }

    let sample_count = stream.read_u16()? as u32;
    if sample_count == 0 {
        malformed!("No samples advertised for sound stream");
    }

    let mut latency = 0;
    if codec == AudioCodec::Mp3 {
        match stream.ensure_bytes(2) {
            Ok(()) => {
                latency = stream.read_s16()?;
                if latency != 0 {
                    unimplemented_once!("MP3 sound stream latency seek");
                }
            }
            Err(_) => malformed!("MP3 sound stream lacks a 'latency' field"),
        }
    }

    parse_trace!(
        "sound stream head: format={}, rate={}, 16={}, stereo={}, ct={}, latency={}",
        codec,
        sample_rate,
        is_16bit,
        stereo,
        sample_count,
        latency
    );

    let info = SoundInfo {
        codec,
        sample_rate,
        sample_count,
        is_16bit,
        stereo,
        delay_seek: latency,
    };
    match handler.create_sound(None, info) {
        Some(handler_id) => ctx.set_loading_sound_stream(Some(SoundStreamHead { handler_id, info })),
        None => ctx.set_loading_sound_stream(None),
    }
    Ok(())
}

/// SoundStreamBlock: appends to the stream opened by the last head on this
/// timeline.
pub fn sound_stream_block_loader(stream: &mut SwfStream, tag: TagType, ctx: &mut LoadContext) -> Result<()> {
    debug_assert_eq!(tag, TagType::SOUND_STREAM_BLOCK);

    let handler = match ctx.services().sound_handler.clone() {
        Some(handler) => handler,
        None => return Ok(()),
    };
    let head = match ctx.loading_sound_stream() {
        Some(head) => head,
        None => {
            malformed!("SoundStreamBlock without a preceding SoundStreamHead");
            return Ok(());
        }
    };

    if head.info.codec == AudioCodec::Mp3 {
        // sample count and seek samples
        stream.ensure_bytes(4)?;
        stream.read_u16()?;
        stream.read_s16()?;
    }

    let length = stream.bytes_left();
    if length == 0 {
        return Ok(());
    }
    let mut data = Vec::with_capacity(length + ctx.services().input_padding());
    data.extend_from_slice(stream.read_bytes(length)?);
    handler.append_sound(head.handler_id, data);
    Ok(())
}
