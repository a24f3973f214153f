//! Data-frame header and payload decoding.
//!
//! A data frame is a 32-byte little-endian header followed by
//! `sample_count * 2` bytes of 16-bit samples:
//!
//! ```text
//! [0..2]   magic = 0xA55A
//! [2]      version (currently 1)
//! [3]      flags: 0x01=A, 0x02=B, 0x80=TEST
//! [4..8]   sequence (u32, producer pair counter)
//! [8..12]  timestamp (u32, free-running ms tick, wraps at 2^32)
//! [12..14] sample_count (u16)
//! [14..32] reserved
//! [32..]   samples, little-endian 16-bit
//! ```
//!
//! Whether samples are signed is consumer-defined; they are stored raw as
//! `u16` with [`DataFrame::samples_as_i16`] for the signed view.

use serde::{Deserialize, Serialize};

use super::flags::frame_flags;
use super::stat::StatFrame;
use crate::{Result, StreamError};

/// Data-frame magic, as a little-endian u16.
pub const DATA_MAGIC: u16 = 0xA55A;

/// The first three bytes of every valid data frame on the wire:
/// the magic in little-endian order followed by the protocol version.
pub const DATA_START: [u8; 3] = [0x5A, 0xA5, 0x01];

/// Fixed data-frame header length in bytes.
pub const DATA_HEADER_LEN: usize = 32;

/// Protocol version this decoder understands.
pub const PROTOCOL_VERSION: u8 = 1;

/// Sample channel identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

/// Parsed data-frame header (reserved bytes are not retained).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: u8,
    pub sequence: u32,
    pub timestamp: u32,
    pub sample_count: u16,
}

impl FrameHeader {
    /// Parse a header from the first [`DATA_HEADER_LEN`] bytes of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_HEADER_LEN {
            return Err(StreamError::parse_error(
                "data frame header",
                format!("need {} bytes, have {}", DATA_HEADER_LEN, buf.len()),
            ));
        }
        let magic = read_u16_le(buf, 0)?;
        if magic != DATA_MAGIC {
            return Err(StreamError::parse_error(
                "data frame header",
                format!("bad magic {magic:#06x}, expected {DATA_MAGIC:#06x}"),
            ));
        }
        Ok(Self {
            version: buf[2],
            flags: buf[3],
            sequence: read_u32_le(buf, 4)?,
            timestamp: read_u32_le(buf, 8)?,
            sample_count: read_u16_le(buf, 12)?,
        })
    }

    /// Total on-wire frame length implied by this header.
    pub fn frame_len(&self) -> usize {
        DATA_HEADER_LEN + self.sample_count as usize * 2
    }
}

/// A fully decoded data frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFrame {
    pub header: FrameHeader,
    /// Raw 16-bit little-endian samples; signedness is consumer-defined.
    pub samples: Vec<u16>,
}

impl DataFrame {
    /// Decode a complete frame from `buf`, which must hold exactly the bytes
    /// reported by the scanner (header plus full payload).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(buf)?;
        let expected = header.frame_len();
        if buf.len() < expected {
            return Err(StreamError::parse_error(
                "data frame payload",
                format!("need {} bytes, have {}", expected, buf.len()),
            ));
        }
        let mut samples = Vec::with_capacity(header.sample_count as usize);
        for i in 0..header.sample_count as usize {
            samples.push(read_u16_le(buf, DATA_HEADER_LEN + i * 2)?);
        }
        Ok(Self { header, samples })
    }

    /// View the payload as signed 16-bit samples.
    pub fn samples_as_i16(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().map(|&raw| raw as i16)
    }

    /// The channel this frame belongs to, if it is a plain channel frame.
    pub fn channel(&self) -> Option<Channel> {
        match self.header.flags & frame_flags::KIND_MASK {
            f if f == frame_flags::CHANNEL_A => Some(Channel::A),
            f if f == frame_flags::CHANNEL_B => Some(Channel::B),
            _ => None,
        }
    }
}

/// A typed frame yielded by the reassembler, in byte-stream order.
///
/// Exactly one of the A/B/TEST flag bits selects the variant for data frames;
/// none or several set means the frame is delivered as `Unknown` rather than
/// as data. STAT snapshots are out-of-band and never participate in pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameEvent {
    ChannelA(DataFrame),
    ChannelB(DataFrame),
    Test(DataFrame),
    Stat(StatFrame),
    Unknown(DataFrame),
}

impl FrameEvent {
    /// Classify a decoded data frame by its flag bits.
    pub fn from_data(frame: DataFrame) -> Self {
        match frame.header.flags & frame_flags::KIND_MASK {
            f if f == frame_flags::CHANNEL_A => FrameEvent::ChannelA(frame),
            f if f == frame_flags::CHANNEL_B => FrameEvent::ChannelB(frame),
            f if f == frame_flags::TEST => FrameEvent::Test(frame),
            _ => FrameEvent::Unknown(frame),
        }
    }

    /// The inner data frame, for any non-STAT variant.
    pub fn as_data(&self) -> Option<&DataFrame> {
        match self {
            FrameEvent::ChannelA(f)
            | FrameEvent::ChannelB(f)
            | FrameEvent::Test(f)
            | FrameEvent::Unknown(f) => Some(f),
            FrameEvent::Stat(_) => None,
        }
    }

    /// Producer sequence number, for data frames.
    pub fn sequence(&self) -> Option<u32> {
        self.as_data().map(|f| f.header.sequence)
    }

    /// Short tag for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrameEvent::ChannelA(_) => "A",
            FrameEvent::ChannelB(_) => "B",
            FrameEvent::Test(_) => "TEST",
            FrameEvent::Stat(_) => "STAT",
            FrameEvent::Unknown(_) => "UNK",
        }
    }
}

/// Compare sequence counters in u32 space with wraparound using the
/// half-range rule. Returns true if `a` is strictly newer than `b`.
pub fn seq_after(a: u32, b: u32) -> bool {
    if a == b {
        return false;
    }
    a.wrapping_sub(b) < 0x8000_0000
}

/// Safe byte parsing helpers with bounds checking.
pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    match data.get(offset..offset + 2) {
        Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]])),
        None => Err(StreamError::parse_error(
            "u16 field",
            format!("offset {} out of bounds for {} bytes", offset, data.len()),
        )),
    }
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    match data.get(offset..offset + 4) {
        Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(StreamError::parse_error(
            "u32 field",
            format!("offset {} out of bounds for {} bytes", offset, data.len()),
        )),
    }
}
