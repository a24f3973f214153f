//! STAT telemetry snapshot decoding.
//!
//! The device emits an out-of-band status frame tagged with ASCII `STAT`,
//! either 52 bytes (legacy firmware) or 64 bytes (extended, a strict superset).
//! Snapshots surface producer-side counters so a host can compare what the
//! firmware claims to have produced against what actually arrived.
//!
//! Packed layout, little-endian throughout:
//!
//! ```text
//! [0..4]   "STAT"
//! [4]      version
//! [5]      reserved
//! [6..8]   samples per frame currently configured
//! [8..10]  frame size in bytes
//! [10..12] test frames emitted
//! [12..16] produced pair sequence
//! [16..20] channel-A frames sent
//! [20..24] channel-B frames sent
//! [24..28] TX-complete callbacks
//! [28..32] partial aborts
//! [32..36] size mismatches
//! [36..40] channel-A DMA completions
//! [40..44] channel-B DMA completions
//! [44..48] frame write sequence
//! [48..50] runtime flags            <- legacy layout ends at 52
//! [50..52] secondary flags          \
//! [52]     active send channel       |
//! [53]     reserved                  | extended tail
//! [54..56] pair fill/send cursors    | (64-byte layout only)
//! [56..58] last TX length            |
//! [58..62] free-running stream seq  /
//! [62..64] reserved
//! ```
//!
//! Offsets beyond these fields vary between firmware builds and are not
//! decoded.

use serde::{Deserialize, Serialize};

use super::flags::runtime_flags;
use super::frame::{read_u16_le, read_u32_le};
use crate::{Result, StreamError};

/// ASCII tag opening every STAT frame.
pub const STAT_TAG: [u8; 4] = *b"STAT";

/// Legacy STAT frame length.
pub const STAT_LEN_LEGACY: usize = 52;

/// Extended STAT frame length.
pub const STAT_LEN_EXTENDED: usize = 64;

/// Fields present only in the 64-byte extended layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatExt {
    pub secondary_flags: u16,
    /// Channel currently being transmitted (0 = A, 1 = B).
    pub sending_channel: u8,
    /// Pairing buffer fill cursor.
    pub pair_fill: u8,
    /// Pairing buffer send cursor.
    pub pair_send: u8,
    pub last_tx_len: u16,
    /// Free-running stream sequence, independent of the pair counter.
    pub stream_seq: u32,
}

/// Decoded STAT telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFrame {
    pub version: u8,
    pub samples_per_frame: u16,
    pub frame_bytes: u16,
    pub test_frames: u16,
    pub produced_seq: u32,
    pub sent_a: u32,
    pub sent_b: u32,
    pub tx_complete: u32,
    pub partial_aborts: u32,
    pub size_mismatches: u32,
    pub dma_done_a: u32,
    pub dma_done_b: u32,
    pub frame_write_seq: u32,
    pub runtime_flags: u16,
    /// Extended tail, present for 64-byte frames only.
    pub ext: Option<StatExt>,
}

impl StatFrame {
    /// Decode a STAT frame from `buf`, which must be exactly the legacy or
    /// extended length as chosen by the scanner.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < STAT_LEN_LEGACY {
            return Err(StreamError::parse_error(
                "STAT frame",
                format!("need at least {} bytes, have {}", STAT_LEN_LEGACY, buf.len()),
            ));
        }
        if buf[0..4] != STAT_TAG {
            return Err(StreamError::parse_error("STAT frame", "missing STAT tag"));
        }

        let ext = if buf.len() >= STAT_LEN_EXTENDED {
            let pair_idx = read_u16_le(buf, 54)?;
            Some(StatExt {
                secondary_flags: read_u16_le(buf, 50)?,
                sending_channel: buf[52],
                pair_fill: (pair_idx >> 8) as u8,
                pair_send: (pair_idx & 0xFF) as u8,
                last_tx_len: read_u16_le(buf, 56)?,
                stream_seq: read_u32_le(buf, 58)?,
            })
        } else {
            None
        };

        Ok(Self {
            version: buf[4],
            samples_per_frame: read_u16_le(buf, 6)?,
            frame_bytes: read_u16_le(buf, 8)?,
            test_frames: read_u16_le(buf, 10)?,
            produced_seq: read_u32_le(buf, 12)?,
            sent_a: read_u32_le(buf, 16)?,
            sent_b: read_u32_le(buf, 20)?,
            tx_complete: read_u32_le(buf, 24)?,
            partial_aborts: read_u32_le(buf, 28)?,
            size_mismatches: read_u32_le(buf, 32)?,
            dma_done_a: read_u32_le(buf, 36)?,
            dma_done_b: read_u32_le(buf, 40)?,
            frame_write_seq: read_u32_le(buf, 44)?,
            runtime_flags: read_u16_le(buf, 48)?,
            ext,
        })
    }

    /// Whether the device reports itself as currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.runtime_flags & runtime_flags::STREAMING != 0
    }
}
