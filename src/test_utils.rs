//! Test utilities: wire-format encoders and logging setup shared by unit
//! tests, integration tests and benches.
//!
//! The encoders are the inverse of the production decoders and are kept out
//! of the public API; production code never synthesizes frames.

#![cfg(any(test, feature = "benchmark"))]

use crate::types::{DATA_HEADER_LEN, DATA_MAGIC, PROTOCOL_VERSION, STAT_LEN_EXTENDED, STAT_LEN_LEGACY, STAT_TAG};

/// Encode a data frame: 32-byte header plus little-endian 16-bit samples.
pub fn encode_data_frame(flags: u8, sequence: u32, timestamp: u32, samples: &[u16]) -> Vec<u8> {
    assert!(samples.len() <= u16::MAX as usize, "sample count must fit in u16");
    let mut bytes = Vec::with_capacity(DATA_HEADER_LEN + samples.len() * 2);
    bytes.extend_from_slice(&DATA_MAGIC.to_le_bytes());
    bytes.push(PROTOCOL_VERSION);
    bytes.push(flags);
    bytes.extend_from_slice(&sequence.to_le_bytes());
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.extend_from_slice(&(samples.len() as u16).to_le_bytes());
    bytes.resize(DATA_HEADER_LEN, 0); // reserved
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Field values for an encoded STAT frame. Defaults are all-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatFixture {
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
    pub secondary_flags: u16,
    pub sending_channel: u8,
    pub pair_fill: u8,
    pub pair_send: u8,
    pub last_tx_len: u16,
    pub stream_seq: u32,
}

/// Encode a STAT frame in the legacy 52-byte or extended 64-byte layout.
pub fn encode_stat_frame(fixture: &StatFixture, extended: bool) -> Vec<u8> {
    let len = if extended { STAT_LEN_EXTENDED } else { STAT_LEN_LEGACY };
    let mut bytes = vec![0u8; len];
    bytes[0..4].copy_from_slice(&STAT_TAG);
    bytes[4] = fixture.version;
    bytes[6..8].copy_from_slice(&fixture.samples_per_frame.to_le_bytes());
    bytes[8..10].copy_from_slice(&fixture.frame_bytes.to_le_bytes());
    bytes[10..12].copy_from_slice(&fixture.test_frames.to_le_bytes());
    bytes[12..16].copy_from_slice(&fixture.produced_seq.to_le_bytes());
    bytes[16..20].copy_from_slice(&fixture.sent_a.to_le_bytes());
    bytes[20..24].copy_from_slice(&fixture.sent_b.to_le_bytes());
    bytes[24..28].copy_from_slice(&fixture.tx_complete.to_le_bytes());
    bytes[28..32].copy_from_slice(&fixture.partial_aborts.to_le_bytes());
    bytes[32..36].copy_from_slice(&fixture.size_mismatches.to_le_bytes());
    bytes[36..40].copy_from_slice(&fixture.dma_done_a.to_le_bytes());
    bytes[40..44].copy_from_slice(&fixture.dma_done_b.to_le_bytes());
    bytes[44..48].copy_from_slice(&fixture.frame_write_seq.to_le_bytes());
    bytes[48..50].copy_from_slice(&fixture.runtime_flags.to_le_bytes());
    if extended {
        bytes[50..52].copy_from_slice(&fixture.secondary_flags.to_le_bytes());
        bytes[52] = fixture.sending_channel;
        let pair_idx = ((fixture.pair_fill as u16) << 8) | fixture.pair_send as u16;
        bytes[54..56].copy_from_slice(&pair_idx.to_le_bytes());
        bytes[56..58].copy_from_slice(&fixture.last_tx_len.to_le_bytes());
        bytes[58..62].copy_from_slice(&fixture.stream_seq.to_le_bytes());
    }
    bytes
}

/// Install a tracing subscriber for test debugging; safe to call repeatedly.
/// Test-only: benches must not pull the subscriber into the library build.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_encoder_produces_expected_layout() {
        let bytes = encode_data_frame(0x01, 0x04030201, 0x08070605, &[0xAABB]);
        assert_eq!(bytes.len(), DATA_HEADER_LEN + 2);
        assert_eq!(&bytes[0..3], &[0x5A, 0xA5, 0x01]);
        assert_eq!(bytes[3], 0x01);
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[8..12], &[0x05, 0x06, 0x07, 0x08]);
        assert_eq!(&bytes[12..14], &[0x01, 0x00]);
        assert_eq!(&bytes[32..34], &[0xBB, 0xAA]);
    }

    #[test]
    fn stat_encoder_lengths() {
        assert_eq!(encode_stat_frame(&StatFixture::default(), false).len(), STAT_LEN_LEGACY);
        assert_eq!(encode_stat_frame(&StatFixture::default(), true).len(), STAT_LEN_EXTENDED);
    }
}
