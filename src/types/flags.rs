//! Wire-level flag bit definitions.
//!
//! Constants mirror the firmware's packed flag fields. Values are fixed by the
//! device protocol and must not be renumbered.

/// Data-frame header flag bits (byte 3 of the 32-byte header).
pub mod frame_flags {
    /// Frame carries channel-A samples.
    pub const CHANNEL_A: u8 = 0x01;
    /// Frame carries channel-B samples.
    pub const CHANNEL_B: u8 = 0x02;
    /// Diagnostic/self-test frame.
    pub const TEST: u8 = 0x80;

    /// Mask covering every bit with a defined classification meaning.
    pub const KIND_MASK: u8 = CHANNEL_A | CHANNEL_B | TEST;
}

/// Runtime flag bits carried in the STAT snapshot (`runtime_flags`).
pub mod runtime_flags {
    /// Device is currently streaming frames.
    pub const STREAMING: u16 = 1 << 0;
}

/// Secondary flag bits carried in the extended STAT tail (`secondary_flags`).
pub mod secondary_flags {
    pub const EP_BUSY: u16 = 1 << 0;
    pub const TX_READY: u16 = 1 << 1;
    pub const PENDING_B: u16 = 1 << 2;
    pub const TEST_IN_FLIGHT: u16 = 1 << 3;
    pub const START_ACK_DONE: u16 = 1 << 4;
    pub const START_STAT_INFLIGHT: u16 = 1 << 5;
    pub const START_STAT_PLANNED: u16 = 1 << 6;
    pub const PENDING_STATUS: u16 = 1 << 7;
    pub const SIMPLE_TX_MODE: u16 = 1 << 8;
    pub const DIAG_MODE_ACTIVE: u16 = 1 << 9;
}
