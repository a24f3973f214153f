//! Core types for the BMI30 stream protocol.
//!
//! - [`FrameHeader`] / [`DataFrame`] decode the 32-byte data-frame layout
//! - [`FrameEvent`] is the tagged variant the reassembler yields, one variant
//!   per frame classification
//! - [`StatFrame`] decodes the out-of-band telemetry snapshot (legacy 52-byte
//!   and extended 64-byte layouts)
//! - [`flags`] carries the wire-level bit definitions
//!
//! All values are transient: constructed per frame, handed to the caller,
//! never mutated afterwards.

pub mod flags;
mod frame;
mod stat;

pub use frame::{
    Channel, DATA_HEADER_LEN, DATA_MAGIC, DATA_START, DataFrame, FrameEvent, FrameHeader,
    PROTOCOL_VERSION, seq_after,
};
pub use stat::{STAT_LEN_EXTENDED, STAT_LEN_LEGACY, STAT_TAG, StatExt, StatFrame};
