//! Frame reassembly and channel pairing for the BMI30 USB telemetry stream.
//!
//! The BMI30 streams dual-channel ADC sample blocks and out-of-band telemetry
//! snapshots over a bulk endpoint whose reads return arbitrary byte windows:
//! logical frames never line up with transport packets, stray bytes appear
//! under load, and frames are lost in bursts. This crate is the decoding
//! engine every host tool needs on top of that transport:
//!
//! - **Reassembly**: raw chunks in, complete typed frames out, with
//!   byte-at-a-time resynchronization past garbage
//! - **Pairing**: strict same-sequence A/B pairing or independent per-channel
//!   sequence tracking, every anomaly surfaced as a non-fatal event
//! - **Rate**: a windowed, median-based block-rate estimate from device
//!   timestamps, robust to 32-bit tick wraparound
//!
//! The engine is transport-agnostic and does no I/O: it consumes byte chunks
//! and the transport's fault signals, nothing else. Opening devices, claiming
//! interfaces and sending configuration commands stay with the caller.
//!
//! # Quick start
//!
//! ```rust
//! use bmi30_stream::{PairingMode, StreamEngine, StreamEvent};
//!
//! let mut engine = StreamEngine::with_mode(PairingMode::Strict);
//!
//! // Chunks come from your transport reader, split wherever the bus splits them.
//! let chunk: &[u8] = &[];
//! for event in engine.feed(chunk).expect("buffer within limits") {
//!     match event {
//!         StreamEvent::Frame(frame) => println!("frame: {}", frame.kind_name()),
//!         StreamEvent::Pairing(anomaly) => println!("pairing: {anomaly:?}"),
//!     }
//! }
//! println!("block rate: {:?} Hz", engine.block_rate());
//! ```
//!
//! # Async hosts
//!
//! [`stream::StreamDriver`] runs the engine on a spawned task behind a
//! bounded channel, and [`stream::EventStream`] adapts any `Stream` of byte
//! chunks into a `Stream` of events. See the module docs for the
//! producer/consumer contract.

mod engine;
mod error;
pub mod pairing;
pub mod rate;
pub mod stream;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transport;
pub mod types;
pub mod wire;

pub use engine::{EngineConfig, HealthSnapshot, StreamEngine, StreamEvent};
pub use error::{Result, StreamError};
pub use pairing::{ChannelState, PairEvent, PairTracker, PairingCounters, PairingMode};
pub use rate::RateEstimator;
pub use transport::TransportSignal;
pub use types::{Channel, DataFrame, FrameEvent, FrameHeader, StatExt, StatFrame};
pub use wire::{FrameReassembler, ReassemblerConfig, ReassemblyCounters};
