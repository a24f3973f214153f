//! Session engine: reassembly, pairing and rate estimation behind one feed.
//!
//! [`StreamEngine`] is the owned, per-session replacement for the tangle of
//! module-level counters the original host tooling accumulated: construct one
//! per device stream, feed it raw transport chunks, and it hands back typed
//! frames plus pairing anomalies while keeping a block-rate estimate and a
//! health snapshot current. Dropping the engine is the whole teardown.
//!
//! The engine is synchronous and single-threaded by design: no I/O, no
//! suspension. It can be unit-tested against synthetic byte streams with
//! no timing dependency. Hosts that want a task-and-channel shape wrap it
//! with [`crate::stream::StreamDriver`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pairing::{PairEvent, PairTracker, PairingCounters, PairingMode};
use crate::rate::{DEFAULT_RATE_WINDOW, RateEstimator};
use crate::transport::TransportSignal;
use crate::types::{Channel, FrameEvent};
use crate::wire::{FrameReassembler, ReassemblerConfig, ReassemblyCounters};
use crate::{Result, StreamError};

/// Engine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mode: PairingMode,
    pub reassembly: ReassemblerConfig,
    /// Sliding-window capacity for the block-rate estimate.
    pub rate_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: PairingMode::default(),
            reassembly: ReassemblerConfig::default(),
            rate_window: DEFAULT_RATE_WINDOW,
        }
    }
}

/// Everything the engine can hand back from one feed call, in stream order.
///
/// Pairing events follow the frame that triggered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    Frame(FrameEvent),
    Pairing(PairEvent),
}

/// Point-in-time health indicators for display or logging.
///
/// The transport is lossy in bursts; these are cumulative counts to be shown
/// as indicators, not conditions to fail on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub reassembly: ReassemblyCounters,
    pub pairing: PairingCounters,
    pub timeouts: u64,
    pub stalls: u64,
    /// Current block-rate estimate in Hz, if enough timestamps are buffered.
    pub block_rate_hz: Option<f64>,
}

/// One decoding session over one logical byte stream.
///
/// `feed` is not reentrant; an engine instance belongs to a single logical
/// stream. Instances are fully independent, so one engine per physical
/// device on separate threads needs no synchronization.
#[derive(Debug)]
pub struct StreamEngine {
    reassembler: FrameReassembler,
    tracker: PairTracker,
    rate: RateEstimator,
    config: EngineConfig,
    timeouts: u64,
    stalls: u64,
    defunct: bool,
}

impl Default for StreamEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl StreamEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_config(config.reassembly),
            tracker: PairTracker::new(config.mode),
            rate: RateEstimator::new(config.rate_window),
            config,
            timeouts: 0,
            stalls: 0,
            defunct: false,
        }
    }

    /// Convenience constructor selecting only the pairing discipline.
    pub fn with_mode(mode: PairingMode) -> Self {
        Self::new(EngineConfig { mode, ..EngineConfig::default() })
    }

    /// Absorb one transport chunk; returns frames and pairing events in
    /// stream order.
    ///
    /// Errors: [`StreamError::BufferOverflow`] if the reassembly buffer
    /// exceeded its limit (reset or rebuild the engine), or
    /// [`StreamError::Defunct`] after a fatal transport signal.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>> {
        if self.defunct {
            return Err(StreamError::Defunct);
        }

        let frames = self.reassembler.feed(chunk)?;
        let mut events = Vec::with_capacity(frames.len());
        for frame in frames {
            let pair_events = match &frame {
                FrameEvent::ChannelA(f) => {
                    let out = self.tracker.observe(Channel::A, f);
                    // In async mode the A stream itself carries the cadence.
                    if self.tracker.mode() == PairingMode::Async {
                        self.rate.observe(f.header.timestamp);
                    }
                    out
                }
                FrameEvent::ChannelB(f) => self.tracker.observe(Channel::B, f),
                // STAT passes through untouched; TEST and Unknown do not pair.
                FrameEvent::Stat(_) | FrameEvent::Test(_) | FrameEvent::Unknown(_) => Vec::new(),
            };

            events.push(StreamEvent::Frame(frame));
            for pair_event in pair_events {
                if let PairEvent::PairComplete { channel_a, .. } = &pair_event {
                    // Strict mode clocks completed pairs by the A timestamp.
                    self.rate.observe(channel_a.header.timestamp);
                }
                events.push(StreamEvent::Pairing(pair_event));
            }
        }
        Ok(events)
    }

    /// React to a transport-level signal reported by the adapter.
    pub fn apply_signal(&mut self, signal: TransportSignal) {
        match signal {
            TransportSignal::Timeout => {
                self.timeouts += 1;
            }
            TransportSignal::TransferStall => {
                self.stalls += 1;
                debug!("transfer stall: discarding in-flight pairing state");
                self.tracker.discard_in_flight();
            }
            TransportSignal::Fatal => {
                debug!("fatal transport signal: engine defunct");
                self.defunct = true;
            }
        }
    }

    /// Current block-rate estimate in Hz.
    pub fn block_rate(&self) -> Option<f64> {
        self.rate.estimate()
    }

    /// Cumulative health indicators.
    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            reassembly: self.reassembler.counters(),
            pairing: self.tracker.counters(),
            timeouts: self.timeouts,
            stalls: self.stalls,
            block_rate_hz: self.block_rate(),
        }
    }

    pub fn mode(&self) -> PairingMode {
        self.tracker.mode()
    }

    /// Switch pairing discipline mid-session; pairing state and the rate
    /// window restart, reassembly buffer and counters are kept.
    pub fn set_mode(&mut self, mode: PairingMode) {
        debug!(?mode, "pairing mode change");
        self.config.mode = mode;
        self.tracker.set_mode(mode);
        self.rate.clear();
    }

    /// Full session reset: buffers, trackers, estimators, counters, and the
    /// defunct latch. Equivalent to constructing a fresh engine with the
    /// same configuration.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}
