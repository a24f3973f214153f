//! Channel pairing and per-channel sequence tracking.
//!
//! The device interleaves channel-A and channel-B sample blocks on one bulk
//! endpoint. Depending on configuration it either promises strict A-then-B
//! pairs sharing a sequence number, or streams both channels independently.
//! The tracker models both, and surfaces every anomaly as a non-fatal
//! [`PairEvent`]: under load the transport loses frames in bursts, so a
//! single anomaly is diagnostic signal, not failure.
//!
//! STAT snapshots never reach the tracker; TEST and unclassifiable frames do
//! not participate in pairing.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{Channel, DataFrame, seq_after};

/// Pairing discipline for a streaming session.
///
/// `Async` is the default, matching the device's power-on configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingMode {
    /// Pair same-sequence A/B frames through an explicit state machine.
    Strict,
    /// Track each channel independently, flagging gaps and reordering.
    #[default]
    Async,
}

/// Non-fatal pairing/sequencing anomalies and completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairEvent {
    /// Both halves of a pair observed (strict mode).
    PairComplete { sequence: u32, channel_a: DataFrame, channel_b: DataFrame },
    /// A B frame arrived whose sequence does not match the buffered A.
    PairMismatch { expected: u32, got: u32 },
    /// A second A arrived before any B; the earlier pair will never complete.
    PairAbandoned { sequence: u32 },
    /// A sequence discontinuity on one channel (async mode).
    SequenceGap { channel: Channel, from: u32, to: u32 },
    /// A sequence at or behind the last one seen (async mode).
    OutOfOrder { channel: Channel, sequence: u32 },
}

/// Per-channel stream state, maintained in async mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub last_sequence: Option<u32>,
    pub observed: u64,
    pub gaps: u64,
}

/// Cumulative pairing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCounters {
    pub pairs_completed: u64,
    pub mismatches: u64,
    pub abandoned: u64,
    /// B frames seen with no A buffered (strict mode); dropped silently.
    pub orphan_b: u64,
    pub gaps: u64,
    pub out_of_order: u64,
}

#[derive(Debug, Default)]
enum PairState {
    #[default]
    AwaitingA,
    HaveA {
        sequence: u32,
        frame: DataFrame,
    },
}

/// Tracks pairing or per-channel sequencing over the reassembled frame stream.
#[derive(Debug)]
pub struct PairTracker {
    mode: PairingMode,
    state: PairState,
    channel_a: ChannelState,
    channel_b: ChannelState,
    counters: PairingCounters,
}

impl Default for PairTracker {
    fn default() -> Self {
        Self::new(PairingMode::default())
    }
}

impl PairTracker {
    pub fn new(mode: PairingMode) -> Self {
        Self {
            mode,
            state: PairState::AwaitingA,
            channel_a: ChannelState::default(),
            channel_b: ChannelState::default(),
            counters: PairingCounters::default(),
        }
    }

    pub fn mode(&self) -> PairingMode {
        self.mode
    }

    /// Feed one data frame through the tracker.
    ///
    /// Clones of the frames are retained only as long as strict pairing
    /// needs them; completed pairs hand both payloads back to the caller.
    pub fn observe(&mut self, channel: Channel, frame: &DataFrame) -> Vec<PairEvent> {
        self.channel_state_mut(channel).observed += 1;
        match self.mode {
            PairingMode::Strict => self.observe_strict(channel, frame),
            PairingMode::Async => self.observe_async(channel, frame),
        }
    }

    fn observe_strict(&mut self, channel: Channel, frame: &DataFrame) -> Vec<PairEvent> {
        let seq = frame.header.sequence;
        match channel {
            Channel::A => match std::mem::take(&mut self.state) {
                PairState::AwaitingA => {
                    self.state = PairState::HaveA { sequence: seq, frame: frame.clone() };
                    Vec::new()
                }
                PairState::HaveA { sequence: previous, .. } => {
                    // The firmware skipped a B under load; never wait for it.
                    self.counters.abandoned += 1;
                    debug!(sequence = previous, "pair abandoned, no B before next A");
                    self.state = PairState::HaveA { sequence: seq, frame: frame.clone() };
                    vec![PairEvent::PairAbandoned { sequence: previous }]
                }
            },
            Channel::B => match std::mem::take(&mut self.state) {
                PairState::AwaitingA => {
                    self.counters.orphan_b += 1;
                    trace!(sequence = seq, "orphan B with no A buffered");
                    Vec::new()
                }
                PairState::HaveA { sequence: expected, frame: buffered_a } => {
                    if seq == expected {
                        self.counters.pairs_completed += 1;
                        trace!(sequence = seq, "pair complete");
                        vec![PairEvent::PairComplete {
                            sequence: seq,
                            channel_a: buffered_a,
                            channel_b: frame.clone(),
                        }]
                    } else {
                        // Orphan B; keep waiting on the buffered A, the next
                        // A will replace it if its partner never shows.
                        self.counters.mismatches += 1;
                        debug!(expected, got = seq, "pair sequence mismatch");
                        self.state = PairState::HaveA { sequence: expected, frame: buffered_a };
                        vec![PairEvent::PairMismatch { expected, got: seq }]
                    }
                }
            },
        }
    }

    fn observe_async(&mut self, channel: Channel, frame: &DataFrame) -> Vec<PairEvent> {
        let seq = frame.header.sequence;
        let state = self.channel_state_mut(channel);
        let Some(last) = state.last_sequence else {
            state.last_sequence = Some(seq);
            return Vec::new();
        };

        if !seq_after(seq, last) {
            self.counters.out_of_order += 1;
            debug!(%channel, sequence = seq, last, "out-of-order sequence");
            return vec![PairEvent::OutOfOrder { channel, sequence: seq }];
        }

        state.last_sequence = Some(seq);
        let delta = seq.wrapping_sub(last);
        if delta > 1 {
            let state = self.channel_state_mut(channel);
            state.gaps += 1;
            self.counters.gaps += 1;
            debug!(%channel, from = last, to = seq, "sequence gap");
            return vec![PairEvent::SequenceGap { channel, from: last, to: seq }];
        }
        Vec::new()
    }

    fn channel_state_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::A => &mut self.channel_a,
            Channel::B => &mut self.channel_b,
        }
    }

    pub fn channel_state(&self, channel: Channel) -> ChannelState {
        match channel {
            Channel::A => self.channel_a,
            Channel::B => self.channel_b,
        }
    }

    pub fn counters(&self) -> PairingCounters {
        self.counters
    }

    /// Discard in-flight pairing state after a transport stall.
    ///
    /// Frames in flight are presumed lost: the buffered A is dropped without
    /// an abandonment event, and async last-sequences are cleared so the first
    /// frame after recovery does not flag a spurious gap. Cumulative counters
    /// survive.
    pub fn discard_in_flight(&mut self) {
        self.state = PairState::AwaitingA;
        self.channel_a.last_sequence = None;
        self.channel_b.last_sequence = None;
    }

    /// Full session reset: state and counters.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    /// Switch pairing discipline; resets all tracking state.
    pub fn set_mode(&mut self, mode: PairingMode) {
        *self = Self::new(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::encode_data_frame;
    use crate::types::flags::frame_flags;

    fn frame(channel: Channel, seq: u32) -> DataFrame {
        let flags = match channel {
            Channel::A => frame_flags::CHANNEL_A,
            Channel::B => frame_flags::CHANNEL_B,
        };
        DataFrame::decode(&encode_data_frame(flags, seq, seq.wrapping_mul(10), &[seq as u16]))
            .expect("valid frame")
    }

    #[test]
    fn strict_pair_completes_on_matching_b() {
        let mut tracker = PairTracker::new(PairingMode::Strict);
        assert!(tracker.observe(Channel::A, &frame(Channel::A, 5)).is_empty());

        let events = tracker.observe(Channel::B, &frame(Channel::B, 5));
        match &events[..] {
            [PairEvent::PairComplete { sequence: 5, channel_a, channel_b }] => {
                assert_eq!(channel_a.header.sequence, 5);
                assert_eq!(channel_b.header.sequence, 5);
            }
            other => panic!("expected PairComplete(5), got {other:?}"),
        }
        assert_eq!(tracker.counters().pairs_completed, 1);
    }

    #[test]
    fn strict_second_a_abandons_first() {
        let mut tracker = PairTracker::new(PairingMode::Strict);
        tracker.observe(Channel::A, &frame(Channel::A, 5));

        let events = tracker.observe(Channel::A, &frame(Channel::A, 6));
        assert_eq!(events, vec![PairEvent::PairAbandoned { sequence: 5 }]);

        // The tracker now waits for B(6) and completes normally.
        let events = tracker.observe(Channel::B, &frame(Channel::B, 6));
        assert!(matches!(events[..], [PairEvent::PairComplete { sequence: 6, .. }]));
        assert_eq!(tracker.counters().abandoned, 1);
        assert_eq!(tracker.counters().pairs_completed, 1);
    }

    #[test]
    fn strict_mismatched_b_is_orphaned() {
        let mut tracker = PairTracker::new(PairingMode::Strict);
        tracker.observe(Channel::A, &frame(Channel::A, 5));

        let events = tracker.observe(Channel::B, &frame(Channel::B, 9));
        assert_eq!(events, vec![PairEvent::PairMismatch { expected: 5, got: 9 }]);

        // The buffered A(5) is still armed and its real partner completes it.
        let events = tracker.observe(Channel::B, &frame(Channel::B, 5));
        assert!(matches!(events[..], [PairEvent::PairComplete { sequence: 5, .. }]));
        assert_eq!(tracker.counters().mismatches, 1);
    }

    #[test]
    fn strict_orphan_b_is_counted_not_evented() {
        let mut tracker = PairTracker::new(PairingMode::Strict);
        let events = tracker.observe(Channel::B, &frame(Channel::B, 3));
        assert!(events.is_empty());
        assert_eq!(tracker.counters().orphan_b, 1);
    }

    #[test]
    fn async_gap_detection() {
        let mut tracker = PairTracker::new(PairingMode::Async);
        assert!(tracker.observe(Channel::A, &frame(Channel::A, 1)).is_empty());

        let events = tracker.observe(Channel::A, &frame(Channel::A, 3));
        assert_eq!(events, vec![PairEvent::SequenceGap { channel: Channel::A, from: 1, to: 3 }]);
        assert_eq!(tracker.channel_state(Channel::A).gaps, 1);

        // Channels are independent: B starting fresh flags nothing.
        assert!(tracker.observe(Channel::B, &frame(Channel::B, 100)).is_empty());
        assert_eq!(tracker.channel_state(Channel::B).gaps, 0);
    }

    #[test]
    fn async_out_of_order_and_duplicate() {
        let mut tracker = PairTracker::new(PairingMode::Async);
        tracker.observe(Channel::A, &frame(Channel::A, 10));

        let events = tracker.observe(Channel::A, &frame(Channel::A, 10));
        assert_eq!(events, vec![PairEvent::OutOfOrder { channel: Channel::A, sequence: 10 }]);

        let events = tracker.observe(Channel::A, &frame(Channel::A, 7));
        assert_eq!(events, vec![PairEvent::OutOfOrder { channel: Channel::A, sequence: 7 }]);

        // The last accepted sequence is still 10, so 11 is a clean successor.
        assert!(tracker.observe(Channel::A, &frame(Channel::A, 11)).is_empty());
        assert_eq!(tracker.counters().out_of_order, 2);
    }

    #[test]
    fn async_wraparound_is_not_a_gap() {
        let mut tracker = PairTracker::new(PairingMode::Async);
        tracker.observe(Channel::A, &frame(Channel::A, u32::MAX));
        // MAX -> 0 is consecutive across the wrap.
        assert!(tracker.observe(Channel::A, &frame(Channel::A, 0)).is_empty());
        assert_eq!(tracker.counters().gaps, 0);
    }

    #[test]
    fn stall_discard_preserves_counters_but_forgets_sequences() {
        let mut tracker = PairTracker::new(PairingMode::Strict);
        tracker.observe(Channel::A, &frame(Channel::A, 5));
        tracker.observe(Channel::A, &frame(Channel::A, 6)); // abandon 5
        tracker.discard_in_flight();

        // The buffered A(6) is gone: its B is now an orphan, not a pair.
        let events = tracker.observe(Channel::B, &frame(Channel::B, 6));
        assert!(events.is_empty());
        assert_eq!(tracker.counters().abandoned, 1);

        let mut tracker = PairTracker::new(PairingMode::Async);
        tracker.observe(Channel::A, &frame(Channel::A, 100));
        tracker.discard_in_flight();
        // First frame after a stall re-baselines instead of flagging a gap.
        assert!(tracker.observe(Channel::A, &frame(Channel::A, 200)).is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = PairTracker::new(PairingMode::Async);
        tracker.observe(Channel::A, &frame(Channel::A, 1));
        tracker.observe(Channel::A, &frame(Channel::A, 5));
        assert_eq!(tracker.counters().gaps, 1);

        tracker.reset();
        assert_eq!(tracker.counters(), PairingCounters::default());
        assert_eq!(tracker.channel_state(Channel::A), ChannelState::default());
    }
}
