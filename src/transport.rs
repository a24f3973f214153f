//! Transport fault taxonomy.
//!
//! The engine performs no I/O. Whatever moves the bytes (a USB bulk reader,
//! a serial proxy, a replayed capture) reports its faults as a
//! [`TransportSignal`], and the engine's reaction is fixed per variant:
//!
//! | signal          | engine reaction                                    |
//! |-----------------|----------------------------------------------------|
//! | `Timeout`       | none; the device is quiet, keep feeding            |
//! | `TransferStall` | in-flight pairing state discarded (frames presumed |
//! |                 | lost); adapter clears the halt and re-arms         |
//! | `Fatal`         | engine defunct; caller tears the session down      |

use serde::{Deserialize, Serialize};

/// Transport-level condition reported by the adapter feeding the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportSignal {
    /// No data within the deadline. Benign; retry the read.
    Timeout,
    /// Halted/stalled endpoint. The adapter must clear the halt and re-arm
    /// before resuming; frames in flight are presumed lost.
    TransferStall,
    /// Unrecoverable fault; the session ends.
    Fatal,
}

impl TransportSignal {
    /// Classify an OS error number from a failed transfer.
    ///
    /// Covers the codes the host stacks actually produce: `ETIMEDOUT` (110),
    /// BSD 60 and WinSock 10060 for timeouts; `EPIPE` (32) and `EIO` (5) for
    /// a stalled or broken pipe. Everything else is fatal.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            110 | 60 | 10060 => TransportSignal::Timeout,
            32 | 5 => TransportSignal::TransferStall,
            _ => TransportSignal::Fatal,
        }
    }

    /// Whether the session can continue after this signal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportSignal::Fatal)
    }

    /// Whether in-flight pairing state must be discarded.
    pub fn discards_in_flight(&self) -> bool {
        matches!(self, TransportSignal::TransferStall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classification() {
        assert_eq!(TransportSignal::from_errno(110), TransportSignal::Timeout);
        assert_eq!(TransportSignal::from_errno(60), TransportSignal::Timeout);
        assert_eq!(TransportSignal::from_errno(10060), TransportSignal::Timeout);
        assert_eq!(TransportSignal::from_errno(32), TransportSignal::TransferStall);
        assert_eq!(TransportSignal::from_errno(5), TransportSignal::TransferStall);
        assert_eq!(TransportSignal::from_errno(19), TransportSignal::Fatal);
        assert_eq!(TransportSignal::from_errno(0), TransportSignal::Fatal);
    }

    #[test]
    fn reaction_matrix() {
        assert!(TransportSignal::Timeout.is_recoverable());
        assert!(!TransportSignal::Timeout.discards_in_flight());
        assert!(TransportSignal::TransferStall.is_recoverable());
        assert!(TransportSignal::TransferStall.discards_in_flight());
        assert!(!TransportSignal::Fatal.is_recoverable());
    }
}
