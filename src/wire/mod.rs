//! Wire-level reassembly: byte accumulation, frame-start scanning, and
//! chunk-to-frame reassembly for the BMI30 stream protocol.

mod accum;
mod reassembler;
mod scanner;

pub use accum::ByteAccumulator;
pub use reassembler::{
    DEFAULT_MAX_BUFFER, DEFAULT_MAX_SAMPLES, FrameReassembler, ReassemblerConfig,
    ReassemblyCounters,
};
pub use scanner::{FrameKind, ScanOutcome, scan};
