//! Frame analysis and session bookkeeping for the barcode reader.

pub mod analyzer;
pub mod code;
pub mod decoder;
pub mod draw;
pub mod session;
#[cfg(test)]
mod test_utils;

pub use analyzer::FrameAnalyzer;
pub use session::{FrameOutcome, SeenCodeSet, SessionSummary, SessionTracker};
