use std::collections::HashSet;

use barcode_reader_capture::{CaptureError, CaptureSource};
use barcode_reader_common::display::DisplaySink;
use barcode_reader_common::frame::{ChannelOrder, Frame};
use tracing::{debug, error, info};

use crate::analyzer::FrameAnalyzer;
use crate::decoder::SymbolDecoder;

/// Unique codes seen during a session, in the order they were first seen.
///
/// Grows monotonically; nothing is ever removed.
#[derive(Debug, Default)]
pub struct SeenCodeSet {
    index: HashSet<String>,
    order: Vec<String>,
}

impl SeenCodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `code` was not already present.
    pub fn insert(&mut self, code: &str) -> bool {
        if self.index.contains(code) {
            return false;
        }
        self.index.insert(code.to_string());
        self.order.push(code.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Table projection: one single-column row per unique code.
    pub fn rows(&self) -> &[String] {
        &self.order
    }
}

/// What one frame contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Valid codes in detection order, duplicates included.
    pub codes: Vec<String>,
    /// The subset of `codes` not seen before this frame, in detection order.
    pub new_codes: Vec<String>,
}

/// Final state of a session once capture has failed.
#[derive(Debug)]
pub struct SessionSummary {
    pub frames: u64,
    pub unique_codes: usize,
    pub last_code: Option<String>,
    pub failure: CaptureError,
}

/// Drives capture, analysis and display, and owns the accumulated codes.
pub struct SessionTracker<D, S> {
    analyzer: FrameAnalyzer<D>,
    display: S,
    seen: SeenCodeSet,
    last_code: Option<String>,
    frames: u64,
}

impl<D: SymbolDecoder, S: DisplaySink> SessionTracker<D, S> {
    pub fn new(analyzer: FrameAnalyzer<D>, display: S) -> Self {
        Self {
            analyzer,
            display,
            seen: SeenCodeSet::new(),
            last_code: None,
            frames: 0,
        }
    }

    pub fn seen(&self) -> &SeenCodeSet {
        &self.seen
    }

    pub fn last_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn display(&self) -> &S {
        &self.display
    }

    /// Run one iteration on an already captured frame: analyze, display the
    /// annotated frame, fold new codes into the session, refresh count and table.
    pub fn process_frame(&mut self, frame: Frame) -> FrameOutcome {
        let (annotated, codes) = self.analyzer.analyze(frame);

        let shown = annotated.into_order(ChannelOrder::Rgb);
        self.display.show_frame(&shown);

        let mut new_codes = Vec::new();
        for code in &codes {
            if self.seen.insert(code) {
                info!(code, count = self.seen.len(), "new code read");
                new_codes.push(code.clone());
            }
        }

        if let Some(last) = new_codes.last() {
            self.last_code = Some(last.clone());
            self.display.show_last_code(last);
        }

        self.display.show_count(self.seen.len());
        self.display.show_table(self.seen.rows());

        self.frames += 1;
        if self.frames % 100 == 0 {
            debug!(frames = self.frames, unique = self.seen.len(), "frames processed");
        }

        FrameOutcome { codes, new_codes }
    }

    /// Process frames from `source` until it fails. The source is dropped,
    /// releasing the device, before this returns.
    pub async fn run<C: CaptureSource>(&mut self, mut source: C) -> SessionSummary {
        info!(source = source.describe(), "session started");

        let failure = loop {
            match source.next_frame().await {
                Ok(frame) => {
                    self.process_frame(frame);
                }
                Err(e) => break e,
            }
        };

        drop(source);
        info!("capture source released");

        self.stop(failure)
    }

    /// End the session on a capture failure: log it and show it once.
    pub fn stop(&mut self, failure: CaptureError) -> SessionSummary {
        error!(error = %failure, frames = self.frames, "capture failed, session stopped");
        self.display
            .show_error(&format!("Could not capture video: {failure}"));

        SessionSummary {
            frames: self.frames,
            unique_codes: self.seen.len(),
            last_code: self.last_code.clone(),
            failure,
        }
    }
}
