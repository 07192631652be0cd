use barcode_reader_common::frame::Frame;
use tracing::{debug, trace};

use crate::code::{is_valid_code, payload_text};
use crate::decoder::SymbolDecoder;
use crate::draw::annotate_code;

/// Finds valid codes in a single frame and marks them on it.
pub struct FrameAnalyzer<D> {
    decoder: D,
}

impl<D: SymbolDecoder> FrameAnalyzer<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Decode `frame`, keep the symbols whose payload is a valid code, and
    /// draw an outline and label for each kept symbol that has exactly four
    /// corners.
    ///
    /// Returns the frame (annotated in place) and the valid payloads in
    /// detection order. The same code may appear more than once.
    pub fn analyze(&self, mut frame: Frame) -> (Frame, Vec<String>) {
        let symbols = self.decoder.decode(&frame);
        let mut codes = Vec::with_capacity(symbols.len());

        for symbol in &symbols {
            let Some(text) = payload_text(&symbol.payload) else {
                debug!(
                    seq = frame.seq,
                    bytes = symbol.payload.len(),
                    "payload is not text, skipping symbol"
                );
                continue;
            };
            if !is_valid_code(text) {
                debug!(seq = frame.seq, payload = text, "payload is not a code, skipping symbol");
                continue;
            }

            if symbol.polygon.len() == 4 {
                annotate_code(&mut frame, &symbol.polygon, text);
            } else {
                trace!(
                    payload = text,
                    points = symbol.polygon.len(),
                    "code outline is not a quad, not drawing"
                );
            }
            codes.push(text.to_string());
        }

        if !symbols.is_empty() {
            trace!(
                decoder = self.decoder.name(),
                seq = frame.seq,
                symbols = symbols.len(),
                codes = codes.len(),
                "frame analyzed"
            );
        }
        (frame, codes)
    }
}
