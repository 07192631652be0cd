use barcode_reader_common::frame::Frame;
use rxing::helpers::detect_multiple_in_luma;
use rxing::Exceptions;
use tracing::{debug, trace};

use super::traits::{Point, Symbol, SymbolDecoder};

/// Linear and 2D barcode recognition backed by `rxing`.
///
/// Reads EAN/UPC, Code 128/39/93, ITF, Codabar, QR, Data Matrix, Aztec and
/// PDF417. The payload is the decoded text; the outline is whatever result
/// points the format reports (two end points along the scan line for linear
/// codes).
#[derive(Debug, Default)]
pub struct MultiFormatDecoder;

impl MultiFormatDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for MultiFormatDecoder {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let mut luma = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                luma.push(frame.luma(x, y));
            }
        }

        let results = match detect_multiple_in_luma(luma, width, height) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => return Vec::new(),
            Err(e) => {
                debug!(error = %e, seq = frame.seq, "barcode scan failed");
                return Vec::new();
            }
        };

        let symbols: Vec<Symbol> = results
            .iter()
            .map(|result| Symbol {
                payload: result.getText().as_bytes().to_vec(),
                polygon: result
                    .getPoints()
                    .iter()
                    .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
                    .collect(),
            })
            .collect();

        trace!(count = symbols.len(), seq = frame.seq, "barcode scan complete");
        symbols
    }

    fn name(&self) -> &str {
        "multi-format"
    }
}
