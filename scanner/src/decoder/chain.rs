use barcode_reader_common::frame::Frame;
use tracing::trace;

use super::traits::{Symbol, SymbolDecoder};
use super::{MultiFormatDecoder, QrDecoder};

/// Runs several decoders over the same frame and concatenates their symbols
/// in decoder order.
///
/// A payload already reported by an earlier decoder is not reported again by
/// a later one, so a code two backends both recognize counts once. Repeats
/// within a single decoder's output are kept.
pub struct DecoderChain {
    decoders: Vec<Box<dyn SymbolDecoder>>,
    name: String,
}

impl Default for DecoderChain {
    /// QR through `rqrr` first (exact corner outlines), then `rxing` for
    /// linear barcodes and the remaining 2D formats.
    fn default() -> Self {
        Self::new().with(QrDecoder::new()).with(MultiFormatDecoder::new())
    }
}

impl DecoderChain {
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
            name: String::new(),
        }
    }

    pub fn with(mut self, decoder: impl SymbolDecoder + 'static) -> Self {
        if !self.name.is_empty() {
            self.name.push('+');
        }
        self.name.push_str(decoder.name());
        self.decoders.push(Box::new(decoder));
        self
    }
}

impl SymbolDecoder for DecoderChain {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = Vec::new();
        for decoder in &self.decoders {
            let earlier = symbols.len();
            for symbol in decoder.decode(frame) {
                if symbols[..earlier].iter().any(|s| s.payload == symbol.payload) {
                    trace!(
                        decoder = decoder.name(),
                        seq = frame.seq,
                        "symbol already reported by an earlier decoder"
                    );
                    continue;
                }
                symbols.push(symbol);
            }
        }
        symbols
    }

    fn name(&self) -> &str {
        &self.name
    }
}
