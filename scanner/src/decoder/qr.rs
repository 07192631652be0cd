use barcode_reader_common::frame::Frame;
use rqrr::PreparedImage;
use tracing::{debug, trace};

use super::traits::{Point, Symbol, SymbolDecoder};

/// QR code recognition backed by `rqrr`.
///
/// The frame is reduced to luma, grids are located, and each grid's raw
/// payload bytes are returned with its four corners.
#[derive(Debug, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let start = std::time::Instant::now();
        let mut img = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            frame.luma(x as u32, y as u32)
        });
        let grids = img.detect_grids();

        let symbols: Vec<Symbol> = grids
            .into_iter()
            .filter_map(|grid| {
                let mut payload = Vec::new();
                match grid.decode_to(&mut payload) {
                    Ok(_) => Some(Symbol {
                        payload,
                        polygon: grid.bounds.iter().map(|p| Point::new(p.x, p.y)).collect(),
                    }),
                    Err(e) => {
                        debug!(error = ?e, "QR grid found but not decodable");
                        None
                    }
                }
            })
            .collect();

        trace!(
            count = symbols.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "QR detection complete"
        );
        symbols
    }

    fn name(&self) -> &str {
        "qr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::qr_frame;
    use barcode_reader_common::frame::ChannelOrder;

    #[test]
    fn blank_frame_has_no_symbols() {
        let frame = Frame::new(64, 48, ChannelOrder::Bgr, vec![255; 64 * 48 * 3]).unwrap();
        assert!(QrDecoder::new().decode(&frame).is_empty());
    }

    #[test]
    fn empty_frame_has_no_symbols() {
        let frame = Frame::new(0, 0, ChannelOrder::Bgr, Vec::new()).unwrap();
        assert!(QrDecoder::new().decode(&frame).is_empty());
    }

    #[test]
    fn reads_payload_and_four_corners() {
        let (frame, (min, max)) = qr_frame(b"ABCDEFGHIJKLM");
        let symbols = QrDecoder::new().decode(&frame);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, b"ABCDEFGHIJKLM");
        assert_eq!(symbols[0].polygon.len(), 4);
        // corners sit on the code's edge, within a module of the rendered extent
        for p in &symbols[0].polygon {
            assert!((min - 4..=max + 4).contains(&p.x), "x {} outside {min}..={max}", p.x);
            assert!((min - 4..=max + 4).contains(&p.y), "y {} outside {min}..={max}", p.y);
        }
    }

    #[test]
    fn reads_binary_payload_bytes_unchanged() {
        let (frame, _) = qr_frame(&[0xFF, 0x00, 0x80, 0x41]);
        let symbols = QrDecoder::new().decode(&frame);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, vec![0xFF, 0x00, 0x80, 0x41]);
    }

    #[test]
    fn name_is_stable_for_logs() {
        assert_eq!(QrDecoder::new().name(), "qr");
    }
}
