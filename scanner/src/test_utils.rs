//! Synthetic decoders and displays for exercising the pipeline without a camera.

use barcode_reader_common::display::DisplaySink;
use barcode_reader_common::frame::{ChannelOrder, Frame};
use std::collections::HashMap;

use crate::decoder::{Point, Symbol, SymbolDecoder};

/// Returns a fixed list of symbols for each frame sequence number.
#[derive(Default)]
pub struct ScriptedDecoder {
    by_seq: HashMap<u64, Vec<Symbol>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, seq: u64, symbols: Vec<Symbol>) -> Self {
        self.by_seq.insert(seq, symbols);
        self
    }
}

impl SymbolDecoder for ScriptedDecoder {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        self.by_seq.get(&frame.seq).cloned().unwrap_or_default()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A symbol outlined by an axis-aligned quad.
pub fn quad_symbol(payload: &str, x: i32, y: i32, w: i32, h: i32) -> Symbol {
    polygon_symbol(
        payload.as_bytes(),
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ],
    )
}

pub fn polygon_symbol(payload: &[u8], polygon: Vec<Point>) -> Symbol {
    Symbol {
        payload: payload.to_vec(),
        polygon,
    }
}

/// Mid-grey frame in decoder order.
pub fn grey_frame(seq: u64) -> Frame {
    Frame::new(160, 120, ChannelOrder::Bgr, vec![90; 160 * 120 * 3])
        .unwrap()
        .with_meta(seq, 1_700_000_000_000 + seq as i64)
}

/// Pixels per QR module in [`qr_frame`].
const QR_MODULE_PX: usize = 4;
/// Light border around the symbol, in modules.
const QR_QUIET_MODULES: usize = 4;

/// White frame with a rendered QR code of `payload`.
///
/// Also returns the code's pixel extent as `(min, max)`, inclusive on both ends.
pub fn qr_frame(payload: &[u8]) -> (Frame, (i32, i32)) {
    let code = qrcode::QrCode::new(payload).unwrap();
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + 2 * QR_QUIET_MODULES) * QR_MODULE_PX;

    let mut data = vec![255u8; side * side * 3];
    for (i, color) in colors.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let (mx, my) = (i % modules + QR_QUIET_MODULES, i / modules + QR_QUIET_MODULES);
        for y in my * QR_MODULE_PX..(my + 1) * QR_MODULE_PX {
            for x in mx * QR_MODULE_PX..(mx + 1) * QR_MODULE_PX {
                let at = (y * side + x) * 3;
                data[at..at + 3].fill(0);
            }
        }
    }

    let min = (QR_QUIET_MODULES * QR_MODULE_PX) as i32;
    let max = ((QR_QUIET_MODULES + modules) * QR_MODULE_PX) as i32 - 1;
    let frame = Frame::new(side as u32, side as u32, ChannelOrder::Bgr, data).unwrap();
    (frame, (min, max))
}

/// White frame with an EAN-13 barcode of `digits` across its middle rows.
pub fn ean13_frame(digits: &str) -> Frame {
    use rxing::Writer;

    let (width, height, bar_top, bar_height) = (320u32, 120u32, 20u32, 80u32);
    let bars = rxing::MultiFormatWriter
        .encode(digits, &rxing::BarcodeFormat::EAN_13, width as i32, bar_height as i32)
        .unwrap();

    let mut data = vec![255u8; (width * height * 3) as usize];
    for y in 0..bars.getHeight().min(bar_height) {
        for x in 0..bars.getWidth().min(width) {
            if bars.get(x, y) {
                let at = (((bar_top + y) * width + x) * 3) as usize;
                data[at..at + 3].fill(0);
            }
        }
    }
    Frame::new(width, height, ChannelOrder::Bgr, data).unwrap()
}

/// Records every display update in call order.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub frames: Vec<Frame>,
    pub last_codes: Vec<String>,
    pub counts: Vec<usize>,
    pub tables: Vec<Vec<String>>,
    pub errors: Vec<String>,
}

impl DisplaySink for RecordingDisplay {
    fn show_frame(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }

    fn show_last_code(&mut self, code: &str) {
        self.last_codes.push(code.to_string());
    }

    fn show_count(&mut self, count: usize) {
        self.counts.push(count);
    }

    fn show_table(&mut self, rows: &[String]) {
        self.tables.push(rows.to_vec());
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
