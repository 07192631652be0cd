use barcode_reader_common::frame::Frame;

/// A corner of a detected symbol, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One region a decoder recognized: raw payload plus its outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub payload: Vec<u8>,
    /// Ordered boundary points. Usually four, not guaranteed.
    pub polygon: Vec<Point>,
}

/// Pluggable symbol recognition.
///
/// Implementations look at a frame and report every symbol they find, in
/// detection order. Finding nothing is not an error.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Vec<Symbol>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
