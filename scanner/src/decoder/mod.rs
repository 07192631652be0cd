pub mod chain;
pub mod multi_format;
pub mod qr;
pub mod traits;

pub use chain::DecoderChain;
pub use multi_format::MultiFormatDecoder;
pub use qr::QrDecoder;
pub use traits::{Point, Symbol, SymbolDecoder};
