pub mod pacing;
pub mod scanner;

pub use pacing::{Pacer, TokioPacer};
pub use scanner::{validate_tickers, ScanConfig, StockScanner, CANCELLED_MESSAGE};
