//! Arbitrage detection, sizing, scoring and the scan cycle

pub mod confidence;
pub mod dedup;
pub mod detector;
pub mod gas;
pub mod scanner;
pub mod triangular;

pub use confidence::*;
pub use dedup::*;
pub use detector::*;
pub use gas::*;
pub use scanner::*;
