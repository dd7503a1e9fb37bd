//! Core data types and structures

pub mod addresses;
pub mod arbitrage;
pub mod events;
pub mod liquidity;
pub mod pools;
pub mod price;

pub use addresses::*;
pub use arbitrage::*;
pub use events::*;
pub use liquidity::*;
pub use pools::*;
pub use price::*;
