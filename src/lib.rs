//! DEX Price & Arbitrage Analytics Engine
//!
//! Resolves token prices from constant-product pool reserves, scans pools sharing a
//! pair (and three-pool cycles) for arbitrage, and reports liquidity risk: pool
//! metrics, impermanent loss and concentration. State is read through repository
//! traits; detected opportunities leave as events through an [`storage::EventSink`].

pub mod config;
pub mod types;
pub mod errors;
pub mod repository;
pub mod pricing;
pub mod arbitrage;
pub mod liquidity;
pub mod pipeline;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{EngineError, EngineResult};
pub use types::*;
