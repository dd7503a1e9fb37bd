//! Liquidity risk analytics

pub mod analytics;
pub mod concentration;
pub mod depth;
pub mod impermanent_loss;

pub use analytics::*;
pub use concentration::*;
pub use depth::*;
pub use impermanent_loss::*;
