//! Typed failures returned by the analytics engine

use alloy::primitives::Address;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Token not found: {address}")]
    TokenNotFound { address: Address },

    #[error("Pool not found: {address}")]
    PoolNotFound { address: Address },

    #[error("No liquidity for token {token}")]
    NoLiquidity { token: Address },

    #[error("No pool routes {token} to {quote}")]
    NoPool { token: Address, quote: String },

    #[error("USD price unavailable for {token}")]
    UsdPriceUnavailable { token: Address },

    #[error("No price history for {token} in the last {period_secs}s")]
    NoTwapData { token: Address, period_secs: i64 },

    #[error("Arbitrage pool not found: {address}")]
    ArbitragePoolNotFound { address: Address },

    #[error("Token {address} declares {decimals} decimals (max 18)")]
    InvalidDecimals { address: Address, decimals: u8 },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Repository error: {message}")]
    Repository {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("{operation} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("{operation} panicked: {message}")]
    Panicked { operation: String, message: String },

    #[error("Scan cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Stable dotted code callers branch on.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::TokenNotFound { .. } => "Token.NotFound",
            EngineError::PoolNotFound { .. } => "Pool.NotFound",
            EngineError::NoLiquidity { .. } => "Price.NoLiquidity",
            EngineError::NoPool { .. } => "Price.NoPool",
            EngineError::UsdPriceUnavailable { .. } => "Price.UsdUnavailable",
            EngineError::NoTwapData { .. } => "Twap.NoData",
            EngineError::ArbitragePoolNotFound { .. } => "Arbitrage.PoolNotFound",
            EngineError::InvalidDecimals { .. } => "Token.InvalidDecimals",
            EngineError::InvalidArgument { .. } => "Validation.InvalidArgument",
            EngineError::Repository { .. } => "Repository.Failure",
            EngineError::Timeout { .. } => "Operation.Timeout",
            EngineError::RetriesExhausted { .. } => "Operation.RetriesExhausted",
            EngineError::Panicked { .. } => "Operation.Panicked",
            EngineError::Cancelled => "Scan.Cancelled",
        }
    }

    /// Faults from collaborators that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Repository { .. } | EngineError::Timeout { .. })
    }

    pub fn repository(message: impl Into<String>, source: anyhow::Error) -> Self {
        EngineError::Repository {
            message: message.into(),
            source: Some(source),
        }
    }
}
