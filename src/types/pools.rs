//! Token and pool snapshots read from the external repositories

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::errors::{EngineError, EngineResult};

pub const MAX_TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub chain_id: u64,
    #[serde(default)]
    pub is_placeholder: bool,
}

impl Token {
    pub fn new(address: Address, symbol: &str, decimals: u8, chain_id: u64) -> EngineResult<Self> {
        let token = Self {
            address,
            symbol: symbol.to_string(),
            decimals,
            chain_id,
            is_placeholder: false,
        };
        token.validate()?;
        Ok(token)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.decimals > MAX_TOKEN_DECIMALS {
            return Err(EngineError::InvalidDecimals {
                address: self.address,
                decimals: self.decimals,
            });
        }
        Ok(())
    }
}

/// Constant-product pool state. `token0`/`token1` ordering is the stored convention,
/// not a price direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub factory: Address,
    pub chain_id: u64,
    #[serde(default)]
    pub venue: String,
    pub token0: Address,
    pub token1: Address,
    #[serde(with = "u256_string")]
    pub reserve0: U256,
    #[serde(with = "u256_string")]
    pub reserve1: U256,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default)]
    pub volume_24h_usd: Decimal,
}

fn default_fee_bps() -> u32 {
    crate::pricing::DEFAULT_FEE_BPS
}

impl Pool {
    pub fn contains(&self, token: &Address) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    pub fn other_token(&self, token: &Address) -> Option<Address> {
        if self.token0 == *token {
            Some(self.token1)
        } else if self.token1 == *token {
            Some(self.token0)
        } else {
            None
        }
    }

    pub fn reserve_of(&self, token: &Address) -> Option<U256> {
        if self.token0 == *token {
            Some(self.reserve0)
        } else if self.token1 == *token {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// Raw reserve sum, used only to rank candidate pools of the same pair.
    pub fn total_reserve(&self) -> U256 {
        self.reserve0.saturating_add(self.reserve1)
    }

    /// Order-independent key shared by every pool trading the same two tokens.
    pub fn pair_key(&self) -> String {
        let (a, b) = if self.token0 <= self.token1 {
            (self.token0, self.token1)
        } else {
            (self.token1, self.token0)
        };
        format!("{}-{}", a, b)
    }

    pub fn label(&self) -> String {
        if self.venue.is_empty() {
            self.address.to_string()
        } else {
            format!("{}:{}", self.venue, self.address)
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.token0 == self.token1 {
            return Err(EngineError::InvalidArgument {
                message: format!("pool {} lists {} on both sides", self.address, self.token0),
            });
        }
        Ok(())
    }
}

/// Raw reserves travel as decimal strings; `0x` hex is accepted on input.
pub mod u256_string {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(token0: Address, token1: Address) -> Pool {
        Pool {
            address: Address::repeat_byte(0xaa),
            factory: Address::ZERO,
            chain_id: 8453,
            venue: "uniswap-v2".to_string(),
            token0,
            token1,
            reserve0: U256::from(10u64),
            reserve1: U256::from(20u64),
            fee_bps: 30,
            volume_24h_usd: Decimal::ZERO,
        }
    }

    #[test]
    fn pair_key_ignores_token_order() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        assert_eq!(pool(a, b).pair_key(), pool(b, a).pair_key());
    }

    #[test]
    fn reserve_lookup_by_token() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let p = pool(a, b);
        assert_eq!(p.reserve_of(&b), Some(U256::from(20u64)));
        assert_eq!(p.other_token(&a), Some(b));
        assert_eq!(p.reserve_of(&Address::ZERO), None);
    }

    #[test]
    fn token_rejects_more_than_eighteen_decimals() {
        let err = Token::new(Address::repeat_byte(0x01), "BAD", 19, 8453).unwrap_err();
        assert_eq!(err.code(), "Token.InvalidDecimals");
        assert!(Token::new(Address::repeat_byte(0x01), "OK", 0, 8453).is_ok());
    }

    #[test]
    fn reserves_deserialize_from_decimal_and_hex_strings() {
        let json = r#"{
            "address": "0x00000000000000000000000000000000000000aa",
            "factory": "0x0000000000000000000000000000000000000000",
            "chain_id": 8453,
            "token0": "0x0000000000000000000000000000000000000001",
            "token1": "0x0000000000000000000000000000000000000002",
            "reserve0": "1000000000000000000000",
            "reserve1": "0x10"
        }"#;
        let p: Pool = serde_json::from_str(json).unwrap();
        assert_eq!(p.reserve0, U256::from(1_000_000_000_000_000_000_000u128));
        assert_eq!(p.reserve1, U256::from(16u64));
        assert_eq!(p.fee_bps, 30);
    }
}
