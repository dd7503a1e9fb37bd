//! Network addresses and the fixed quote-currency table

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Base mainnet
pub const BASE_CHAIN_ID: u64 = 8453;

pub const WETH_MAINNET: Address = address!("4200000000000000000000000000000000000006");
pub const USDC_MAINNET: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
pub const USDBC_MAINNET: Address = address!("d9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA");
pub const USDT_MAINNET: Address = address!("fde4C96c8593536E31F229EA8f37b2ADa2699bb2");
pub const DAI_MAINNET: Address = address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb");

/// Stablecoins priced 1:1 against USD.
pub const STABLECOINS: &[Address] = &[USDC_MAINNET, USDT_MAINNET, DAI_MAINNET, USDBC_MAINNET];

/// Order in which direct stablecoin pairings are tried for USD pricing.
pub const USD_QUOTE_ORDER: &[QuoteCurrency] = &[QuoteCurrency::Usdc, QuoteCurrency::Usdt, QuoteCurrency::Dai];

pub fn is_stablecoin(token: &Address) -> bool {
    STABLECOINS.contains(token)
}

/// Rank used to decide which side of a pair is the quote: stablecoins first, then WETH.
pub fn quote_rank(token: &Address) -> u8 {
    if is_stablecoin(token) {
        2
    } else if *token == WETH_MAINNET {
        1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteCurrency {
    Eth,
    Usdc,
    Usdt,
    Dai,
}

impl QuoteCurrency {
    pub fn address(&self) -> Address {
        match self {
            QuoteCurrency::Eth => WETH_MAINNET,
            QuoteCurrency::Usdc => USDC_MAINNET,
            QuoteCurrency::Usdt => USDT_MAINNET,
            QuoteCurrency::Dai => DAI_MAINNET,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            QuoteCurrency::Eth => "ETH",
            QuoteCurrency::Usdc => "USDC",
            QuoteCurrency::Usdt => "USDT",
            QuoteCurrency::Dai => "DAI",
        }
    }

    pub fn is_stable(&self) -> bool {
        !matches!(self, QuoteCurrency::Eth)
    }

    pub fn from_address(token: &Address) -> Option<Self> {
        [QuoteCurrency::Eth, QuoteCurrency::Usdc, QuoteCurrency::Usdt, QuoteCurrency::Dai]
            .into_iter()
            .find(|q| q.address() == *token)
    }
}

impl fmt::Display for QuoteCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for QuoteCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" | "WETH" => Ok(QuoteCurrency::Eth),
            "USDC" => Ok(QuoteCurrency::Usdc),
            "USDT" => Ok(QuoteCurrency::Usdt),
            "DAI" => Ok(QuoteCurrency::Dai),
            other => Err(format!("unsupported quote currency: {}", other)),
        }
    }
}
