//! The set of tokens the store accepts as payment.
//!
//! Orders are priced in a symbolic asset ("USDT", "ETH"). Transfers arrive identified by a contract address, or by
//! nothing at all for the chain's native coin. The [`TokenRegistry`] maps between the two and is the single source of
//! truth for each token's decimal count.
use std::{fmt::Display, str::FromStr};

use chainpay_common::MAX_DECIMALS;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub const NATIVE_TOKEN: &str = "native";
pub const ARBITRUM_USDT_CONTRACT: &str = "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9";

static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Address pattern is a valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenConfigError {
    #[error("'{0}' is not a valid token identifier. Use 'native' or a 0x-prefixed contract address")]
    InvalidIdentifier(String),
    #[error("'{0}' is not a valid token definition. Expected SYMBOL:identifier:decimals")]
    InvalidDefinition(String),
    #[error("Token {0} is defined more than once")]
    Duplicate(String),
    #[error("No accepted tokens were configured")]
    Empty,
}

/// Lower-cases `s` if it is a 20-byte hex address.
pub fn normalize_address(s: &str) -> Option<String> {
    let s = s.trim();
    ADDRESS_PATTERN.is_match(s).then(|| s.to_ascii_lowercase())
}

//--------------------------------------   TokenIdentifier     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenIdentifier {
    Native,
    /// A lower-cased contract address
    Contract(String),
}

impl FromStr for TokenIdentifier {
    type Err = TokenConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(NATIVE_TOKEN) {
            return Ok(Self::Native);
        }
        normalize_address(s).map(Self::Contract).ok_or_else(|| TokenConfigError::InvalidIdentifier(s.to_string()))
    }
}

impl Display for TokenIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str(NATIVE_TOKEN),
            Self::Contract(address) => f.write_str(address),
        }
    }
}

impl Serialize for TokenIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

//--------------------------------------    AcceptedToken      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedToken {
    pub symbol: String,
    pub identifier: TokenIdentifier,
    pub decimals: u8,
}

impl AcceptedToken {
    pub fn new(symbol: &str, identifier: TokenIdentifier, decimals: u8) -> Self {
        Self { symbol: symbol.trim().to_ascii_uppercase(), identifier, decimals }
    }
}

/// Parses `SYMBOL:identifier:decimals`, e.g. `USDT:0xfd08...fcbb9:6` or `ETH:native:18`.
impl FromStr for AcceptedToken {
    type Err = TokenConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TokenConfigError::InvalidDefinition(s.to_string());
        let mut parts = s.trim().split(':');
        let (Some(symbol), Some(identifier), Some(decimals), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if symbol.trim().is_empty() {
            return Err(invalid());
        }
        let identifier = identifier.parse::<TokenIdentifier>()?;
        let decimals = decimals.trim().parse::<u8>().map_err(|_| invalid())?;
        if decimals > MAX_DECIMALS {
            return Err(invalid());
        }
        Ok(Self::new(symbol, identifier, decimals))
    }
}

//--------------------------------------    TokenRegistry      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: Vec<AcceptedToken>,
}

impl Default for TokenRegistry {
    /// Tether on Arbitrum One, and ETH as the native coin.
    fn default() -> Self {
        Self {
            tokens: vec![
                AcceptedToken::new("USDT", TokenIdentifier::Contract(ARBITRUM_USDT_CONTRACT.to_string()), 6),
                AcceptedToken::new("ETH", TokenIdentifier::Native, 18),
            ],
        }
    }
}

impl TokenRegistry {
    pub fn new(tokens: Vec<AcceptedToken>) -> Result<Self, TokenConfigError> {
        if tokens.is_empty() {
            return Err(TokenConfigError::Empty);
        }
        for (i, token) in tokens.iter().enumerate() {
            let duplicate = tokens[..i]
                .iter()
                .find(|t| t.symbol == token.symbol || t.identifier == token.identifier)
                .map(|t| t.symbol.clone());
            if let Some(symbol) = duplicate {
                return Err(TokenConfigError::Duplicate(symbol));
            }
        }
        Ok(Self { tokens })
    }

    /// Parses a comma separated list of token definitions.
    pub fn parse_list(s: &str) -> Result<Self, TokenConfigError> {
        let tokens = s
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(AcceptedToken::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tokens)
    }

    pub fn by_identifier(&self, identifier: &TokenIdentifier) -> Option<&AcceptedToken> {
        self.tokens.iter().find(|t| &t.identifier == identifier)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&AcceptedToken> {
        let symbol = symbol.trim();
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcceptedToken> {
        self.tokens.iter()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.symbol.as_str()).collect()
    }
}

impl Display for TokenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list =
            self.tokens.iter().map(|t| format!("{}:{}:{}", t.symbol, t.identifier, t.decimals)).collect::<Vec<_>>();
        f.write_str(&list.join(","))
    }
}
