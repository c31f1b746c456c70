//! # Activity normalizer
//!
//! Turns one provider "activity" into a canonical [`TransferRecord`], or explains why it was skipped.
//!
//! Three outcomes are possible for every entry:
//! * [`Normalized::Transfer`]: a transfer of an accepted token to the receiving address.
//! * [`Normalized::Filtered`]: a well-formed transfer that is not for us (another destination or another token).
//! * [`Normalized::Unrecognized`]: the entry is missing data we need. The caller skips it and carries on with the rest
//!   of the batch.
//!
//! Amounts are computed from the raw integer value with integer arithmetic only. The decimal count comes from the
//! token registry; a payload that disagrees is logged and ignored.
mod payload;

use std::fmt::Display;

use alloy_primitives::U256;
use chainpay_common::{decimal_from_units, parse_base_units};
use log::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use self::payload::{RawActivity, WebhookEnvelope};
use crate::tokens::{normalize_address, TokenIdentifier, TokenRegistry};

pub const UNKNOWN_NETWORK: &str = "unknown";

//--------------------------------------    TransferRecord     ---------------------------------------------------------
/// A transfer of an accepted token to the receiving address. Ephemeral: it drives a match and is then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Lower-cased destination address
    pub to_address: String,
    pub token: TokenIdentifier,
    /// The symbol the token is configured under, e.g. "USDT"
    pub symbol: String,
    pub raw_amount: U256,
    pub decimals: u8,
    /// `raw_amount / 10^decimals`, exactly
    pub amount: Decimal,
    /// Lower-cased transaction hash
    pub tx_hash: String,
    pub confirmations: u64,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    WrongDestination(String),
    UnacceptedToken(String),
}

impl Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongDestination(to) => write!(f, "transfer to {to} is not for the receiving address"),
            Self::UnacceptedToken(token) => write!(f, "token {token} is not accepted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("The webhook body is not valid JSON. {0}")]
    InvalidJson(String),
    #[error("The webhook body does not contain an activity list")]
    NoActivities,
    #[error("Activity entry has an unexpected shape. {0}")]
    InvalidActivity(String),
    #[error("Activity entry has no {0}")]
    MissingField(&'static str),
    #[error("Activity field '{field}' is invalid. {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Transfer(TransferRecord),
    Filtered(FilterReason),
    Unrecognized(NormalizationError),
}

//--------------------------------------     WebhookBatch      ---------------------------------------------------------
/// The activities carried by one webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct WebhookBatch {
    pub webhook_id: Option<String>,
    pub network: Option<String>,
    pub activities: Vec<Value>,
}

impl WebhookBatch {
    /// Parses the (already authenticated) webhook body. Fails if the body is not JSON or carries no activity list.
    pub fn from_slice(raw: &[u8]) -> Result<Self, NormalizationError> {
        let mut envelope = serde_json::from_slice::<WebhookEnvelope>(raw)
            .map_err(|e| NormalizationError::InvalidJson(e.to_string()))?;
        let activities = envelope.take_activities().ok_or(NormalizationError::NoActivities)?;
        Ok(Self {
            webhook_id: envelope.id().map(String::from),
            network: envelope.network().map(String::from),
            activities,
        })
    }
}

//--------------------------------------  ActivityNormalizer   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ActivityNormalizer {
    receiving_address: String,
    tokens: TokenRegistry,
}

impl ActivityNormalizer {
    pub fn new(receiving_address: &str, tokens: TokenRegistry) -> Self {
        Self { receiving_address: receiving_address.trim().to_ascii_lowercase(), tokens }
    }

    pub fn receiving_address(&self) -> &str {
        &self.receiving_address
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn normalize(&self, entry: &Value, default_network: Option<&str>) -> Normalized {
        let activity = match RawActivity::deserialize(entry) {
            Ok(a) => a,
            Err(e) => return Normalized::Unrecognized(NormalizationError::InvalidActivity(e.to_string())),
        };
        self.normalize_activity(&activity, default_network).unwrap_or_else(Normalized::Unrecognized)
    }

    fn normalize_activity(
        &self,
        activity: &RawActivity,
        default_network: Option<&str>,
    ) -> Result<Normalized, NormalizationError> {
        let to_address =
            activity.destination().ok_or(NormalizationError::MissingField("destination address"))?.to_ascii_lowercase();
        if to_address != self.receiving_address {
            return Ok(Normalized::Filtered(FilterReason::WrongDestination(to_address)));
        }
        let identifier = match activity.token_address() {
            None => TokenIdentifier::Native,
            Some(address) => match normalize_address(address) {
                Some(address) => TokenIdentifier::Contract(address),
                None => return Ok(Normalized::Filtered(FilterReason::UnacceptedToken(address.to_string()))),
            },
        };
        let Some(token) = self.tokens.by_identifier(&identifier) else {
            return Ok(Normalized::Filtered(FilterReason::UnacceptedToken(identifier.to_string())));
        };
        let raw_amount = raw_amount(activity)?;
        if let Some(v) = activity.decimals() {
            match parse_count(v) {
                Some(d) if d == u64::from(token.decimals) => {},
                Some(d) => warn!(
                    "🧹️ Payload claims {d} decimals for {}, but it is configured with {}. Using the configured value.",
                    token.symbol, token.decimals
                ),
                None => warn!("🧹️ Ignoring unreadable decimals value {v} for {}", token.symbol),
            }
        }
        let amount = decimal_from_units(raw_amount, token.decimals)
            .map_err(|e| NormalizationError::InvalidField { field: "value", reason: e.to_string() })?;
        let tx_hash = activity.tx_hash().ok_or(NormalizationError::MissingField("transaction hash"))?.to_ascii_lowercase();
        let confirmations = match activity.confirmations() {
            None => 0,
            Some(v) => parse_count(v).ok_or_else(|| NormalizationError::InvalidField {
                field: "confirmations",
                reason: format!("{v} is not a block count"),
            })?,
        };
        let network = activity.network().or(default_network).unwrap_or(UNKNOWN_NETWORK).to_string();
        trace!("🧹️ Normalized transfer of {amount} {} in {tx_hash}", token.symbol);
        Ok(Normalized::Transfer(TransferRecord {
            to_address,
            token: identifier,
            symbol: token.symbol.clone(),
            raw_amount,
            decimals: token.decimals,
            amount,
            tx_hash,
            confirmations,
            network,
        }))
    }
}

fn raw_amount(activity: &RawActivity) -> Result<U256, NormalizationError> {
    let invalid = |reason: String| NormalizationError::InvalidField { field: "value", reason };
    match (activity.raw_value(), activity.log_data()) {
        (Some(Value::String(s)), _) => parse_base_units(s).map_err(|e| invalid(e.to_string())),
        (Some(Value::Number(n)), _) => {
            n.as_u64().map(U256::from).ok_or_else(|| invalid(format!("{n} is not an unsigned integer")))
        },
        (Some(other), _) => Err(invalid(format!("unexpected raw value {other}"))),
        (None, Some(data)) => parse_base_units(data).map_err(|e| invalid(e.to_string())),
        (None, None) => Err(NormalizationError::MissingField("raw value")),
    }
}

/// Small counts (decimals, confirmations) arrive as numbers, decimal strings or hex strings.
fn parse_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_base_units(s).ok().and_then(|u| u64::try_from(u).ok()),
        _ => None,
    }
}
