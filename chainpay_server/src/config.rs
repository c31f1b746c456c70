use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chainpay_common::Secret;
use chainpay_engine::{MatchPolicy, ReconciliationConfig, TokenRegistry};
use chrono::Duration;
use log::*;
use rust_decimal::Decimal;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/chainpay.db";
const DEFAULT_SIGNATURE_HEADER: &str = "x-alchemy-signature";
const DEFAULT_CHAIN_ID: u64 = 42161;
const DEFAULT_ORDER_TTL_MINUTES: i64 = 15;
/// 30 days
const MAX_ORDER_TTL_MINUTES: i64 = 43_200;
const DEFAULT_AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The store's deposit address, lower-cased.
    pub receiving_address: String,
    pub tokens: TokenRegistry,
    pub chain_id: u64,
    /// Shared secret used to authenticate webhook deliveries. If unset, every delivery is rejected.
    pub webhook_secret: Secret<String>,
    /// The request header carrying the webhook signature.
    pub signature_header: String,
    pub min_confirmations: u64,
    pub order_ttl: Duration,
    /// The upper bound on how far a transfer's amount may stray from the order amount.
    pub amount_tolerance: Decimal,
    pub sweep_interval: StdDuration,
    /// How long a webhook delivery may take before the provider is told to try again.
    pub webhook_timeout: StdDuration,
    /// Token expected in the `x-admin-token` header. If unset, admin routes are refused.
    pub admin_token: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            receiving_address: String::default(),
            tokens: TokenRegistry::default(),
            chain_id: DEFAULT_CHAIN_ID,
            webhook_secret: Secret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            min_confirmations: 0,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
            amount_tolerance: DEFAULT_AMOUNT_TOLERANCE,
            sweep_interval: StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            webhook_timeout: StdDuration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
            admin_token: Secret::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any source of `CPG_*` values. Invalid values are logged and replaced by their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let get = |name: &str| lookup(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let host = get("CPG_HOST").unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = parse_or_default("CPG_PORT", get("CPG_PORT"), DEFAULT_CPG_PORT);
        let database_url = get("CPG_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ CPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.into()
        });
        let receiving_address = get("CPG_RECEIVING_ADDRESS").map(|s| s.to_ascii_lowercase()).unwrap_or_else(|| {
            warn!(
                "🚨️ CPG_RECEIVING_ADDRESS is not set. No payment will ever be recognised until it is set to the \
                 store's deposit address."
            );
            String::default()
        });
        let tokens = match get("CPG_ACCEPTED_TOKENS") {
            None => TokenRegistry::default(),
            Some(s) => TokenRegistry::parse_list(&s).unwrap_or_else(|e| {
                warn!("🪛️ Invalid value for CPG_ACCEPTED_TOKENS. {e}. Using the defaults instead.");
                TokenRegistry::default()
            }),
        };
        info!("🪛️ Accepted tokens: {tokens}");
        let chain_id = parse_or_default("CPG_CHAIN_ID", get("CPG_CHAIN_ID"), DEFAULT_CHAIN_ID);
        let webhook_secret = Secret::new(get("CPG_WEBHOOK_SECRET").unwrap_or_else(|| {
            error!("🪛️ CPG_WEBHOOK_SECRET is not set. Every webhook delivery will be rejected.");
            String::default()
        }));
        let signature_header = get("CPG_SIGNATURE_HEADER")
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.into());
        let min_confirmations = parse_or_default("CPG_MIN_CONFIRMATIONS", get("CPG_MIN_CONFIRMATIONS"), 0u64);
        let ttl_minutes =
            parse_or_default("CPG_ORDER_TTL_MINUTES", get("CPG_ORDER_TTL_MINUTES"), DEFAULT_ORDER_TTL_MINUTES);
        let order_ttl = if (1..=MAX_ORDER_TTL_MINUTES).contains(&ttl_minutes) {
            Duration::minutes(ttl_minutes)
        } else {
            warn!(
                "🪛️ CPG_ORDER_TTL_MINUTES must be between 1 and {MAX_ORDER_TTL_MINUTES}. Using \
                 {DEFAULT_ORDER_TTL_MINUTES} minutes instead."
            );
            Duration::minutes(DEFAULT_ORDER_TTL_MINUTES)
        };
        let amount_tolerance =
            parse_or_default("CPG_AMOUNT_TOLERANCE", get("CPG_AMOUNT_TOLERANCE"), DEFAULT_AMOUNT_TOLERANCE);
        let amount_tolerance = if amount_tolerance.is_sign_negative() {
            warn!("🪛️ CPG_AMOUNT_TOLERANCE cannot be negative. Using {DEFAULT_AMOUNT_TOLERANCE} instead.");
            DEFAULT_AMOUNT_TOLERANCE
        } else {
            amount_tolerance
        };
        let sweep_interval = StdDuration::from_secs(
            parse_or_default("CPG_SWEEP_INTERVAL_SECS", get("CPG_SWEEP_INTERVAL_SECS"), DEFAULT_SWEEP_INTERVAL_SECS)
                .max(1),
        );
        let webhook_timeout = StdDuration::from_secs(
            parse_or_default("CPG_WEBHOOK_TIMEOUT_SECS", get("CPG_WEBHOOK_TIMEOUT_SECS"), DEFAULT_WEBHOOK_TIMEOUT_SECS)
                .max(1),
        );
        let admin_token = Secret::new(get("CPG_ADMIN_TOKEN").unwrap_or_else(|| {
            warn!("🪛️ CPG_ADMIN_TOKEN is not set. Admin routes are disabled.");
            String::default()
        }));
        Self {
            host,
            port,
            database_url,
            receiving_address,
            tokens,
            chain_id,
            webhook_secret,
            signature_header,
            min_confirmations,
            order_ttl,
            amount_tolerance,
            sweep_interval,
            webhook_timeout,
            admin_token,
        }
    }

    /// The subset of the configuration the reconciliation engine needs.
    pub fn reconciliation_config(&self) -> ReconciliationConfig {
        let policy = MatchPolicy { min_confirmations: self.min_confirmations, tolerance_cap: self.amount_tolerance };
        ReconciliationConfig::new(&self.receiving_address, self.tokens.clone())
            .with_chain_id(self.chain_id)
            .with_order_ttl(self.order_ttl)
            .with_match_policy(policy)
    }
}

fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => default,
        Some(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The handful of settings request handlers need. Secrets stay out of it.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub webhook_timeout: StdDuration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { webhook_timeout: config.webhook_timeout }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { webhook_timeout: StdDuration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS) }
    }
}
