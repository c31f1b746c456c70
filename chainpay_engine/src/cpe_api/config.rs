use chrono::Duration;

use crate::{helpers::RetryPolicy, matcher::MatchPolicy, tokens::TokenRegistry};

pub const DEFAULT_ORDER_TTL_MINUTES: i64 = 15;
pub const DEFAULT_CANDIDATE_LIMIT: u32 = 200;
pub const ARBITRUM_ONE_CHAIN_ID: u64 = 42161;

/// Everything the reconciliation engine needs to know about the store it is collecting payments for.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// The store's deposit address. Transfers to any other address are ignored.
    pub receiving_address: String,
    pub tokens: TokenRegistry,
    /// Used to build payment URIs
    pub chain_id: u64,
    pub order_ttl: Duration,
    pub match_policy: MatchPolicy,
    /// The maximum number of orders with a matching amount considered for a single transfer
    pub candidate_limit: u32,
    pub read_retry: RetryPolicy,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            receiving_address: String::default(),
            tokens: TokenRegistry::default(),
            chain_id: ARBITRUM_ONE_CHAIN_ID,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
            match_policy: MatchPolicy::default(),
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            read_retry: RetryPolicy::default(),
        }
    }
}

impl ReconciliationConfig {
    pub fn new<S: Into<String>>(receiving_address: S, tokens: TokenRegistry) -> Self {
        Self { receiving_address: receiving_address.into().trim().to_ascii_lowercase(), tokens, ..Default::default() }
    }

    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }
}
