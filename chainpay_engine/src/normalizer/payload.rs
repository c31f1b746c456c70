//! Provider payload shapes.
//!
//! Field names differ between provider versions, so every known alias gets its own field here. Which alias wins is
//! decided in one place, in the accessor methods on [`RawActivity`]. Nothing outside this module should look at the
//! raw structures.
use serde::Deserialize;
use serde_json::Value;

/// The outer webhook envelope. Activities are kept as raw JSON so that one malformed entry cannot fail the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "webhookId", default)]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub event: Option<EventBody>,
    #[serde(default)]
    pub data: Option<DataBody>,
    #[serde(default)]
    pub activity: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub activity: Option<Vec<Value>>,
    #[serde(default)]
    pub activities: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataBody {
    #[serde(default)]
    pub event: Option<EventBody>,
}

impl WebhookEnvelope {
    /// Activities from the first location that holds them: `event.activity`, `event.activities`,
    /// `data.event.activity`, then a top-level `activity`.
    pub fn take_activities(&mut self) -> Option<Vec<Value>> {
        let event = self.event.as_mut();
        let nested = self.data.as_mut().and_then(|d| d.event.as_mut());
        event
            .and_then(|e| e.activity.take().or_else(|| e.activities.take()))
            .or_else(|| nested.and_then(|e| e.activity.take()))
            .or_else(|| self.activity.take())
    }

    pub fn network(&self) -> Option<&str> {
        self.event
            .as_ref()
            .and_then(|e| e.network.as_deref())
            .or_else(|| self.data.as_ref().and_then(|d| d.event.as_ref()).and_then(|e| e.network.as_deref()))
            .or(self.network.as_deref())
    }

    pub fn id(&self) -> Option<&str> {
        self.webhook_id.as_deref().or(self.id.as_deref())
    }
}

/// One activity entry, with every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActivity {
    #[serde(rename = "toAddress")]
    pub to_address: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "toAddressRaw")]
    pub to_address_raw: Option<String>,
    #[serde(rename = "rawContract")]
    pub raw_contract: Option<RawContract>,
    #[serde(rename = "contractAddress")]
    pub contract_address: Option<String>,
    pub erc20: Option<Erc20Ref>,
    pub asset_contract: Option<AssetContract>,
    #[serde(rename = "erc20Metadata")]
    pub erc20_metadata: Option<TokenMetadata>,
    #[serde(rename = "erc20Transfer")]
    pub erc20_transfer: Option<TransferValue>,
    #[serde(rename = "rawValue")]
    pub raw_value: Option<Value>,
    pub decimals: Option<Value>,
    pub hash: Option<String>,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub confirmations: Option<Value>,
    #[serde(rename = "numConfirmations")]
    pub num_confirmations: Option<Value>,
    pub network: Option<String>,
    pub log: Option<RawLog>,
    #[serde(rename = "rawLog")]
    pub raw_log: Option<RawLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContract {
    pub address: Option<String>,
    #[serde(rename = "rawValue")]
    pub raw_value: Option<Value>,
    pub decimals: Option<Value>,
    pub decimal: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Erc20Ref {
    #[serde(rename = "contractAddress")]
    pub contract_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetContract {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenMetadata {
    pub decimals: Option<Value>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferValue {
    pub value: Option<Value>,
}

/// An ERC-20 `Transfer(address,address,uint256)` log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLog {
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub data: Option<String>,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn present(v: &Option<Value>) -> Option<&Value> {
    v.as_ref().filter(|v| !v.is_null())
}

impl RawLog {
    /// The recipient is the second indexed topic: a 32-byte word whose last 20 bytes are the address.
    pub fn recipient(&self) -> Option<String> {
        let topic = self.topics.get(2)?.trim();
        let hex = topic.strip_prefix("0x").unwrap_or(topic);
        (hex.len() == 64 && hex.is_ascii()).then(|| format!("0x{}", &hex[24..]))
    }
}

impl RawActivity {
    fn transfer_log(&self) -> Option<&RawLog> {
        self.log.as_ref().or(self.raw_log.as_ref())
    }

    pub fn destination(&self) -> Option<String> {
        non_empty(&self.to_address)
            .or_else(|| non_empty(&self.to))
            .or_else(|| non_empty(&self.to_address_raw))
            .map(String::from)
            .or_else(|| self.transfer_log().and_then(RawLog::recipient))
    }

    /// The token contract, or `None` for a native coin transfer.
    pub fn token_address(&self) -> Option<&str> {
        self.raw_contract
            .as_ref()
            .and_then(|c| non_empty(&c.address))
            .or_else(|| non_empty(&self.contract_address))
            .or_else(|| self.erc20.as_ref().and_then(|e| non_empty(&e.contract_address)))
            .or_else(|| self.asset_contract.as_ref().and_then(|a| non_empty(&a.address)))
            .or_else(|| self.transfer_log().and_then(|l| non_empty(&l.address)))
    }

    /// The integer amount in base units, as supplied. The decimal-adjusted `value` field is never used.
    pub fn raw_value(&self) -> Option<&Value> {
        self.raw_contract
            .as_ref()
            .and_then(|c| present(&c.raw_value))
            .or_else(|| present(&self.raw_value))
            .or_else(|| self.erc20_transfer.as_ref().and_then(|t| present(&t.value)))
    }

    pub fn log_data(&self) -> Option<&str> {
        self.transfer_log().and_then(|l| non_empty(&l.data))
    }

    pub fn decimals(&self) -> Option<&Value> {
        self.raw_contract
            .as_ref()
            .and_then(|c| present(&c.decimals).or_else(|| present(&c.decimal)))
            .or_else(|| self.erc20_metadata.as_ref().and_then(|m| present(&m.decimals)))
            .or_else(|| present(&self.decimals))
    }

    pub fn tx_hash(&self) -> Option<&str> {
        non_empty(&self.hash)
            .or_else(|| non_empty(&self.transaction_hash))
            .or_else(|| non_empty(&self.tx_hash))
            .or_else(|| self.transfer_log().and_then(|l| non_empty(&l.transaction_hash)))
    }

    pub fn confirmations(&self) -> Option<&Value> {
        present(&self.confirmations).or_else(|| present(&self.num_confirmations))
    }

    pub fn network(&self) -> Option<&str> {
        non_empty(&self.network)
    }
}
