//! Loosely typed block records, as found in JSON-RPC responses and block dump
//! files.
//!
//! These types only capture the shape of the input. Values are validated and
//! converted into [`Header`](crate::header::Header),
//! [`Transaction`](crate::transaction::Transaction) and
//! [`Block`](crate::block::Block) before any codec logic runs.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::scalar::ScalarValue;

/// Deserializes a field that is present in the input, even when it is `null`.
///
/// Used together with `#[serde(default)]`, so that an absent key stays `None`
/// while `"key": null` becomes `Some(ScalarValue::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<ScalarValue>, D::Error>
where
    D: Deserializer<'de>,
{
    ScalarValue::deserialize(deserializer).map(Some)
}

/// A block header with its fields under their JSON-RPC names. Legacy go-style
/// names are accepted as aliases.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonHeader {
    pub parent_hash: ScalarValue,
    #[serde(alias = "uncleHash")]
    pub sha3_uncles: ScalarValue,
    #[serde(alias = "coinbase")]
    pub miner: ScalarValue,
    pub state_root: ScalarValue,
    #[serde(alias = "transactionRoot")]
    pub transactions_root: ScalarValue,
    #[serde(alias = "receiptRoot")]
    pub receipts_root: ScalarValue,
    #[serde(alias = "bloom")]
    pub logs_bloom: ScalarValue,
    pub difficulty: ScalarValue,
    pub number: ScalarValue,
    pub gas_limit: ScalarValue,
    pub gas_used: ScalarValue,
    #[serde(alias = "time")]
    pub timestamp: ScalarValue,
    #[serde(alias = "extra")]
    pub extra_data: ScalarValue,
    #[serde(alias = "mixDigest")]
    pub mix_hash: ScalarValue,
    pub nonce: ScalarValue,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee_per_gas: Option<ScalarValue>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub withdrawals_root: Option<ScalarValue>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub blob_gas_used: Option<ScalarValue>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub excess_blob_gas: Option<ScalarValue>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_beacon_block_root: Option<ScalarValue>,

    /// Not part of the encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ScalarValue>,
}

/// A legacy transaction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonTransaction {
    pub nonce: ScalarValue,
    pub gas_price: ScalarValue,
    pub gas: ScalarValue,
    /// `null` for contract creations.
    #[serde(default)]
    pub to: ScalarValue,
    pub value: ScalarValue,
    #[serde(alias = "data")]
    pub input: ScalarValue,
    pub v: ScalarValue,
    pub r: ScalarValue,
    pub s: ScalarValue,

    /// Not part of the encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ScalarValue>,
}

/// An uncle, as either a full header or just its hash (which is what
/// `eth_getBlockByNumber` returns).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonUncle {
    Hash(String),
    Header(Box<JsonHeader>),
    /// An uncle whose contents are unknown.
    Placeholder,
}

/// A block, serialized with its header nested under `header`.
///
/// On input the header fields may also be flattened onto the block object,
/// as in `eth_getBlockByNumber` responses, and transactions may be listed
/// under `Txs`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonBlock {
    pub header: JsonHeader,
    pub transactions: Vec<JsonTransaction>,
    pub uncles: Vec<JsonUncle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<ScalarValue>,
}

#[derive(Deserialize)]
struct RawJsonBlock {
    #[serde(default)]
    header: Option<JsonHeader>,
    #[serde(default, alias = "Txs")]
    transactions: Vec<JsonTransaction>,
    #[serde(default)]
    uncles: Vec<JsonUncle>,
    #[serde(default)]
    hash: Option<ScalarValue>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl<'de> Deserialize<'de> for JsonBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawJsonBlock::deserialize(deserializer)?;

        let header = match raw.header {
            Some(header) => header,
            None => {
                let mut header: JsonHeader =
                    serde_json::from_value(Value::Object(raw.rest)).map_err(D::Error::custom)?;
                header.hash = header.hash.or_else(|| raw.hash.clone());
                header
            }
        };

        Ok(Self {
            header,
            transactions: raw.transactions,
            uncles: raw.uncles,
            hash: raw.hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_optional_fields_differ() {
        let header: JsonHeader = serde_json::from_value(serde_json::json!({
            "parentHash": "0x00", "sha3Uncles": "0x00", "miner": "0x00",
            "stateRoot": "0x00", "transactionsRoot": "0x00", "receiptsRoot": "0x00",
            "logsBloom": "0x00", "difficulty": "0x0", "number": "0x1",
            "gasLimit": "0x0", "gasUsed": "0x0", "timestamp": "0x0",
            "extraData": "0x", "mixHash": "0x00", "nonce": "0x00",
            "baseFeePerGas": null,
        }))
        .unwrap();

        assert_eq!(header.base_fee_per_gas, Some(ScalarValue::Null));
        assert_eq!(header.withdrawals_root, None);
    }

    #[test]
    fn legacy_aliases_are_accepted() {
        let header: JsonHeader = serde_json::from_value(serde_json::json!({
            "parentHash": "0x01", "uncleHash": "0x02", "coinbase": "0x03",
            "stateRoot": "0x04", "transactionRoot": "0x05", "receiptRoot": "0x06",
            "bloom": "0x07", "difficulty": 8, "number": 9,
            "gasLimit": 10, "gasUsed": 11, "time": 12,
            "extra": "0x0d", "mixDigest": "0x0e", "nonce": "0x0f",
        }))
        .unwrap();

        assert_eq!(header.sha3_uncles, ScalarValue::from("0x02"));
        assert_eq!(header.timestamp, ScalarValue::Int(12));
        assert_eq!(header.mix_hash, ScalarValue::from("0x0e"));
    }

    #[test]
    fn flattened_rpc_blocks_are_accepted() {
        let block: JsonBlock = serde_json::from_value(serde_json::json!({
            "hash": "0xaa",
            "parentHash": "0x00", "sha3Uncles": "0x00", "miner": "0x00",
            "stateRoot": "0x00", "transactionsRoot": "0x00", "receiptsRoot": "0x00",
            "logsBloom": "0x00", "difficulty": "0x0", "number": "0x1",
            "gasLimit": "0x0", "gasUsed": "0x0", "timestamp": "0x0",
            "extraData": "0x", "mixHash": "0x00", "nonce": "0x00",
            "size": "0x220", "totalDifficulty": "0x0",
            "uncles": ["0xbb"],
            "Txs": [],
        }))
        .unwrap();

        assert_eq!(block.header.number, ScalarValue::from("0x1"));
        assert_eq!(block.header.hash, Some(ScalarValue::from("0xaa")));
        assert_eq!(block.uncles, vec![JsonUncle::Hash("0xbb".to_owned())]);
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let res: Result<JsonBlock, _> = serde_json::from_value(serde_json::json!({
            "header": { "parentHash": "0x00" },
        }));

        assert!(res.unwrap_err().to_string().contains("missing field"));
    }
}
