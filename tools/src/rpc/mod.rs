use std::{future::Future, ops::RangeInclusive};

use alloy::{
    providers::{Provider, RootProvider},
    transports::Transport,
};
use anyhow::{anyhow, Context as _};
use block_rlp::json::JsonBlock;
use serde_json::{json, Value};
use tracing::{debug, info};

pub mod retry;

/// A JSON-RPC endpoint that blocks are fetched from.
pub trait RpcCaller {
    /// Calls `method` and returns its `result`. JSON-RPC error responses are
    /// returned as errors.
    fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = anyhow::Result<Value>> + Send;
}

impl<T> RpcCaller for RootProvider<T>
where
    T: Transport + Clone,
{
    fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = anyhow::Result<Value>> + Send {
        let method = method.to_owned();

        async move {
            self.raw_request::<_, Value>(method.clone().into(), params)
                .await
                .with_context(|| format!("RPC call `{}` failed", method))
        }
    }
}

/// Fetches `blocks` with their full transactions, in ascending order.
pub async fn fetch_blocks<C>(caller: &C, blocks: RangeInclusive<u64>) -> anyhow::Result<Vec<JsonBlock>>
where
    C: RpcCaller,
{
    info!("Fetching blocks {} to {}", blocks.start(), blocks.end());

    let mut out = Vec::with_capacity(blocks.clone().count());
    for number in blocks {
        out.push(fetch_block(caller, number).await?);
    }

    Ok(out)
}

/// Fetches a single block via `eth_getBlockByNumber`.
pub async fn fetch_block<C>(caller: &C, number: u64) -> anyhow::Result<JsonBlock>
where
    C: RpcCaller,
{
    let params = vec![json!(format!("0x{:x}", number)), json!(true)];
    let raw = caller.call("eth_getBlockByNumber", params).await?;

    if raw.is_null() {
        return Err(anyhow!("Block {} not found", number));
    }

    let block: JsonBlock = serde_path_to_error::deserialize(raw)
        .with_context(|| format!("Failed to parse block {}", number))?;
    debug!(
        "Fetched block {} with {} transactions",
        number,
        block.transactions.len()
    );

    Ok(block)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, future::ready, sync::Mutex};

    use block_rlp::scalar::ScalarValue;

    use super::*;

    /// Serves canned `eth_getBlockByNumber` responses and records calls.
    #[derive(Default)]
    struct FakeNode {
        blocks: HashMap<String, Value>,
        calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl FakeNode {
        fn with_blocks(numbers: RangeInclusive<u64>) -> Self {
            let blocks = numbers
                .map(|n| (format!("0x{:x}", n), rpc_block(n)))
                .collect();

            Self {
                blocks,
                ..Default::default()
            }
        }
    }

    impl RpcCaller for FakeNode {
        fn call(
            &self,
            method: &str,
            params: Vec<Value>,
        ) -> impl Future<Output = anyhow::Result<Value>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_owned(), params.clone()));

            let res = match params.first().and_then(Value::as_str) {
                Some(number) => Ok(self.blocks.get(number).cloned().unwrap_or(Value::Null)),
                None => Err(anyhow!("missing block number")),
            };
            ready(res)
        }
    }

    fn rpc_block(number: u64) -> Value {
        let h32 = format!("0x{}", "00".repeat(32));
        json!({
            "hash": format!("0x{:064x}", number + 1000),
            "parentHash": h32, "sha3Uncles": h32, "miner": format!("0x{}", "00".repeat(20)),
            "stateRoot": h32, "transactionsRoot": h32, "receiptsRoot": h32,
            "logsBloom": "0x00", "difficulty": "0x0", "number": format!("0x{:x}", number),
            "gasLimit": "0x1c9c380", "gasUsed": "0x0", "timestamp": "0x6513a1c0",
            "extraData": "0x", "mixHash": h32, "nonce": "0x0000000000000000",
            "baseFeePerGas": "0x7",
            "transactions": [], "uncles": [],
        })
    }

    #[tokio::test]
    async fn blocks_are_fetched_in_order() {
        let node = FakeNode::with_blocks(10..=12);
        let blocks = fetch_blocks(&node, 10..=12).await.unwrap();

        let numbers: Vec<_> = blocks.iter().map(|b| b.header.number.clone()).collect();
        assert_eq!(
            numbers,
            vec![
                ScalarValue::from("0xa"),
                ScalarValue::from("0xb"),
                ScalarValue::from("0xc")
            ]
        );

        let calls = node.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "eth_getBlockByNumber");
        assert_eq!(calls[0].1, vec![json!("0xa"), json!(true)]);
    }

    #[tokio::test]
    async fn missing_blocks_fail_the_fetch() {
        let node = FakeNode::with_blocks(1..=2);
        let err = fetch_blocks(&node, 1..=3).await.unwrap_err();

        assert_eq!(err.to_string(), "Block 3 not found");
    }

    #[tokio::test]
    async fn malformed_blocks_report_the_field() {
        let mut node = FakeNode::with_blocks(5..=5);
        if let Some(block) = node.blocks.get_mut("0x5") {
            block["transactions"] = json!(["0x1234"]);
        }

        let err = fetch_block(&node, 5).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse block 5");
        assert!(format!("{:#}", err).contains("expected struct JsonTransaction"));
    }
}
