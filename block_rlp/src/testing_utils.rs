use block_rlp_common::{BLOOM_BYTE_LEN, EMPTY_TRIE_HASH, EMPTY_UNCLE_HASH};
use bytes::Bytes;
use ethereum_types::U256;
use hex_literal::hex;

use crate::{
    header::Header,
    json::{JsonBlock, JsonHeader, JsonTransaction},
    scalar::ScalarValue,
};

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

/// The Ethereum mainnet genesis header. Hashes to `0xd4e5...8fa3`.
pub(crate) fn mainnet_genesis_header() -> Header {
    Header {
        parent_hash: Bytes::from_static(&[0; 32]),
        uncles_hash: Bytes::copy_from_slice(EMPTY_UNCLE_HASH.as_bytes()),
        miner: Bytes::from_static(&[0; 20]),
        state_root: Bytes::copy_from_slice(&hex!(
            "d7f8974fb5ac78d9ac099b9ad5018bedc2ce0a72dad1827a1709da30580f0544"
        )),
        transactions_root: Bytes::copy_from_slice(EMPTY_TRIE_HASH.as_bytes()),
        receipts_root: Bytes::copy_from_slice(EMPTY_TRIE_HASH.as_bytes()),
        logs_bloom: vec![0; BLOOM_BYTE_LEN].into(),
        difficulty: U256::from(0x400000000u64),
        number: 0,
        gas_limit: 0x1388,
        gas_used: 0,
        timestamp: 0,
        extra_data: hex!("11bbe8db4e347b4e8c937c1c8370e4b5ed33adb3db69cbdb7a38e1e50b1b82fa")
            .to_vec()
            .into(),
        mix_hash: Bytes::from_static(&[0; 32]),
        nonce: Bytes::copy_from_slice(&hex!("0000000000000042")),
        ..Default::default()
    }
}

fn hex32(byte: u8) -> ScalarValue {
    format!("0x{}", hex::encode([byte; 32])).into()
}

/// A pre-London header with distinct, deterministic field values.
pub(crate) fn json_header(number: u64) -> JsonHeader {
    JsonHeader {
        parent_hash: hex32(0x01),
        sha3_uncles: format!("{:?}", EMPTY_UNCLE_HASH).into(),
        miner: "0x8888f1f195afa192cfee860698584c030f4c9db1".into(),
        state_root: hex32(0x02),
        transactions_root: format!("{:?}", EMPTY_TRIE_HASH).into(),
        receipts_root: format!("{:?}", EMPTY_TRIE_HASH).into(),
        logs_bloom: "0x00".into(),
        difficulty: "0x20000".into(),
        number: format!("0x{:x}", number).into(),
        gas_limit: "0x2fefd8".into(),
        gas_used: "0x5208".into(),
        timestamp: ScalarValue::Int(1_438_269_988 + number),
        extra_data: "0x476574682f76312e302e302f6c696e75782f676f312e342e32".into(),
        mix_hash: hex32(0x03),
        nonce: "0x0102030405060708".into(),
        ..Default::default()
    }
}

pub(crate) fn json_transaction(nonce: u64) -> JsonTransaction {
    JsonTransaction {
        nonce: ScalarValue::Int(nonce),
        gas_price: "0x4a817c800".into(),
        gas: "0x5208".into(),
        to: "0x3535353535353535353535353535353535353535".into(),
        value: "0xde0b6b3a7640000".into(),
        input: "0x".into(),
        v: "0x25".into(),
        r: hex32(0x28),
        s: hex32(0x67),
        hash: None,
    }
}

/// A block with `tx_count` transactions and no uncles.
pub(crate) fn json_block(number: u64, tx_count: usize) -> JsonBlock {
    JsonBlock {
        header: json_header(number),
        transactions: (0..tx_count as u64).map(json_transaction).collect(),
        uncles: Vec::new(),
        hash: None,
    }
}
