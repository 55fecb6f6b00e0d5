//! Block hashing.

use ethereum_types::H256;
use keccak_hash::keccak;

use crate::{
    header::{build_header_rlp, Header},
    item::{rlp_encode, RlpItem},
};

/// Keccak-256 of the RLP encoding of the header's field list.
pub fn hash_header(header: &Header) -> H256 {
    let encoded = rlp_encode(&RlpItem::bytes_list(build_header_rlp(header)));
    keccak(encoded)
}

/// `0x` followed by the 64 lowercase hex characters of `hash`.
pub fn to_hex_hash(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}
