use ethereum_types::H256;

/// The `sha3Uncles` value of a block without uncles, i.e. the hash of an
/// empty RLP list.
/// 0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347
pub const EMPTY_UNCLE_HASH: H256 = H256([
    29, 204, 77, 232, 222, 199, 93, 122, 171, 133, 181, 103, 182, 204, 212, 26, 211, 18, 69, 27,
    148, 138, 116, 19, 240, 161, 66, 253, 64, 212, 147, 71,
]);

/// The hash of an empty Merkle Patricia trie.
/// 0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421
pub const EMPTY_TRIE_HASH: H256 = H256([
    86, 232, 31, 23, 27, 204, 85, 166, 255, 131, 69, 230, 146, 192, 248, 110, 91, 72, 224, 27, 153,
    108, 173, 192, 1, 98, 47, 181, 227, 99, 180, 33,
]);

/// Width in bytes of a header `logsBloom`.
pub const BLOOM_BYTE_LEN: usize = 256;

/// Width in bytes of a Keccak-256 digest.
pub const HASH_BYTE_LEN: usize = 32;

/// Number of header fields every fork carries, before the optional suffix
/// introduced by London and later upgrades.
pub const REQUIRED_HEADER_FIELDS: usize = 15;

/// Upper bound on the header field count (Cancun).
pub const MAX_HEADER_FIELDS: usize = 20;

#[test]
fn test_empty_uncle_hash() {
    assert_eq!(
        EMPTY_UNCLE_HASH,
        keccak_hash::keccak(bytes::Bytes::from_static(&rlp::EMPTY_LIST_RLP))
    );
}

#[test]
fn test_empty_trie_hash() {
    assert_eq!(
        EMPTY_TRIE_HASH,
        keccak_hash::keccak(bytes::Bytes::from_static(&rlp::NULL_RLP))
    );
}

#[test]
fn test_bloom_width_matches_type() {
    assert_eq!(BLOOM_BYTE_LEN, ethereum_types::Bloom::len_bytes());
}
