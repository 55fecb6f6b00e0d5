//! Legacy (pre-EIP-2718) transactions.
//!
//! Typed transaction envelopes are not modeled. Inside a block body each
//! transaction is stored as a byte string holding its own RLP encoding.

use bytes::Bytes;
use ethereum_types::{H256, U256};
use keccak_hash::keccak;

use crate::{
    item::{rlp_decode, rlp_encode, DecodingError, DecodingResult, RlpItem},
    json::JsonTransaction,
    scalar::{
        bytes_to_u256, bytes_to_u64, encode_scalar_as, scalar_to_u256, scalar_to_u64, to_hex_data,
        to_hex_quantity, u256_to_bytes, u64_to_bytes, EncodingError, ScalarKind, ScalarValue,
    },
};

const TX_FIELD_COUNT: usize = 9;

/// A legacy transaction, as embedded in a block body.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    /// Empty for contract creations.
    pub to: Bytes,
    pub value: U256,
    pub input: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl Transaction {
    /// The 9 encoded fields, in order.
    pub fn rlp_fields(&self) -> [Bytes; TX_FIELD_COUNT] {
        [
            u64_to_bytes(self.nonce),
            u256_to_bytes(self.gas_price),
            u64_to_bytes(self.gas),
            self.to.clone(),
            u256_to_bytes(self.value),
            self.input.clone(),
            u256_to_bytes(self.v),
            u256_to_bytes(self.r),
            u256_to_bytes(self.s),
        ]
    }

    pub fn to_rlp_item(&self) -> RlpItem {
        RlpItem::bytes_list(self.rlp_fields())
    }

    /// The RLP of the 9-field list.
    pub fn encode(&self) -> Bytes {
        rlp_encode(&self.to_rlp_item())
    }

    /// The transaction as it is embedded in a block body: a byte string
    /// wrapping [`Transaction::encode`].
    pub fn to_body_item(&self) -> RlpItem {
        RlpItem::Bytes(self.encode())
    }

    /// Keccak of the encoded transaction.
    pub fn hash(&self) -> H256 {
        keccak(self.encode())
    }

    /// Decodes a transaction from a byte string wrapping its RLP, as found in
    /// block bodies. A bare 9-field list is accepted as well.
    pub fn from_rlp_item(item: &RlpItem) -> DecodingResult<Self> {
        let fields = match item {
            RlpItem::List(_) => item.expect_bytes_list("transaction")?,
            RlpItem::Bytes(wrapped) => rlp_decode(wrapped)?.expect_bytes_list("transaction")?,
        };

        let [nonce, gas_price, gas, to, value, input, v, r, s] = <[Bytes; TX_FIELD_COUNT]>::try_from(
            fields,
        )
        .map_err(|fields| DecodingError::ItemCount {
            what: "transaction",
            expected: "9",
            found: fields.len(),
        })?;

        Ok(Self {
            nonce: read_u64("nonce", &nonce)?,
            gas_price: read_u256("gasPrice", &gas_price)?,
            gas: read_u64("gas", &gas)?,
            to,
            value: read_u256("value", &value)?,
            input,
            v: read_u256("v", &v)?,
            r: read_u256("r", &r)?,
            s: read_u256("s", &s)?,
        })
    }

    pub fn to_json(&self) -> JsonTransaction {
        let quantity = |b: Bytes| ScalarValue::from(to_hex_quantity(&b));

        JsonTransaction {
            nonce: quantity(u64_to_bytes(self.nonce)),
            gas_price: quantity(u256_to_bytes(self.gas_price)),
            gas: quantity(u64_to_bytes(self.gas)),
            to: match self.to.is_empty() {
                true => ScalarValue::Null,
                false => to_hex_data(&self.to).into(),
            },
            value: quantity(u256_to_bytes(self.value)),
            input: to_hex_data(&self.input).into(),
            v: quantity(u256_to_bytes(self.v)),
            r: quantity(u256_to_bytes(self.r)),
            s: quantity(u256_to_bytes(self.s)),
            hash: Some(to_hex_data(self.hash().as_bytes()).into()),
        }
    }
}

impl TryFrom<&JsonTransaction> for Transaction {
    type Error = EncodingError;

    fn try_from(json: &JsonTransaction) -> Result<Self, Self::Error> {
        Ok(Self {
            nonce: scalar_to_u64(&json.nonce, "nonce")?,
            gas_price: scalar_to_u256(&json.gas_price, "gasPrice")?,
            gas: scalar_to_u64(&json.gas, "gas")?,
            to: encode_scalar_as(&json.to, "to", ScalarKind::Bytes)?,
            value: scalar_to_u256(&json.value, "value")?,
            input: encode_scalar_as(&json.input, "input", ScalarKind::Bytes)?,
            v: scalar_to_u256(&json.v, "v")?,
            r: scalar_to_u256(&json.r, "r")?,
            s: scalar_to_u256(&json.s, "s")?,
        })
    }
}

fn read_u64(field: &'static str, bytes: &[u8]) -> DecodingResult<u64> {
    bytes_to_u64(bytes).map_err(|e| DecodingError::invalid_field(field, bytes, e))
}

fn read_u256(field: &'static str, bytes: &[u8]) -> DecodingResult<U256> {
    bytes_to_u256(bytes).map_err(|e| DecodingError::invalid_field(field, bytes, e))
}
