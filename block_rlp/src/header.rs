//! The block header schema.
//!
//! A header is encoded positionally: 15 fields every fork carries, followed
//! by an append-only suffix of optional fields, one group per protocol
//! upgrade. Because decoding is positional, a suffix field can only be
//! present if every optional field before it is present too. Ingestion
//! enforces this with a [`SchemaError`] rather than silently dropping the
//! fields after a gap.
//!
//! Integer fields are held as numbers. Every other field is held as the exact
//! bytes it encodes to: hashes, `miner` and `nonce` are not padded or
//! truncated to their usual widths, and a `null` or `""` value is kept as an
//! empty byte string.

use std::fmt::{self, Display};

use block_rlp_common::{MAX_HEADER_FIELDS, REQUIRED_HEADER_FIELDS};
use bytes::Bytes;
use ethereum_types::{H256, U256};
use log::trace;
use thiserror::Error;

use crate::{
    item::{DecodingError, DecodingResult, RlpItem},
    json::JsonHeader,
    scalar::{
        bytes_to_u256, bytes_to_u64, encode_scalar_as, scalar_to_fixed, scalar_to_u256, scalar_to_u64,
        to_hex_data, to_hex_quantity, u256_to_bytes, u64_to_bytes, EncodingError, ScalarKind,
        ScalarValue,
    },
};

/// An error raised when the optional header suffix is not filled in fork
/// order.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum SchemaError {
    /// A later optional field is present while an earlier one is absent.
    #[error("Header field `{present}` is present but the earlier field `{missing}` is absent")]
    Gap {
        /// The first absent optional field.
        missing: HeaderField,
        /// A field after it that is present.
        present: HeaderField,
    },

    /// An optional field was pushed to a [`HeaderBuilder`] out of fork order.
    #[error("Header field `{field}` was added out of fork order (next free slot: {expected:?})")]
    OutOfOrder {
        /// The field that was pushed.
        field: HeaderField,
        /// The only field that could have been pushed, if any.
        expected: Option<HeaderField>,
    },
}

/// Every header field, in encoding order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum HeaderField {
    ParentHash,
    UnclesHash,
    Miner,
    StateRoot,
    TransactionsRoot,
    ReceiptsRoot,
    LogsBloom,
    Difficulty,
    Number,
    GasLimit,
    GasUsed,
    Timestamp,
    ExtraData,
    MixHash,
    Nonce,
    BaseFeePerGas,
    WithdrawalsRoot,
    BlobGasUsed,
    ExcessBlobGas,
    ParentBeaconBlockRoot,
}

impl HeaderField {
    /// All fields, in encoding order.
    pub const ALL: [HeaderField; MAX_HEADER_FIELDS] = [
        Self::ParentHash,
        Self::UnclesHash,
        Self::Miner,
        Self::StateRoot,
        Self::TransactionsRoot,
        Self::ReceiptsRoot,
        Self::LogsBloom,
        Self::Difficulty,
        Self::Number,
        Self::GasLimit,
        Self::GasUsed,
        Self::Timestamp,
        Self::ExtraData,
        Self::MixHash,
        Self::Nonce,
        Self::BaseFeePerGas,
        Self::WithdrawalsRoot,
        Self::BlobGasUsed,
        Self::ExcessBlobGas,
        Self::ParentBeaconBlockRoot,
    ];

    /// The optional suffix, in fork order.
    pub const OPTIONAL: [HeaderField; MAX_HEADER_FIELDS - REQUIRED_HEADER_FIELDS] = [
        Self::BaseFeePerGas,
        Self::WithdrawalsRoot,
        Self::BlobGasUsed,
        Self::ExcessBlobGas,
        Self::ParentBeaconBlockRoot,
    ];

    /// Index of the field in the encoded header list.
    pub const fn position(self) -> usize {
        self as usize
    }

    pub const fn is_optional(self) -> bool {
        self.position() >= REQUIRED_HEADER_FIELDS
    }

    /// The JSON-RPC name of the field.
    pub const fn json_name(self) -> &'static str {
        match self {
            Self::ParentHash => "parentHash",
            Self::UnclesHash => "sha3Uncles",
            Self::Miner => "miner",
            Self::StateRoot => "stateRoot",
            Self::TransactionsRoot => "transactionsRoot",
            Self::ReceiptsRoot => "receiptsRoot",
            Self::LogsBloom => "logsBloom",
            Self::Difficulty => "difficulty",
            Self::Number => "number",
            Self::GasLimit => "gasLimit",
            Self::GasUsed => "gasUsed",
            Self::Timestamp => "timestamp",
            Self::ExtraData => "extraData",
            Self::MixHash => "mixHash",
            Self::Nonce => "nonce",
            Self::BaseFeePerGas => "baseFeePerGas",
            Self::WithdrawalsRoot => "withdrawalsRoot",
            Self::BlobGasUsed => "blobGasUsed",
            Self::ExcessBlobGas => "excessBlobGas",
            Self::ParentBeaconBlockRoot => "parentBeaconBlockRoot",
        }
    }

    /// The scalar encoding policy of the field.
    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::LogsBloom => ScalarKind::Bloom,
            Self::Difficulty
            | Self::Number
            | Self::GasLimit
            | Self::GasUsed
            | Self::Timestamp
            | Self::BaseFeePerGas
            | Self::BlobGasUsed
            | Self::ExcessBlobGas => ScalarKind::Integer,
            _ => ScalarKind::Bytes,
        }
    }
}

impl Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.json_name())
    }
}

/// The header layout of a protocol upgrade.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum HeaderFork {
    /// 15 fields.
    Frontier,
    /// Adds `baseFeePerGas`.
    London,
    /// Adds `withdrawalsRoot`.
    Shanghai,
    /// Adds `blobGasUsed`, `excessBlobGas` and `parentBeaconBlockRoot`.
    Cancun,
}

impl HeaderFork {
    /// The fork whose complete layout is covered by `suffix_len` optional
    /// fields. Partial Cancun suffixes report as Shanghai.
    pub const fn from_suffix_len(suffix_len: usize) -> Self {
        match suffix_len {
            0 => Self::Frontier,
            1 => Self::London,
            2..=4 => Self::Shanghai,
            _ => Self::Cancun,
        }
    }

    /// Number of encoded header fields in this fork's layout.
    pub const fn field_count(self) -> usize {
        REQUIRED_HEADER_FIELDS
            + match self {
                Self::Frontier => 0,
                Self::London => 1,
                Self::Shanghai => 2,
                Self::Cancun => 5,
            }
    }
}

impl Display for HeaderFork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaderFork::Frontier => "Frontier",
            HeaderFork::London => "London",
            HeaderFork::Shanghai => "Shanghai",
            HeaderFork::Cancun => "Cancun",
        };

        write!(f, "{}", s)
    }
}

/// A validated block header.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub parent_hash: Bytes,
    pub uncles_hash: Bytes,
    pub miner: Bytes,
    pub state_root: Bytes,
    pub transactions_root: Bytes,
    pub receipts_root: Bytes,
    /// 256 bytes unless the input bloom was `null` or `""`.
    pub logs_bloom: Bytes,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: Bytes,
    pub nonce: Bytes,

    /// London.
    pub base_fee_per_gas: Option<U256>,
    /// Shanghai.
    pub withdrawals_root: Option<Bytes>,
    /// Cancun.
    pub blob_gas_used: Option<u64>,
    /// Cancun.
    pub excess_blob_gas: Option<u64>,
    /// Cancun.
    pub parent_beacon_block_root: Option<Bytes>,

    /// The hash of this header, when known. Never part of the encoding.
    pub hash: Option<H256>,
}

impl Header {
    /// The parent hash, if it is 32 bytes wide.
    pub fn parent(&self) -> Option<H256> {
        <[u8; 32]>::try_from(&self.parent_hash[..]).ok().map(H256)
    }

    /// Points the header at `parent`.
    pub fn set_parent(&mut self, parent: H256) {
        self.parent_hash = Bytes::copy_from_slice(parent.as_bytes());
    }

    /// Presence of each optional field, in fork order.
    fn suffix_presence(&self) -> [bool; 5] {
        [
            self.base_fee_per_gas.is_some(),
            self.withdrawals_root.is_some(),
            self.blob_gas_used.is_some(),
            self.excess_blob_gas.is_some(),
            self.parent_beacon_block_root.is_some(),
        ]
    }

    /// Number of optional fields that will be encoded.
    pub fn suffix_len(&self) -> usize {
        self.suffix_presence().iter().take_while(|p| **p).count()
    }

    /// The layout this header is encoded with.
    pub fn fork(&self) -> HeaderFork {
        HeaderFork::from_suffix_len(self.suffix_len())
    }

    /// Checks that the optional suffix has no gaps.
    pub fn check_schema(&self) -> Result<HeaderFork, SchemaError> {
        check_suffix(&self.suffix_presence())?;
        Ok(self.fork())
    }

    /// Converts the canonical encoded fields back into a header.
    ///
    /// Optional fields are taken by position: a list of 16 fields yields a
    /// London header, and so on.
    pub fn from_rlp_fields(fields: &[Bytes]) -> DecodingResult<Self> {
        if !(REQUIRED_HEADER_FIELDS..=MAX_HEADER_FIELDS).contains(&fields.len()) {
            return Err(DecodingError::ItemCount {
                what: "block header",
                expected: "15 to 20",
                found: fields.len(),
            });
        }

        let raw = |f: HeaderField| fields[f.position()].clone();
        let int = |f: HeaderField| &fields[f.position()][..];
        let optional = |f: HeaderField| fields.get(f.position());

        let header = Self {
            parent_hash: raw(HeaderField::ParentHash),
            uncles_hash: raw(HeaderField::UnclesHash),
            miner: raw(HeaderField::Miner),
            state_root: raw(HeaderField::StateRoot),
            transactions_root: raw(HeaderField::TransactionsRoot),
            receipts_root: raw(HeaderField::ReceiptsRoot),
            logs_bloom: raw(HeaderField::LogsBloom),
            difficulty: read_u256(HeaderField::Difficulty, int(HeaderField::Difficulty))?,
            number: read_u64(HeaderField::Number, int(HeaderField::Number))?,
            gas_limit: read_u64(HeaderField::GasLimit, int(HeaderField::GasLimit))?,
            gas_used: read_u64(HeaderField::GasUsed, int(HeaderField::GasUsed))?,
            timestamp: read_u64(HeaderField::Timestamp, int(HeaderField::Timestamp))?,
            extra_data: raw(HeaderField::ExtraData),
            mix_hash: raw(HeaderField::MixHash),
            nonce: raw(HeaderField::Nonce),
            base_fee_per_gas: optional(HeaderField::BaseFeePerGas)
                .map(|b| read_u256(HeaderField::BaseFeePerGas, b))
                .transpose()?,
            withdrawals_root: optional(HeaderField::WithdrawalsRoot).cloned(),
            blob_gas_used: optional(HeaderField::BlobGasUsed)
                .map(|b| read_u64(HeaderField::BlobGasUsed, b))
                .transpose()?,
            excess_blob_gas: optional(HeaderField::ExcessBlobGas)
                .map(|b| read_u64(HeaderField::ExcessBlobGas, b))
                .transpose()?,
            parent_beacon_block_root: optional(HeaderField::ParentBeaconBlockRoot).cloned(),
            hash: None,
        };

        trace!(
            "Decoded header {} with {} fields ({})",
            header.number,
            fields.len(),
            header.fork()
        );

        Ok(header)
    }

    /// Decodes a header from its RLP list.
    pub fn from_rlp_item(item: &RlpItem) -> DecodingResult<Self> {
        Self::from_rlp_fields(&item.expect_bytes_list("block header")?)
    }

    /// The header as a flat RLP list.
    pub fn to_rlp_item(&self) -> RlpItem {
        RlpItem::bytes_list(build_header_rlp(self))
    }

    /// The header in its JSON-RPC shape. Integers are formatted as hex
    /// quantities, so `0x00` in the input comes back as `0x0`.
    pub fn to_json(&self) -> JsonHeader {
        let data = |b: &[u8]| ScalarValue::from(to_hex_data(b));
        let quantity = |b: Bytes| ScalarValue::from(to_hex_quantity(&b));

        JsonHeader {
            parent_hash: data(&self.parent_hash),
            sha3_uncles: data(&self.uncles_hash),
            miner: data(&self.miner),
            state_root: data(&self.state_root),
            transactions_root: data(&self.transactions_root),
            receipts_root: data(&self.receipts_root),
            // `0x` would read back as a zero bloom.
            logs_bloom: match self.logs_bloom.is_empty() {
                true => ScalarValue::Null,
                false => data(&self.logs_bloom),
            },
            difficulty: quantity(u256_to_bytes(self.difficulty)),
            number: quantity(u64_to_bytes(self.number)),
            gas_limit: quantity(u64_to_bytes(self.gas_limit)),
            gas_used: quantity(u64_to_bytes(self.gas_used)),
            timestamp: quantity(u64_to_bytes(self.timestamp)),
            extra_data: data(&self.extra_data),
            mix_hash: data(&self.mix_hash),
            nonce: data(&self.nonce),
            base_fee_per_gas: self.base_fee_per_gas.map(|v| quantity(u256_to_bytes(v))),
            withdrawals_root: self.withdrawals_root.as_deref().map(data),
            blob_gas_used: self.blob_gas_used.map(|v| quantity(u64_to_bytes(v))),
            excess_blob_gas: self.excess_blob_gas.map(|v| quantity(u64_to_bytes(v))),
            parent_beacon_block_root: self.parent_beacon_block_root.as_deref().map(data),
            hash: self.hash.map(|v| data(v.as_bytes())),
        }
    }
}

/// The canonical encoded fields of a header: the 15 required fields, then
/// the optional suffix up to the first absent field.
pub fn build_header_rlp(header: &Header) -> Vec<Bytes> {
    let mut fields = vec![
        header.parent_hash.clone(),
        header.uncles_hash.clone(),
        header.miner.clone(),
        header.state_root.clone(),
        header.transactions_root.clone(),
        header.receipts_root.clone(),
        header.logs_bloom.clone(),
        u256_to_bytes(header.difficulty),
        u64_to_bytes(header.number),
        u64_to_bytes(header.gas_limit),
        u64_to_bytes(header.gas_used),
        u64_to_bytes(header.timestamp),
        header.extra_data.clone(),
        header.mix_hash.clone(),
        header.nonce.clone(),
    ];

    let suffix = [
        header.base_fee_per_gas.map(u256_to_bytes),
        header.withdrawals_root.clone(),
        header.blob_gas_used.map(u64_to_bytes),
        header.excess_blob_gas.map(u64_to_bytes),
        header.parent_beacon_block_root.clone(),
    ];
    fields.extend(suffix.into_iter().map_while(|f| f));

    fields
}

impl TryFrom<&JsonHeader> for Header {
    type Error = HeaderIngestError;

    fn try_from(json: &JsonHeader) -> Result<Self, Self::Error> {
        // Keys are checked for presence, not for value: `"baseFeePerGas": 0`
        // occupies its slot.
        let optional = [
            &json.base_fee_per_gas,
            &json.withdrawals_root,
            &json.blob_gas_used,
            &json.excess_blob_gas,
            &json.parent_beacon_block_root,
        ];
        check_suffix(&optional.map(Option::is_some))?;

        let raw = |f: HeaderField, v: &ScalarValue| encode_scalar_as(v, f.json_name(), f.kind());
        let int = |f: HeaderField, v: &ScalarValue| scalar_to_u64(v, f.json_name());

        Ok(Self {
            parent_hash: raw(HeaderField::ParentHash, &json.parent_hash)?,
            uncles_hash: raw(HeaderField::UnclesHash, &json.sha3_uncles)?,
            miner: raw(HeaderField::Miner, &json.miner)?,
            state_root: raw(HeaderField::StateRoot, &json.state_root)?,
            transactions_root: raw(HeaderField::TransactionsRoot, &json.transactions_root)?,
            receipts_root: raw(HeaderField::ReceiptsRoot, &json.receipts_root)?,
            logs_bloom: raw(HeaderField::LogsBloom, &json.logs_bloom)?,
            difficulty: scalar_to_u256(&json.difficulty, "difficulty")?,
            number: int(HeaderField::Number, &json.number)?,
            gas_limit: int(HeaderField::GasLimit, &json.gas_limit)?,
            gas_used: int(HeaderField::GasUsed, &json.gas_used)?,
            timestamp: int(HeaderField::Timestamp, &json.timestamp)?,
            extra_data: raw(HeaderField::ExtraData, &json.extra_data)?,
            mix_hash: raw(HeaderField::MixHash, &json.mix_hash)?,
            nonce: raw(HeaderField::Nonce, &json.nonce)?,
            base_fee_per_gas: json
                .base_fee_per_gas
                .as_ref()
                .map(|v| scalar_to_u256(v, "baseFeePerGas"))
                .transpose()?,
            withdrawals_root: json
                .withdrawals_root
                .as_ref()
                .map(|v| raw(HeaderField::WithdrawalsRoot, v))
                .transpose()?,
            blob_gas_used: json
                .blob_gas_used
                .as_ref()
                .map(|v| int(HeaderField::BlobGasUsed, v))
                .transpose()?,
            excess_blob_gas: json
                .excess_blob_gas
                .as_ref()
                .map(|v| int(HeaderField::ExcessBlobGas, v))
                .transpose()?,
            parent_beacon_block_root: json
                .parent_beacon_block_root
                .as_ref()
                .map(|v| raw(HeaderField::ParentBeaconBlockRoot, v))
                .transpose()?,
            hash: json
                .hash
                .as_ref()
                .filter(|v| **v != ScalarValue::Null)
                .map(|v| scalar_to_fixed(v, "hash", ScalarKind::Bytes).map(H256))
                .transpose()?,
        })
    }
}

/// An error raised while turning a [`JsonHeader`] into a [`Header`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HeaderIngestError {
    /// A field value could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The optional suffix has a gap.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// An optional header field, tagged with its value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OptionalField {
    BaseFeePerGas(U256),
    WithdrawalsRoot(H256),
    BlobGasUsed(u64),
    ExcessBlobGas(u64),
    ParentBeaconBlockRoot(H256),
}

impl OptionalField {
    pub const fn field(&self) -> HeaderField {
        match self {
            Self::BaseFeePerGas(_) => HeaderField::BaseFeePerGas,
            Self::WithdrawalsRoot(_) => HeaderField::WithdrawalsRoot,
            Self::BlobGasUsed(_) => HeaderField::BlobGasUsed,
            Self::ExcessBlobGas(_) => HeaderField::ExcessBlobGas,
            Self::ParentBeaconBlockRoot(_) => HeaderField::ParentBeaconBlockRoot,
        }
    }
}

/// Builds a header whose optional suffix is filled strictly in fork order.
///
/// ```
/// # use block_rlp::header::{Header, HeaderBuilder, HeaderFork, OptionalField};
/// # use ethereum_types::{H256, U256};
/// let header = HeaderBuilder::new(Header::default())
///     .push(OptionalField::BaseFeePerGas(U256::from(7)))?
///     .push(OptionalField::WithdrawalsRoot(H256::zero()))?
///     .build();
///
/// assert_eq!(header.fork(), HeaderFork::Shanghai);
/// # Ok::<(), block_rlp::header::SchemaError>(())
/// ```
#[derive(Clone, Debug)]
pub struct HeaderBuilder {
    header: Header,
}

impl HeaderBuilder {
    /// Starts from the required fields of `header`. Its optional suffix is
    /// cleared.
    pub fn new(header: Header) -> Self {
        Self {
            header: Header {
                base_fee_per_gas: None,
                withdrawals_root: None,
                blob_gas_used: None,
                excess_blob_gas: None,
                parent_beacon_block_root: None,
                ..header
            },
        }
    }

    /// Fills the next optional slot. Fails if `value` does not belong to it.
    pub fn push(mut self, value: OptionalField) -> Result<Self, SchemaError> {
        let next = self.header.suffix_len();
        let expected = HeaderField::OPTIONAL.get(next).copied();

        if expected != Some(value.field()) {
            return Err(SchemaError::OutOfOrder {
                field: value.field(),
                expected,
            });
        }

        match value {
            OptionalField::BaseFeePerGas(v) => self.header.base_fee_per_gas = Some(v),
            OptionalField::WithdrawalsRoot(v) => {
                self.header.withdrawals_root = Some(Bytes::copy_from_slice(v.as_bytes()))
            }
            OptionalField::BlobGasUsed(v) => self.header.blob_gas_used = Some(v),
            OptionalField::ExcessBlobGas(v) => self.header.excess_blob_gas = Some(v),
            OptionalField::ParentBeaconBlockRoot(v) => {
                self.header.parent_beacon_block_root = Some(Bytes::copy_from_slice(v.as_bytes()))
            }
        }

        Ok(self)
    }

    pub fn build(self) -> Header {
        self.header
    }
}

fn check_suffix(presence: &[bool; 5]) -> Result<(), SchemaError> {
    let Some(missing) = presence.iter().position(|p| !p) else {
        return Ok(());
    };

    match presence[missing..].iter().position(|p| *p) {
        None => Ok(()),
        Some(offset) => Err(SchemaError::Gap {
            missing: HeaderField::OPTIONAL[missing],
            present: HeaderField::OPTIONAL[missing + offset],
        }),
    }
}

fn read_u64(field: HeaderField, bytes: &[u8]) -> DecodingResult<u64> {
    bytes_to_u64(bytes).map_err(|e| DecodingError::invalid_field(field.json_name(), bytes, e))
}

fn read_u256(field: HeaderField, bytes: &[u8]) -> DecodingResult<U256> {
    bytes_to_u256(bytes).map_err(|e| DecodingError::invalid_field(field.json_name(), bytes, e))
}
