//! Full blocks: a header, its legacy transactions and its uncles.

use ethereum_types::H256;
use log::debug;
use thiserror::Error;

use crate::{
    hasher::hash_header,
    header::{Header, HeaderIngestError, SchemaError},
    item::{DecodingError, DecodingResult, RlpItem},
    json::{JsonBlock, JsonUncle},
    scalar::{scalar_to_fixed, to_hex_data, EncodingError, ScalarKind, ScalarValue},
    transaction::Transaction,
};

/// An error raised while turning a [`JsonBlock`] into a [`Block`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BlockError {
    /// A field value could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A header's optional suffix has a gap.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The error is located in a specific transaction or uncle.
    #[error("{location}: {source}")]
    Nested {
        /// E.g. `transactions[3]`.
        location: String,
        source: Box<BlockError>,
    },
}

impl BlockError {
    fn at(self, location: String) -> Self {
        Self::Nested {
            location,
            source: Box::new(self),
        }
    }
}

impl From<HeaderIngestError> for BlockError {
    fn from(err: HeaderIngestError) -> Self {
        match err {
            HeaderIngestError::Encoding(e) => Self::Encoding(e),
            HeaderIngestError::Schema(e) => Self::Schema(e),
        }
    }
}

/// An uncle of a block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Uncle {
    /// A full uncle header.
    Header(Box<Header>),

    /// An uncle whose header is unknown, such as the bare hashes returned by
    /// `eth_getBlockByNumber`. Encoded as an empty list.
    Placeholder,
}

impl Uncle {
    pub fn to_rlp_item(&self) -> RlpItem {
        match self {
            Uncle::Header(header) => header.to_rlp_item(),
            Uncle::Placeholder => RlpItem::List(Vec::new()),
        }
    }

    /// An empty list decodes to a placeholder, anything else to a header.
    pub fn from_rlp_item(item: &RlpItem) -> DecodingResult<Self> {
        match item.expect_list("uncle")? {
            [] => Ok(Uncle::Placeholder),
            _ => Header::from_rlp_item(item).map(|h| Uncle::Header(Box::new(h))),
        }
    }
}

/// A block.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<Uncle>,
    /// Mirrors `header.hash`, as in JSON-RPC responses.
    pub hash: Option<H256>,
}

impl Block {
    /// Hashes the header. Does not update the stored hashes.
    pub fn compute_hash(&self) -> H256 {
        hash_header(&self.header)
    }

    /// Stores `hash` in both the block and its header.
    pub fn set_hash(&mut self, hash: H256) {
        self.header.hash = Some(hash);
        self.hash = Some(hash);
    }

    /// Decodes a block from its `[header, transactions, uncles]` list.
    pub fn from_rlp_item(item: &RlpItem) -> DecodingResult<Self> {
        let [header, transactions, uncles] = item.expect_list("block")? else {
            return Err(DecodingError::ItemCount {
                what: "block",
                expected: "3",
                found: item.expect_list("block")?.len(),
            });
        };

        let header = Header::from_rlp_item(header)?;
        let transactions = transactions
            .expect_list("transaction list")?
            .iter()
            .map(Transaction::from_rlp_item)
            .collect::<DecodingResult<Vec<_>>>()?;
        let uncles = uncles
            .expect_list("uncle list")?
            .iter()
            .map(Uncle::from_rlp_item)
            .collect::<DecodingResult<Vec<_>>>()?;

        debug!(
            "Decoded block {} with {} transactions and {} uncles",
            header.number,
            transactions.len(),
            uncles.len()
        );

        Ok(Self {
            header,
            transactions,
            uncles,
            hash: None,
        })
    }

    /// The block in its JSON shape, with the header nested under `header`.
    pub fn to_json(&self) -> JsonBlock {
        JsonBlock {
            header: self.header.to_json(),
            transactions: self.transactions.iter().map(Transaction::to_json).collect(),
            uncles: self
                .uncles
                .iter()
                .map(|uncle| match uncle {
                    Uncle::Header(h) => JsonUncle::Header(Box::new(h.to_json())),
                    Uncle::Placeholder => JsonUncle::Placeholder,
                })
                .collect(),
            hash: self
                .hash
                .map(|h| ScalarValue::from(to_hex_data(h.as_bytes()))),
        }
    }
}

/// The block as `[header_fields, transactions, uncles]`. Each transaction is
/// a byte string holding its own RLP.
pub fn build_block_rlp(block: &Block) -> RlpItem {
    RlpItem::List(vec![
        block.header.to_rlp_item(),
        RlpItem::List(block.transactions.iter().map(Transaction::to_body_item).collect()),
        RlpItem::List(block.uncles.iter().map(Uncle::to_rlp_item).collect()),
    ])
}

impl TryFrom<&JsonBlock> for Block {
    type Error = BlockError;

    fn try_from(json: &JsonBlock) -> Result<Self, Self::Error> {
        let header = Header::try_from(&json.header)?;

        let transactions = json
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                Transaction::try_from(tx)
                    .map_err(|e| BlockError::from(e).at(format!("transactions[{}]", i)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uncles = json
            .uncles
            .iter()
            .enumerate()
            .map(|(i, uncle)| match uncle {
                JsonUncle::Hash(_) | JsonUncle::Placeholder => Ok(Uncle::Placeholder),
                JsonUncle::Header(h) => Header::try_from(h.as_ref())
                    .map(|h| Uncle::Header(Box::new(h)))
                    .map_err(|e| BlockError::from(e).at(format!("uncles[{}]", i))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let hash = match &json.hash {
            Some(v) if *v != ScalarValue::Null => {
                Some(scalar_to_fixed(v, "hash", ScalarKind::Bytes).map(H256)?)
            }
            _ => header.hash,
        };

        Ok(Self {
            header,
            transactions,
            uncles,
            hash,
        })
    }
}
