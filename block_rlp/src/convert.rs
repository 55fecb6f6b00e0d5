//! Conversion between blocks and flat RLP block streams.
//!
//! A block stream is the concatenation of independently encoded
//! `[header, transactions, uncles]` items, with no outer list or framing.
//! Block boundaries are only recoverable by decoding one item at a time.

use bytes::{Bytes, BytesMut};
use log::{debug, warn};

use crate::{
    block::{build_block_rlp, Block, BlockError},
    item::{consume_item, rlp_encode, DecodingResult, RlpItem},
    json::JsonBlock,
};

/// Encodes `blocks` into a block stream, in order.
pub fn blocks_to_rlp_stream<'a, I>(blocks: I) -> Bytes
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut out = BytesMut::new();
    for block in blocks {
        out.extend_from_slice(&rlp_encode(&build_block_rlp(block)));
    }

    out.freeze()
}

/// Ingests and encodes JSON blocks. Fails on the first invalid block.
pub fn json_blocks_to_rlp_stream(blocks: &[JsonBlock]) -> Result<Bytes, BlockError> {
    let blocks = blocks
        .iter()
        .map(Block::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(blocks_to_rlp_stream(&blocks))
}

/// Splits a block stream into its top-level items.
///
/// Decoding stops at the first malformed item: everything decoded up to that
/// point is returned and the rest of the buffer is dropped with a warning.
pub fn rlp_stream_to_blocks(buf: &[u8]) -> Vec<RlpItem> {
    let mut items = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        match consume_item(buf, offset) {
            Ok((item, consumed)) => {
                items.push(item);
                offset += consumed;
            }
            Err(err) => {
                warn!(
                    "Stopped decoding block stream at offset {} after {} items, dropping {} bytes: {}",
                    offset,
                    items.len(),
                    buf.len() - offset,
                    err
                );
                break;
            }
        }
    }

    debug!("Decoded {} items from a {} byte stream", items.len(), buf.len());
    items
}

/// Maps a decoded block item back to its JSON shape.
///
/// Optional header fields appear only if the encoded header was long enough
/// to hold them.
pub fn block_item_to_json(item: &RlpItem) -> DecodingResult<JsonBlock> {
    Block::from_rlp_item(item).map(|block| block.to_json())
}
