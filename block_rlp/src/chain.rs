//! Rebuilding and checking the parent linkage of a chain of blocks.
//!
//! Each block's parent hash depends on the freshly computed hash of the block
//! before it, so blocks are always processed strictly in order.

use bytes::Bytes;
use ethereum_types::H256;
use log::{debug, info};
use thiserror::Error;

use crate::{
    block::{Block, BlockError},
    json::JsonBlock,
};

/// An error raised by chain level operations.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ChainError {
    /// A block could not be ingested. Nothing is produced for any block.
    #[error("Block {index} is invalid: {source}")]
    InvalidBlock {
        /// Position of the block in the input.
        index: usize,
        source: BlockError,
    },

    /// A block does not point at the block before it.
    #[error("Block {index} has parent hash {found:x}, expected {expected:x}")]
    BrokenLink {
        /// Position of the block in the chain.
        index: usize,
        expected: H256,
        /// Not necessarily 32 bytes wide.
        found: Bytes,
    },

    /// A block's stored hash is not the hash of its header.
    #[error("Block {index} records hash {recorded:x}, but its header hashes to {computed:x}")]
    StaleHash {
        /// Position of the block in the chain.
        index: usize,
        recorded: H256,
        computed: H256,
    },
}

/// Relinks `blocks` on top of `genesis_hash`.
///
/// Every block gets its parent hash overwritten with the hash of the block
/// before it (`genesis_hash` for the first one), and its own hash recomputed
/// and recorded in both `block.hash` and `block.header.hash`.
pub fn rehash_chain<I>(blocks: I, genesis_hash: H256) -> Vec<Block>
where
    I: IntoIterator<Item = Block>,
{
    let mut parent_hash = genesis_hash;

    let chain: Vec<_> = blocks
        .into_iter()
        .map(|mut block| {
            block.header.set_parent(parent_hash);
            let hash = block.compute_hash();
            block.set_hash(hash);

            debug!("Rehashed block {} to {:x}", block.header.number, hash);
            parent_hash = hash;

            block
        })
        .collect();

    info!(
        "Rehashed {} blocks on top of {:x}, new head is {:x}",
        chain.len(),
        genesis_hash,
        parent_hash
    );

    chain
}

/// Ingests every block, then relinks them with [`rehash_chain`].
///
/// Fails without producing anything if any single block is invalid.
pub fn rehash_json_chain(blocks: &[JsonBlock], genesis_hash: H256) -> Result<Vec<Block>, ChainError> {
    let blocks = blocks
        .iter()
        .enumerate()
        .map(|(index, json)| {
            Block::try_from(json).map_err(|source| ChainError::InvalidBlock { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rehash_chain(blocks, genesis_hash))
}

/// Checks that each block points at the one before it, starting from
/// `genesis_hash`, and that recorded hashes match the headers.
///
/// Reports the first violation found.
pub fn verify_linkage(blocks: &[Block], genesis_hash: H256) -> Result<(), ChainError> {
    let mut expected = genesis_hash;

    for (index, block) in blocks.iter().enumerate() {
        if block.header.parent() != Some(expected) {
            return Err(ChainError::BrokenLink {
                index,
                expected,
                found: block.header.parent_hash.clone(),
            });
        }

        let computed = block.compute_hash();
        if let Some(recorded) = block.hash.or(block.header.hash) {
            if recorded != computed {
                return Err(ChainError::StaleHash {
                    index,
                    recorded,
                    computed,
                });
            }
        }

        expected = computed;
    }

    Ok(())
}
