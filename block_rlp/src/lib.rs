//! Canonical RLP encoding and decoding of Ethereum-compatible blocks.
//!
//! The crate is layered bottom-up:
//! - [`scalar`] turns loosely typed JSON scalars into canonical big-endian
//!   byte strings.
//! - [`item`] is the generic RLP codec over [`RlpItem`][item::RlpItem] trees,
//!   including resumable decoding of flat item streams.
//! - [`header`], [`transaction`] and [`block`] define the positional block
//!   schema, including the fork-dependent optional header suffix.
//! - [`hasher`] derives block hashes, and [`chain`] relinks whole chains of
//!   blocks on top of a new genesis hash.
//! - [`convert`] maps between blocks and flat block streams, the on-disk
//!   format produced and consumed by the `blocks_to_rlp` tool.
//!
//! JSON input is first parsed into the loosely typed records of [`json`], then
//! validated once into strongly typed [`Block`][block::Block]s before any
//! encoding happens.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod block;
pub mod chain;
pub mod convert;
pub mod hasher;
pub mod header;
pub mod item;
pub mod json;
pub mod scalar;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing_utils;
