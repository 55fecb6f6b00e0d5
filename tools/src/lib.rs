//! Support code for the `blocks_to_rlp` binary: environment and logging
//! setup, block file IO and fetching blocks from a JSON-RPC node.

pub mod fs;
pub mod init;
pub mod rpc;
