use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context as _, Result};
use block_rlp::{
    block::Block,
    chain::{rehash_json_chain, verify_linkage},
    convert::{block_item_to_json, blocks_to_rlp_stream, rlp_stream_to_blocks},
    hasher::to_hex_hash,
    json::JsonBlock,
};
use clap::{Parser, Subcommand, ValueHint};
use ethereum_types::H256;
use rlp_tools::{
    fs::{read_json_blocks, read_rlp_stream, write_bytes, write_json},
    rpc::{fetch_blocks, retry::build_http_retry_provider},
};
use tracing::{info, warn};
use url::Url;

/// Converts Ethereum blocks between JSON and flat RLP block streams.
#[derive(Parser)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encodes a JSON array of blocks into an RLP block stream.
    Encode {
        /// The JSON blocks file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// The RLP output file.
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Relink the blocks on top of this hash before encoding.
        #[arg(short = 'g', long, env = "BLOCK_RLP_GENESIS_HASH", value_parser = parse_hash)]
        genesis_hash: Option<H256>,
    },
    /// Decodes an RLP block stream and prints its structure.
    Decode {
        /// The RLP input file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Also write the decoded blocks as JSON.
        #[arg(value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Lists nested deeper than this are collapsed in the printout.
        #[arg(short = 'd', long, env = "BLOCK_RLP_MAX_DEPTH", default_value_t = 3)]
        max_depth: usize,
    },
    /// Relinks a JSON array of blocks on top of a new genesis hash.
    Rehash {
        /// The JSON blocks file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// The relinked JSON blocks file.
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Parent hash of the first block.
        #[arg(short = 'g', long, env = "BLOCK_RLP_GENESIS_HASH", value_parser = parse_hash)]
        genesis_hash: H256,
    },
    /// Fetches a block range from a node and encodes it into an RLP block
    /// stream.
    Fetch {
        /// The node RPC URL.
        #[arg(short = 'u', long, env = "BLOCK_RLP_RPC_URL", value_hint = ValueHint::Url)]
        rpc_url: Url,
        /// The first block to fetch.
        #[arg(short = 's', long, env = "BLOCK_RLP_START_BLOCK")]
        start_block: u64,
        /// The last block to fetch (inclusive).
        #[arg(short = 'e', long, env = "BLOCK_RLP_END_BLOCK")]
        end_block: u64,
        /// The RLP output file.
        #[arg(short = 'o', long, env = "BLOCK_RLP_OUTPUT", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Also write the fetched blocks as JSON.
        #[arg(long, env = "BLOCK_RLP_JSON_OUTPUT", value_hint = ValueHint::FilePath)]
        json_output: Option<PathBuf>,
        /// Relink the blocks on top of this hash before encoding.
        #[arg(short = 'g', long, env = "BLOCK_RLP_GENESIS_HASH", value_parser = parse_hash)]
        genesis_hash: Option<H256>,
        /// Backoff in milliseconds between retries of a failed request.
        #[arg(long, env = "BLOCK_RLP_BACKOFF", default_value_t = 0)]
        backoff: u64,
        /// Maximum number of retries of a failed request.
        #[arg(long, env = "BLOCK_RLP_MAX_RETRIES", default_value_t = 0)]
        max_retries: u32,
    },
}

fn parse_hash(s: &str) -> Result<H256> {
    let payload = s.strip_prefix("0x").unwrap_or(s);
    let mut bytes = [0; 32];
    hex::decode_to_slice(payload, &mut bytes)
        .map_err(|e| anyhow!("Invalid 32 byte hash `{}`: {}", s, e))?;

    Ok(H256(bytes))
}

/// Ingests the blocks, relinking them on top of `genesis_hash` when given.
fn prepare_blocks(json: &[JsonBlock], genesis_hash: Option<H256>) -> Result<Vec<Block>> {
    let blocks = match genesis_hash {
        Some(genesis_hash) => rehash_json_chain(json, genesis_hash)?,
        None => json
            .iter()
            .enumerate()
            .map(|(i, b)| Block::try_from(b).with_context(|| format!("Block {} is invalid", i)))
            .collect::<Result<Vec<_>>>()?,
    };

    if let Some(head) = blocks.last() {
        info!(
            "Prepared {} blocks, head {}",
            blocks.len(),
            to_hex_hash(&head.compute_hash())
        );
    }

    Ok(blocks)
}

fn encode(json: &[JsonBlock], genesis_hash: Option<H256>, output: &Path) -> Result<()> {
    let blocks = prepare_blocks(json, genesis_hash)?;
    let stream = blocks_to_rlp_stream(&blocks);
    write_bytes(output, &stream)?;

    println!("RLP encoded blocks have been saved to {}", output.display());
    Ok(())
}

fn decode(input: &Path, output: Option<PathBuf>, max_depth: usize) -> Result<()> {
    let stream = read_rlp_stream(input)?;
    println!("File size: {} bytes", stream.len());

    let items = rlp_stream_to_blocks(&stream);
    println!("Decoded {} blocks", items.len());
    for item in &items {
        print!("{}", item.display_tree(max_depth));
    }

    if let Some(output) = output {
        let blocks = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                block_item_to_json(item).with_context(|| format!("Item {} is not a block", i))
            })
            .collect::<Result<Vec<_>>>()?;

        let decoded: Vec<_> = blocks
            .iter()
            .map(Block::try_from)
            .collect::<Result<_, _>>()?;
        let first_parent = decoded
            .first()
            .and_then(|b| b.header.parent())
            .unwrap_or_default();
        if let Err(e) = verify_linkage(&decoded, first_parent) {
            warn!("Decoded blocks are not a linked chain: {}", e);
        }

        write_json(&output, &blocks)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    rlp_tools::init::init();

    let args = Cli::parse();

    match args.command {
        Command::Encode {
            input,
            output,
            genesis_hash,
        } => {
            let json = read_json_blocks(&input)?;
            encode(&json, genesis_hash, &output)?;
        }
        Command::Decode {
            input,
            output,
            max_depth,
        } => decode(&input, output, max_depth)?,
        Command::Rehash {
            input,
            output,
            genesis_hash,
        } => {
            let json = read_json_blocks(&input)?;
            let blocks = rehash_json_chain(&json, genesis_hash)?;
            let relinked: Vec<_> = blocks.iter().map(Block::to_json).collect();
            write_json(&output, &relinked)?;
        }
        Command::Fetch {
            rpc_url,
            start_block,
            end_block,
            output,
            json_output,
            genesis_hash,
            backoff,
            max_retries,
        } => {
            if start_block > end_block {
                return Err(anyhow!(
                    "Start block {} is after end block {}",
                    start_block,
                    end_block
                ));
            }

            let provider =
                build_http_retry_provider(rpc_url, Duration::from_millis(backoff), max_retries);
            let json = fetch_blocks(&provider, start_block..=end_block).await?;

            if let Some(json_output) = json_output {
                write_json(&json_output, &json)?;
            }
            encode(&json, genesis_hash, &output)?;
        }
    }

    Ok(())
}
