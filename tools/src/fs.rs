use std::{
    fs::{self, File},
    io::BufReader,
    path::Path,
};

use anyhow::Context as _;
use block_rlp::json::JsonBlock;
use serde::Serialize;

/// Reads a JSON array of blocks.
///
/// Parse errors report the path of the offending value, e.g.
/// `[2].transactions[0].gasPrice`.
pub fn read_json_blocks(path: &Path) -> anyhow::Result<Vec<JsonBlock>> {
    let file = File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let des = &mut serde_json::Deserializer::from_reader(reader);

    serde_path_to_error::deserialize(des)
        .with_context(|| format!("Failed to deserialize json file {}", path.display()))
}

pub fn read_rlp_stream(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Unable to read RLP file {}", path.display()))
}

/// Writes `bytes` to `path`, creating parent directories as needed.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote {} bytes to {}", bytes.len(), path.display());

    Ok(())
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let serialized = serde_json::to_vec_pretty(value)?;
    write_bytes(path, &serialized)
}
