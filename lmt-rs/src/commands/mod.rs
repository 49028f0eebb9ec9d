//! Command implementations

pub mod json;
pub mod lmt;

use anyhow::{Context, Result};
use mhw_lmt::{AnimationBlock, LayoutPolicy, LmtFile, RecordFormat};
use std::fs;
use std::path::Path;

pub(crate) fn open_container(path: &Path) -> Result<LmtFile> {
    LmtFile::open(path).with_context(|| format!("Failed to open LMT file: {}", path.display()))
}

pub(crate) fn load_block(
    lmt: &LmtFile,
    path: &Path,
    id: usize,
    records: RecordFormat,
) -> Result<AnimationBlock> {
    lmt.get_with_format(id, records)
        .with_context(|| format!("Failed to decode animation {id} in {}", path.display()))?
        .with_context(|| format!("Animation slot {id} in {} is empty", path.display()))
}

pub(crate) fn read_lmta(path: &Path, records: RecordFormat) -> Result<AnimationBlock> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read block file: {}", path.display()))?;
    AnimationBlock::from_lmta_bytes(&data, records)
        .with_context(|| format!("Failed to parse block file: {}", path.display()))
}

pub(crate) fn write_lmta(block: &AnimationBlock, path: &Path, policy: LayoutPolicy) -> Result<()> {
    let data = block
        .to_lmta_bytes(policy)
        .context("Failed to serialize animation block")?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write block file: {}", path.display()))?;
    log::info!("Wrote {} ({policy})", path.display());
    Ok(())
}
