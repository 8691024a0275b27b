//! Reading and writing monsters.json.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::types::MonsterRecord;
use crate::utils::write_atomic;

/// Renders records as a 2-space indented JSON array. Non-ASCII text is
/// kept as-is.
pub fn to_json(monsters: &[MonsterRecord]) -> Result<String> {
    serde_json::to_string_pretty(monsters).context("Failed to serialize monsters")
}

/// Replaces `path` with the full monster list.
pub fn write_monsters(path: &Path, monsters: &[MonsterRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = to_json(monsters)?;
    write_atomic(path, json.as_bytes())
}

pub fn read_monsters(path: &Path) -> Result<Vec<MonsterRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read monsters file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse monsters file: {}", path.display()))
}
