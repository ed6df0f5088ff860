use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sentinel_core::Watch;

/// Loads the watch-list snapshot. A missing file is an empty watch list, not
/// an error.
pub fn load_watches(path: &Path) -> Result<Vec<Watch>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read watch list {}", path.display()))?;
    let watches = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse watch list {}", path.display()))?;
    Ok(watches)
}

/// Writes the watch-list snapshot, creating parent directories as needed.
pub fn save_watches(path: &Path, watches: &[Watch]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let data = serde_json::to_string_pretty(watches).context("failed to serialize watch list")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write watch list {}", path.display()))?;
    Ok(())
}
