use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temporary file in the same directory, then rename it into
/// place. Parent directories are created as needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("[io::write] Failed to create directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("[io::write] Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("[io::write] Failed to write {}", path.display()))?;
    tmp.as_file().sync_all().ok();

    tmp.persist(path)
        .with_context(|| format!("[io::write] Failed to rename temp file to {}", path.display()))?;
    Ok(())
}
