//! Clean command

use std::path::Path;

use anyhow::{Context, Result};

/// Remove every crawl cache database, with its WAL and shared-memory files
pub fn clean(config: Option<&Path>, dry_run: bool) -> Result<()> {
    let settings = super::load_settings(config)?;
    let dir = &settings.resolver.cache_dir;

    if !dir.exists() {
        println!("Nothing to clean.");
        return Ok(());
    }

    let mut removed = 0usize;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read cache directory {}", dir.display()))?
    {
        let path = entry?.path();
        let is_cache = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".db") || n.ends_with(".db-wal") || n.ends_with(".db-shm"));
        if !is_cache {
            continue;
        }
        if dry_run {
            println!("Would remove {}", path.display());
        } else {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            tracing::debug!("Removed {}", path.display());
        }
        removed += 1;
    }

    if dry_run {
        println!("{removed} files would be removed.");
    } else {
        println!("Removed {removed} files.");
    }
    Ok(())
}
