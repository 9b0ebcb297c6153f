//! Progress command

use std::path::Path;

use anyhow::Result;
use pkgq_core::cache::CrawlCache;
use pkgq_core::{Evaluator, cache_file};

use crate::ui;

/// Show stored crawl progress for each catalog
pub fn progress(config: Option<&Path>, id: Option<&str>, extra: &[String]) -> Result<()> {
    let settings = super::load_settings(config)?;
    let mut catalogs = super::collect_catalogs(&settings, extra)?;
    if let Some(id) = id {
        catalogs.retain(|c| c.id == id);
    }
    if catalogs.is_empty() {
        println!();
        println!("  No catalogs configured.");
        return Ok(());
    }

    let evaluator = super::load_catalogs(&catalogs);
    for catalog in &catalogs {
        let locked = match evaluator.lock(catalog) {
            Ok(locked) => locked,
            Err(e) => {
                println!("{} ({e})", catalog.id);
                continue;
            }
        };

        // Do not create a database just to report that there is none
        let path = cache_file(&settings.resolver.cache_dir, &locked.fingerprint);
        let rows = if path.exists() {
            CrawlCache::open_at(&path).progress_all()
        } else {
            Vec::new()
        };
        ui::print_progress(&locked.id, &locked.locked_ref, &rows);
    }
    Ok(())
}
