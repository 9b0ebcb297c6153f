//! Catalog command

use std::path::Path;

use anyhow::{Context, Result, bail};
use pkgq_core::Settings;

/// Declare a catalog in the settings file
pub fn add(config: Option<&Path>, arg: &str) -> Result<()> {
    let catalog = super::parse_catalog_arg(arg)?;
    let path = super::settings_path(config);
    let mut settings = Settings::load_or_default(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    let replaced = settings.catalogs.iter().any(|c| c.id == catalog.id);
    settings.catalogs.retain(|c| c.id != catalog.id);
    let id = catalog.id.clone();
    settings.catalogs.push(catalog);
    settings
        .save(&path)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    if replaced {
        println!("Updated catalog {id}");
    } else {
        println!("Added catalog {id}");
    }
    Ok(())
}

/// Remove a declared catalog from the settings file
pub fn remove(config: Option<&Path>, id: &str) -> Result<()> {
    let path = super::settings_path(config);
    let mut settings = Settings::load_or_default(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    let before = settings.catalogs.len();
    settings.catalogs.retain(|c| c.id != id);
    if settings.catalogs.len() == before {
        bail!("No catalog '{id}' in {}", path.display());
    }
    settings
        .save(&path)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    println!("Removed catalog {id}");
    Ok(())
}
