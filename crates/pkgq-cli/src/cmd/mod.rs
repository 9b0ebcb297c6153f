//! Subcommands

pub mod catalog;
pub mod clean;
pub mod progress;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use pkgq_core::tree::TreeCatalog;
use pkgq_core::{CatalogRef, Settings};

/// The settings file in use: `--config`, else the one in the pkgq home.
pub fn settings_path(config: Option<&Path>) -> PathBuf {
    config.map_or_else(crate::config_path, Path::to_path_buf)
}

/// Load the settings file, or defaults when it does not exist.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => {
            let path = crate::config_path();
            Settings::load_or_default(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))
        }
    }
}

/// Parse an `id=path` catalog argument.
pub fn parse_catalog_arg(arg: &str) -> Result<CatalogRef> {
    match arg.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok(CatalogRef::new(id, path)),
        _ => bail!("Invalid catalog '{arg}', expected ID=PATH"),
    }
}

/// Declared plus command-line catalogs; command-line ids replace declared ones.
pub fn collect_catalogs(settings: &Settings, extra: &[String]) -> Result<Vec<CatalogRef>> {
    let mut catalogs = settings.catalogs.clone();
    for arg in extra {
        let catalog = parse_catalog_arg(arg)?;
        catalogs.retain(|c| c.id != catalog.id);
        catalogs.push(catalog);
    }
    Ok(catalogs)
}

/// Load every catalog document. Unreadable documents are reported and
/// skipped; the resolver then treats them as unlockable.
pub fn load_catalogs(catalogs: &[CatalogRef]) -> TreeCatalog {
    let mut evaluator = TreeCatalog::new();
    for catalog in catalogs {
        if let Err(e) = evaluator.load_file(Path::new(&catalog.reference)) {
            tracing::warn!("Catalog {}: {e:#}", catalog.id);
        }
    }
    evaluator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_args() {
        let c = parse_catalog_arg("nixpkgs=/srv/nixpkgs.json").unwrap();
        assert_eq!(c.id, "nixpkgs");
        assert_eq!(c.reference, "/srv/nixpkgs.json");
        assert!(parse_catalog_arg("nixpkgs").is_err());
        assert!(parse_catalog_arg("=x").is_err());
        assert!(parse_catalog_arg("x=").is_err());
    }

    #[test]
    fn command_line_catalogs_replace_declared() {
        let mut settings = Settings::default();
        settings.catalogs.push(CatalogRef::new("a", "/declared/a.json"));
        settings.catalogs.push(CatalogRef::new("b", "/declared/b.json"));
        let catalogs =
            collect_catalogs(&settings, &["a=/cli/a.json".to_string()]).unwrap();
        let refs: Vec<&str> = catalogs.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["/declared/b.json", "/cli/a.json"]);
    }
}
