//! Settings file
//!
//! `config.toml` in the pkgq home holds the declared catalogs, the
//! preference profile, and the resolver's own knobs:
//!
//! ```toml
//! [resolver]
//! platforms = ["x86_64-linux", "aarch64-linux"]
//! merge_platforms = true
//!
//! [[catalogs]]
//! id = "nixpkgs"
//! reference = "/srv/catalogs/nixpkgs.json"
//!
//! [preferences.allow]
//! unfree = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use pkgq_schema::Platform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::{CatalogRef, EvalOptions};
use crate::paths;
use crate::preferences::Preferences;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Knobs for one [`Resolver`](crate::resolver::Resolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Root directory of the per-fingerprint crawl caches.
    pub cache_dir: PathBuf,
    /// Platforms searched, in priority order.
    pub platforms: Vec<Platform>,
    /// Fold per-platform matches of the same path into one result.
    pub merge_platforms: bool,
    /// Ignore stored crawl progress and evaluate every prefix again.
    pub force_recrawl: bool,
    /// Options passed to every evaluation.
    pub eval: EvalOptions,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_dir: paths::cache_dir(),
            platforms: vec![Platform::current()],
            merge_platforms: true,
            force_recrawl: false,
            eval: EvalOptions::default(),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resolver knobs.
    pub resolver: ResolverSettings,
    /// Declared catalogs.
    pub catalogs: Vec<CatalogRef>,
    /// Preference profile.
    pub preferences: Preferences,
}

impl Settings {
    /// Load settings from path
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load settings from path, falling back to defaults if the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = toml::from_str(content)?;
        if settings.resolver.platforms.is_empty() {
            settings.resolver.platforms.push(Platform::current());
        }
        Ok(settings)
    }

    /// Save settings to path
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Find a declared catalog by id
    pub fn catalog(&self, id: &str) -> Option<&CatalogRef> {
        self.catalogs.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgq_schema::Subtree;
    use tempfile::tempdir;

    #[test]
    fn parse_full_file() {
        let settings = Settings::parse(
            r#"
            [resolver]
            cache_dir = "/var/cache/pkgq"
            platforms = ["x86_64-linux", "aarch64-darwin"]
            merge_platforms = false
            force_recrawl = true

            [resolver.eval]
            pure = false
            quiet = true

            [[catalogs]]
            id = "nixpkgs"
            reference = "/srv/nixpkgs.json"

            [preferences]
            catalogs = ["nixpkgs"]

            [preferences.subtrees]
            nixpkgs = ["legacyPackages"]

            [preferences.allow]
            unfree = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.resolver.cache_dir, PathBuf::from("/var/cache/pkgq"));
        assert_eq!(settings.resolver.platforms.len(), 2);
        assert!(!settings.resolver.merge_platforms);
        assert!(settings.resolver.force_recrawl);
        assert!(!settings.resolver.eval.pure);
        assert_eq!(settings.catalog("nixpkgs").unwrap().reference, "/srv/nixpkgs.json");
        assert!(settings.catalog("other").is_none());
        assert_eq!(
            settings.preferences.subtree_order("nixpkgs"),
            vec![Subtree::Legacy]
        );
        assert!(!settings.preferences.allow.unfree);
        assert!(!settings.preferences.allow.broken);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.resolver.platforms, vec![Platform::current()]);
        assert!(settings.resolver.merge_platforms);
        assert!(settings.catalogs.is_empty());

        let settings = Settings::parse("[resolver]\nplatforms = []\n").unwrap();
        assert_eq!(settings.resolver.platforms, vec![Platform::current()]);
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Settings::load_or_default(&path).unwrap().catalogs.is_empty());
        assert!(matches!(Settings::load(&path), Err(SettingsError::Io(_))));
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.resolver.cache_dir = dir.path().join("cache");
        settings.catalogs.push(CatalogRef::new("local", "/tmp/local.json"));
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        assert!(matches!(
            Settings::parse("[resolver\nplatforms = 3"),
            Err(SettingsError::Parse(_))
        ));
    }
}
