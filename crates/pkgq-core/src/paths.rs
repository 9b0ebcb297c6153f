use dirs::home_dir;
use pkgq_schema::Fingerprint;
use std::path::{Path, PathBuf};

/// Returns the pkgq home directory, or None if the user's home cannot be resolved.
pub fn try_pkgq_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("PKGQ_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".pkgq"))
}

/// Returns the pkgq home directory (`~/.pkgq`).
///
/// Falls back to `./.pkgq` when neither `PKGQ_HOME` is set nor the user's
/// home directory can be resolved.
pub fn pkgq_home() -> PathBuf {
    try_pkgq_home().unwrap_or_else(|| PathBuf::from(".pkgq"))
}

/// Settings file: ~/.pkgq/config.toml
pub fn config_path() -> PathBuf {
    pkgq_home().join("config.toml")
}

/// Crawl cache root: ~/.pkgq/cache, or `PKGQ_CACHE_DIR`
pub fn cache_dir() -> PathBuf {
    if let Ok(val) = std::env::var("PKGQ_CACHE_DIR") {
        return PathBuf::from(val);
    }
    pkgq_home().join("cache")
}

/// Cache database for one catalog snapshot: `<root>/<fingerprint>.db`
pub fn cache_file(root: &Path, fingerprint: &Fingerprint) -> PathBuf {
    root.join(format!("{}.db", fingerprint.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_is_named_by_fingerprint() {
        let fp = Fingerprint::compute(b"catalog");
        let path = cache_file(Path::new("/tmp/pkgq"), &fp);
        assert_eq!(path.parent(), Some(Path::new("/tmp/pkgq")));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(format!("{}.db", fp.as_str()).as_str())
        );
    }
}
