use serde::{Deserialize, Serialize};

use crate::glob::{AttrPart, GlobPath, InvalidPathError};
use crate::platform::Platform;

/// Top-level partition of a catalog.
///
/// Each subtree has a canonical segment name used as segment 0 of every
/// absolute path (`packages`, `legacyPackages`, `catalog`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subtree {
    /// Flat package set: every child of `packages.<platform>` is a package.
    #[serde(rename = "packages", alias = "direct")]
    Direct,
    /// Nested package set whose sub-sets opt in to crawling.
    #[serde(rename = "legacyPackages", alias = "legacy")]
    Legacy,
    /// Curated package set split into stability tiers.
    #[serde(rename = "catalog", alias = "stabilized")]
    Stabilized,
}

impl Subtree {
    /// All subtrees in their default priority order.
    pub const DEFAULT_ORDER: [Subtree; 3] = [Self::Stabilized, Self::Direct, Self::Legacy];

    /// Canonical path segment for this subtree.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "packages",
            Self::Legacy => "legacyPackages",
            Self::Stabilized => "catalog",
        }
    }

    /// Whether prefixes under this subtree carry a stability tier.
    pub fn is_stabilized(&self) -> bool {
        matches!(self, Self::Stabilized)
    }
}

impl std::fmt::Display for Subtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Subtree {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packages" | "direct" => Ok(Self::Direct),
            "legacyPackages" | "legacy" => Ok(Self::Legacy),
            "catalog" | "stabilized" => Ok(Self::Stabilized),
            _ => Err(InvalidPathError::UnknownSubtree(s.to_string())),
        }
    }
}

/// A stability tier inside the `catalog` subtree (e.g. `stable`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stability(String);

impl Stability {
    /// Create a stability tier from its name.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Default tier order when a catalog declares none: `stable, staging, unstable`.
    pub fn default_order() -> Vec<Stability> {
        ["stable", "staging", "unstable"]
            .into_iter()
            .map(Self::new)
            .collect()
    }

    /// Return the tier name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Stability {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The axis part of a location: `(subtree, platform, stability?)`.
///
/// A stability is present exactly when the subtree is [`Subtree::Stabilized`];
/// the constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPrefix", into = "RawPrefix")]
pub struct Prefix {
    subtree: Subtree,
    platform: Platform,
    stability: Option<Stability>,
}

#[derive(Serialize, Deserialize)]
struct RawPrefix {
    subtree: Subtree,
    platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stability: Option<Stability>,
}

impl TryFrom<RawPrefix> for Prefix {
    type Error = InvalidPathError;

    fn try_from(raw: RawPrefix) -> Result<Self, Self::Error> {
        Self::new(raw.subtree, raw.platform, raw.stability)
    }
}

impl From<Prefix> for RawPrefix {
    fn from(p: Prefix) -> Self {
        Self {
            subtree: p.subtree,
            platform: p.platform,
            stability: p.stability,
        }
    }
}

impl Prefix {
    /// Create a prefix, checking that a stability is given iff the subtree is stabilized.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPathError::MissingStability`] or
    /// [`InvalidPathError::StrayStability`] when the pairing is wrong.
    pub fn new(
        subtree: Subtree,
        platform: Platform,
        stability: Option<Stability>,
    ) -> Result<Self, InvalidPathError> {
        match (subtree.is_stabilized(), &stability) {
            (true, None) => Err(InvalidPathError::MissingStability),
            (false, Some(s)) => Err(InvalidPathError::StrayStability(s.to_string())),
            _ => Ok(Self {
                subtree,
                platform,
                stability,
            }),
        }
    }

    /// Prefix under the `packages` subtree.
    pub fn direct(platform: impl Into<Platform>) -> Self {
        Self {
            subtree: Subtree::Direct,
            platform: platform.into(),
            stability: None,
        }
    }

    /// Prefix under the `legacyPackages` subtree.
    pub fn legacy(platform: impl Into<Platform>) -> Self {
        Self {
            subtree: Subtree::Legacy,
            platform: platform.into(),
            stability: None,
        }
    }

    /// Prefix under the `catalog` subtree for one stability tier.
    pub fn stabilized(platform: impl Into<Platform>, stability: impl Into<Stability>) -> Self {
        Self {
            subtree: Subtree::Stabilized,
            platform: platform.into(),
            stability: Some(stability.into()),
        }
    }

    /// The subtree axis.
    pub fn subtree(&self) -> Subtree {
        self.subtree
    }

    /// The platform axis.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The stability axis, present only for stabilized prefixes.
    pub fn stability(&self) -> Option<&Stability> {
        self.stability.as_ref()
    }

    /// Path segments naming this prefix in the catalog tree.
    pub fn segments(&self) -> Vec<String> {
        let mut out = vec![
            self.subtree.as_str().to_string(),
            self.platform.as_str().to_string(),
        ];
        if let Some(s) = &self.stability {
            out.push(s.as_str().to_string());
        }
        out
    }

    /// Number of segments in this prefix (2, or 3 with a stability).
    pub fn len(&self) -> usize {
        if self.stability.is_some() { 3 } else { 2 }
    }

    /// Always false; a prefix has at least a subtree and a platform.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Split an absolute segment list into its prefix and relative remainder.
    ///
    /// # Errors
    ///
    /// Returns an error if the subtree is unknown or the list is too short to
    /// hold a full prefix.
    pub fn split_path(segments: &[String]) -> Result<(Self, Vec<String>), InvalidPathError> {
        let subtree: Subtree = segments
            .first()
            .ok_or_else(|| InvalidPathError::TooShort(String::new()))?
            .parse()?;
        let platform = segments
            .get(1)
            .ok_or_else(|| InvalidPathError::TooShort(segments.join(".")))?;
        let (stability, rest) = if subtree.is_stabilized() {
            let s = segments
                .get(2)
                .ok_or_else(|| InvalidPathError::TooShort(segments.join(".")))?;
            (Some(Stability::new(s.as_str())), &segments[3..])
        } else {
            (None, &segments[2..])
        };
        let prefix = Self::new(subtree, Platform::new(platform.as_str()), stability)?;
        Ok((prefix, rest.to_vec()))
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments().join("."))
    }
}

/// Where a package lives: a prefix plus the package-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Axis part of the location.
    pub prefix: Prefix,
    /// Attribute path below the prefix.
    pub rel_path: Vec<String>,
}

impl Location {
    /// Create a location from a prefix and relative segments.
    pub fn new(prefix: Prefix, rel_path: Vec<String>) -> Self {
        Self { prefix, rel_path }
    }

    /// Full segment list: prefix segments followed by the relative path.
    pub fn segments(&self) -> Vec<String> {
        let mut out = self.prefix.segments();
        out.extend(self.rel_path.iter().cloned());
        out
    }

    /// The concrete glob path of this location (no wildcard).
    pub fn glob_path(&self) -> GlobPath {
        GlobPath::from_concrete(self.segments().into_iter().map(AttrPart::Concrete).collect())
    }

    /// Number of relative segments below the prefix.
    pub fn depth(&self) -> usize {
        self.rel_path.len()
    }

    /// Final attribute name, if the relative path is non-empty.
    pub fn attr_name(&self) -> Option<&str> {
        self.rel_path.last().map(String::as_str)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments().join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn subtree_aliases_parse() {
        assert_eq!("legacy".parse::<Subtree>().unwrap(), Subtree::Legacy);
        assert_eq!("packages".parse::<Subtree>().unwrap(), Subtree::Direct);
        assert_eq!("catalog".parse::<Subtree>().unwrap(), Subtree::Stabilized);
        assert!("nope".parse::<Subtree>().is_err());
    }

    #[test]
    fn prefix_enforces_stability_pairing() {
        let p = Platform::from("x86_64-linux");
        assert!(Prefix::new(Subtree::Stabilized, p.clone(), None).is_err());
        assert!(Prefix::new(Subtree::Legacy, p.clone(), Some("stable".into())).is_err());
        assert!(Prefix::new(Subtree::Stabilized, p, Some("stable".into())).is_ok());
    }

    #[test]
    fn split_path_separates_prefix_and_rest() {
        let (prefix, rest) =
            Prefix::split_path(&segs(&["catalog", "x86_64-linux", "stable", "hello"])).unwrap();
        assert_eq!(prefix, Prefix::stabilized("x86_64-linux", "stable"));
        assert_eq!(rest, segs(&["hello"]));

        let (prefix, rest) =
            Prefix::split_path(&segs(&["legacyPackages", "aarch64-linux", "python3Packages", "pip"]))
                .unwrap();
        assert_eq!(prefix, Prefix::legacy("aarch64-linux"));
        assert_eq!(rest, segs(&["python3Packages", "pip"]));

        assert!(Prefix::split_path(&segs(&["catalog", "x86_64-linux"])).is_err());
    }

    #[test]
    fn location_renders_dotted() {
        let loc = Location::new(Prefix::direct("x86_64-linux"), segs(&["hello"]));
        assert_eq!(loc.to_string(), "packages.x86_64-linux.hello");
        assert_eq!(loc.attr_name(), Some("hello"));
        assert_eq!(loc.depth(), 1);
    }
}
