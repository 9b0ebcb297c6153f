//! Attribute paths with an optional platform wildcard.
//!
//! A [`GlobPath`] names a package across platforms: `legacyPackages.{{system}}.hello`
//! stands for `legacyPackages.<p>.hello` for every configured platform `p`.
//! The wildcard may only occupy index 1, which is checked once at
//! construction so the rest of the code never has to.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::platform::Platform;
use crate::types::Subtree;

/// Literal token used to render the wildcard in dotted form.
pub const WILDCARD_TOKEN: &str = "{{system}}";

/// Errors raised when a path violates the glob path invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPathError {
    /// A wildcard appeared somewhere other than the platform position.
    #[error("wildcard is only allowed at index 1, found at index {index} in '{path}'")]
    MisplacedWildcard {
        /// Offending index.
        index: usize,
        /// Rendered path for diagnostics.
        path: String,
    },

    /// Segment 0 is not a known subtree name.
    #[error("unknown subtree '{0}'")]
    UnknownSubtree(String),

    /// A stabilized prefix was given without a stability tier.
    #[error("the `catalog` subtree requires a stability tier")]
    MissingStability,

    /// A stability tier was given for a subtree that has none.
    #[error("stability '{0}' is only valid under the `catalog` subtree")]
    StrayStability(String),

    /// The path is too short to address a prefix.
    #[error("path '{0}' is too short")]
    TooShort(String),
}

/// One element of a glob path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrPart {
    /// A literal attribute name.
    Concrete(String),
    /// Any platform; only valid at index 1.
    Wildcard,
}

impl AttrPart {
    /// The literal name, or `None` for the wildcard.
    pub fn as_concrete(&self) -> Option<&str> {
        match self {
            Self::Concrete(s) => Some(s),
            Self::Wildcard => None,
        }
    }

    /// Whether this part is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    fn matches_str(&self, other: &str) -> bool {
        match self {
            Self::Concrete(s) => s == other,
            Self::Wildcard => true,
        }
    }
}

impl std::fmt::Display for AttrPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Concrete(s) => write!(f, "{s}"),
            Self::Wildcard => write!(f, "{WILDCARD_TOKEN}"),
        }
    }
}

impl From<&str> for AttrPart {
    fn from(s: &str) -> Self {
        Self::Concrete(s.to_string())
    }
}

impl Serialize for AttrPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_concrete().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttrPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map_or(Self::Wildcard, Self::Concrete))
    }
}

/// A dotted attribute path whose platform segment may be a wildcard.
///
/// Equality is structural: `a.{{system}}.b` and `a.x86_64-linux.b` are
/// different paths. Hashing skips index 1, so the two land in the same
/// bucket; this is what merging by glob path relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlobPath(Vec<AttrPart>);

impl Hash for GlobPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for (i, part) in self.0.iter().enumerate() {
            if i != 1 {
                part.hash(state);
            }
        }
    }
}

impl GlobPath {
    /// Build from a mixed list of parts, checking the wildcard position.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPathError::MisplacedWildcard`] if a wildcard appears
    /// anywhere except index 1.
    pub fn from_parts(parts: Vec<AttrPart>) -> Result<Self, InvalidPathError> {
        if let Some(index) = parts
            .iter()
            .enumerate()
            .position(|(i, p)| i != 1 && p.is_wildcard())
        {
            return Err(InvalidPathError::MisplacedWildcard {
                index,
                path: render(&parts),
            });
        }
        Ok(Self(parts))
    }

    /// Build from plain string segments.
    ///
    /// The literal [`WILDCARD_TOKEN`] is read as the wildcard.
    ///
    /// # Errors
    ///
    /// Returns an error if the token appears outside index 1.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, InvalidPathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parts(
            segments
                .into_iter()
                .map(|s| {
                    let s = s.into();
                    if s == WILDCARD_TOKEN {
                        AttrPart::Wildcard
                    } else {
                        AttrPart::Concrete(s)
                    }
                })
                .collect(),
        )
    }

    /// Parse a dotted path; `*` and [`WILDCARD_TOKEN`] both denote the wildcard.
    ///
    /// # Errors
    ///
    /// Returns an error if a wildcard appears outside index 1.
    pub fn parse(dotted: &str) -> Result<Self, InvalidPathError> {
        Self::from_segments(dotted.split('.').map(|s| if s == "*" { WILDCARD_TOKEN } else { s }))
    }

    pub(crate) fn from_concrete(parts: Vec<AttrPart>) -> Self {
        Self(parts)
    }

    /// The parts of this path.
    pub fn parts(&self) -> &[AttrPart] {
        &self.0
    }

    /// Consume the path, returning its parts.
    pub fn into_parts(self) -> Vec<AttrPart> {
        self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether segment 0 names a known subtree.
    pub fn is_absolute(&self) -> bool {
        self.subtree().is_some()
    }

    /// The subtree named by segment 0, if any.
    pub fn subtree(&self) -> Option<Subtree> {
        self.0.first()?.as_concrete()?.parse().ok()
    }

    /// Whether the platform position holds the wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.0.get(1).is_some_and(AttrPart::is_wildcard)
    }

    /// The concrete platform at index 1, if any.
    pub fn platform(&self) -> Option<Platform> {
        self.0.get(1)?.as_concrete().map(Platform::new)
    }

    /// Force the platform position to the wildcard.
    pub fn coerce_wildcard(&mut self) {
        if let Some(part) = self.0.get_mut(1) {
            *part = AttrPart::Wildcard;
        }
    }

    /// Copy of this path with the platform position forced to the wildcard.
    pub fn coerced(&self) -> Self {
        let mut out = self.clone();
        out.coerce_wildcard();
        out
    }

    /// Substitute a concrete platform for the wildcard.
    pub fn with_platform(&self, platform: &Platform) -> Self {
        let mut out = self.clone();
        if let Some(part) = out.0.get_mut(1) {
            *part = AttrPart::Concrete(platform.as_str().to_string());
        }
        out
    }

    /// Concrete segments; `None` if the path still holds a wildcard.
    pub fn concrete_segments(&self) -> Option<Vec<String>> {
        self.0
            .iter()
            .map(|p| p.as_concrete().map(str::to_string))
            .collect()
    }

    /// Wildcard-aware equality: a wildcard matches any platform.
    pub fn matches(&self, other: &GlobPath) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
                (AttrPart::Wildcard, _) | (_, AttrPart::Wildcard) => true,
                (AttrPart::Concrete(x), AttrPart::Concrete(y)) => x == y,
            })
    }

    /// Wildcard-aware prefix test against concrete segments.
    pub fn is_prefix_of(&self, segments: &[String]) -> bool {
        self.0.len() <= segments.len()
            && self.0.iter().zip(segments).all(|(p, s)| p.matches_str(s))
    }
}

fn render(parts: &[AttrPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

impl std::fmt::Display for GlobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", render(&self.0))
    }
}

impl std::str::FromStr for GlobPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GlobPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GlobPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = Vec::<AttrPart>::deserialize(deserializer)?;
        Self::from_parts(parts).map_err(serde::de::Error::custom)
    }
}
