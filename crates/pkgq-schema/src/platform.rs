use std::borrow::Borrow;

/// Target system identifier (e.g. `x86_64-linux`).
///
/// Platforms are opaque to the resolver: they are only compared for
/// equality and used as path segments and cache keys. The value is stored
/// exactly as given.
///
/// # Example
///
/// ```
/// use pkgq_schema::Platform;
///
/// let current = Platform::current();
/// println!("Resolving for: {}", current);
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    /// Create a platform from any string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The platform of the running host, as `<arch>-<os>`.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self(format!("{}-{os}", std::env::consts::ARCH))
    }

    /// Return the platform string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Platform {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Platform {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Platform {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Platform {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
