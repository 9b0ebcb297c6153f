use serde::{Deserialize, Deserializer, Serialize};

/// Content hash identifying one exact catalog snapshot.
///
/// The fingerprint is supplied by the evaluation collaborator and is the
/// partition key of the crawl cache: each fingerprint owns one database file
/// named after its hex form. Validation happens at construction and at
/// deserialization time, so a `Fingerprint` is always lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Create a validated fingerprint from a hex string.
    ///
    /// Accepts strings with or without a `blake3:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error string if the input is empty, has odd length, or
    /// contains non-hex characters.
    pub fn new(s: &str) -> Result<Self, String> {
        let hex_part = s.strip_prefix("blake3:").unwrap_or(s);
        if hex_part.is_empty() {
            return Err("Invalid fingerprint: empty string".to_string());
        }
        if hex::decode(hex_part).is_err() {
            return Err(format!("Invalid fingerprint: expected hex digits, got '{s}'"));
        }
        Ok(Self(hex_part.to_lowercase()))
    }

    /// Compute the BLAKE3 fingerprint of raw catalog bytes.
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Return the hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let a = Fingerprint::compute(b"catalog");
        let b = Fingerprint::compute(b"catalog");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, Fingerprint::compute(b"other catalog"));
    }

    #[test]
    fn new_normalizes_and_validates() {
        let fp = Fingerprint::new("blake3:ABCD").unwrap();
        assert_eq!(fp.as_str(), "abcd");
        assert!(Fingerprint::new("").is_err());
        assert!(Fingerprint::new("xyz").is_err());
        assert!(Fingerprint::new("abc").is_err());
    }

    #[test]
    fn deserialize_rejects_garbage() {
        let bad: Result<Fingerprint, _> = serde_json::from_str("\"not-hex\"");
        assert!(bad.is_err());
        let good: Fingerprint = serde_json::from_str("\"00ff\"").unwrap();
        assert_eq!(good.short(), "00ff");
    }
}
