use serde::{Deserialize, Serialize};

/// How far a crawl of one prefix has progressed.
///
/// States are totally ordered by [`CrawlProgress::rank`]:
/// `Force < None < Partial < PathsOnly < FullInfo < Empty`.
/// Stored progress only moves forward. `Force` is a request, not a state:
/// it asks for a re-crawl and is never written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlProgress {
    /// Caller demands a re-crawl; never persisted.
    Force,
    /// Nothing is known about the prefix.
    #[default]
    None,
    /// A crawl started but did not finish.
    Partial,
    /// Every package path is recorded, without metadata.
    PathsOnly,
    /// Every package is recorded with full metadata.
    FullInfo,
    /// The prefix is absent or holds no packages.
    Empty,
}

impl CrawlProgress {
    /// Position in the total order.
    pub fn rank(self) -> u8 {
        match self {
            Self::Force => 0,
            Self::None => 1,
            Self::Partial => 2,
            Self::PathsOnly => 3,
            Self::FullInfo => 4,
            Self::Empty => 5,
        }
    }

    /// Whether `self` is at least as advanced as `other`.
    pub fn is_at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// Whether the cache holds everything there is to know about the prefix.
    pub fn is_complete(self) -> bool {
        self.is_at_least(Self::FullInfo)
    }

    /// Whether this value may be written to the cache.
    pub fn is_persistable(self) -> bool {
        !matches!(self, Self::Force)
    }

    /// Stable integer code stored in the cache; `None` for `Force`.
    pub fn code(self) -> Option<i64> {
        match self {
            Self::Force => None,
            Self::None => Some(0),
            Self::Partial => Some(1),
            Self::PathsOnly => Some(2),
            Self::FullInfo => Some(3),
            Self::Empty => Some(4),
        }
    }

    /// Decode a stored integer code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Partial),
            2 => Some(Self::PathsOnly),
            3 => Some(Self::FullInfo),
            4 => Some(Self::Empty),
            _ => None,
        }
    }

    /// Lowercase name used in CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::None => "none",
            Self::Partial => "partial",
            Self::PathsOnly => "paths-only",
            Self::FullInfo => "full-info",
            Self::Empty => "empty",
        }
    }
}

impl PartialOrd for CrawlProgress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CrawlProgress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for CrawlProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CrawlProgress; 6] = [
        CrawlProgress::Force,
        CrawlProgress::None,
        CrawlProgress::Partial,
        CrawlProgress::PathsOnly,
        CrawlProgress::FullInfo,
        CrawlProgress::Empty,
    ];

    #[test]
    fn order_is_total_and_strict() {
        for pair in ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[1].is_at_least(pair[0]));
            assert!(!pair[0].is_at_least(pair[1]));
        }
    }

    #[test]
    fn codes_round_trip_except_force() {
        for p in ALL {
            assert_eq!(p.is_persistable(), p.code().is_some());
            match p.code() {
                Some(c) => assert_eq!(CrawlProgress::from_code(c), Some(p)),
                None => assert_eq!(p, CrawlProgress::Force),
            }
        }
        assert_eq!(CrawlProgress::from_code(99), None);
    }

    #[test]
    fn completeness() {
        assert!(CrawlProgress::FullInfo.is_complete());
        assert!(CrawlProgress::Empty.is_complete());
        assert!(!CrawlProgress::PathsOnly.is_complete());
        assert_eq!(CrawlProgress::default(), CrawlProgress::None);
    }
}
