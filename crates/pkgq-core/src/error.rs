//! Domain-specific errors for resolution

use pkgq_schema::InvalidPathError;
use thiserror::Error;

use crate::eval::EvalError;

/// A query descriptor is malformed or contradictory.
///
/// Raised only while constructing a [`Descriptor`](crate::descriptor::Descriptor),
/// never during resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Both an absolute and a relative path were given.
    #[error("`absPath` and `relPath` are mutually exclusive")]
    PathConflict,

    /// The absolute path is shorter than `subtree.platform.name`.
    #[error("`absPath` must have at least 3 segments, got {0}")]
    AbsPathTooShort(usize),

    /// The absolute path does not start with a subtree name.
    #[error("`absPath` must start with a subtree name, got '{0}'")]
    NotAbsolute(String),

    /// The path violates the glob path invariants.
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),

    /// Both an exact version and a semver range were given.
    #[error("`version` and `semver` are mutually exclusive")]
    VersionConflict,

    /// The semver range does not parse.
    #[error("invalid semver range '{range}': {message}")]
    InvalidSemver {
        /// Range as written.
        range: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Neither stabilized nor unstabilized subtrees may be searched.
    #[error("at least one of `searchStabilized` and `searchUnstabilized` must be true")]
    NoSearchScope,

    /// A stability tier was given while stabilized search is off.
    #[error("`stability` requires `searchStabilized` to be true")]
    StabilityWithoutStabilized,

    /// A stability tier was given while unstabilized search is on.
    #[error("`stability` forbids `searchUnstabilized`")]
    StabilityWithUnstabilized,

    /// The short-hand string form does not parse.
    #[error("invalid descriptor '{input}': {message}")]
    Syntax {
        /// Input as written.
        input: String,
        /// What was wrong with it.
        message: String,
    },
}

impl DescriptorError {
    /// Create a syntax error for short-hand input.
    pub fn syntax(input: &str, message: impl std::fmt::Display) -> Self {
        Self::Syntax {
            input: input.to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors surfaced by the resolver.
///
/// Backend faults (cache failures, broken sub-nodes, unlockable catalogs)
/// are absorbed and logged; only an explicitly addressed absolute path
/// that fails to evaluate is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Opening an explicitly requested absolute path failed.
    #[error("failed to evaluate '{path}': {source}")]
    Evaluation {
        /// Dotted path that was requested.
        path: String,
        /// Underlying evaluator error.
        #[source]
        source: EvalError,
    },
}
