//! Evaluation collaborator interface
//!
//! Catalogs are lazy trees: every node costs an evaluation to materialize.
//! The resolver only talks to them through these traits, so the actual
//! engine (or the JSON [`TreeCatalog`](crate::tree::TreeCatalog) used in
//! tests and by the CLI) can be swapped freely.

use pkgq_schema::Fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the evaluation collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The requested child does not exist.
    #[error("attribute '{0}' not found")]
    NotFound(String),

    /// The node exists but could not be evaluated.
    #[error("failed to evaluate '{path}': {message}")]
    Failed {
        /// Dotted path of the failing node.
        path: String,
        /// Evaluator diagnostic.
        message: String,
    },

    /// A required field is absent.
    #[error("field '{field}' missing on '{path}'")]
    MissingField {
        /// Dotted path of the node.
        path: String,
        /// Field name.
        field: String,
    },

    /// A field holds a value of the wrong type.
    #[error("field '{field}' on '{path}' is not a {expected}")]
    WrongType {
        /// Dotted path of the node.
        path: String,
        /// Field name.
        field: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// The catalog reference could not be locked.
    #[error("failed to lock catalog '{reference}': {message}")]
    Lock {
        /// Reference that was being locked.
        reference: String,
        /// Evaluator diagnostic.
        message: String,
    },
}

impl EvalError {
    /// Whether this error means "absent" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Per-call evaluation settings, passed explicitly instead of toggled globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Forbid access to impure inputs while evaluating.
    pub pure: bool,
    /// Suppress evaluator warnings and traces.
    pub quiet: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            pure: true,
            quiet: true,
        }
    }
}

/// A user-declared catalog: an id plus an unlocked source reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRef {
    /// Short identifier used in descriptors and preferences.
    pub id: String,
    /// Source reference understood by the evaluator.
    pub reference: String,
}

impl CatalogRef {
    /// Create a catalog reference.
    pub fn new(id: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference: reference.into(),
        }
    }
}

/// A catalog pinned to one exact snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedCatalog {
    /// Identifier copied from the [`CatalogRef`].
    pub id: String,
    /// Fully pinned reference.
    pub locked_ref: String,
    /// Content fingerprint of the snapshot.
    pub fingerprint: Fingerprint,
}

/// A handle to one node of a lazily evaluated catalog tree.
///
/// Every call returns a fresh, independently owned value; handles never
/// share state with each other.
pub trait NodeHandle: Sized {
    /// Names of this node's children.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be evaluated as an attribute set.
    fn child_names(&self) -> Result<Vec<String>, EvalError>;

    /// Open one child.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NotFound`] if there is no such child, or another
    /// variant if the child fails to evaluate.
    fn child(&self, name: &str) -> Result<Self, EvalError>;

    /// Whether this node is a package.
    fn is_package(&self) -> bool;

    /// Read a string field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is absent or not a string.
    fn string_field(&self, name: &str) -> Result<String, EvalError>;

    /// Read an optional boolean field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field exists but is not a boolean.
    fn bool_field(&self, name: &str) -> Result<Option<bool>, EvalError>;

    /// Read a list-of-strings field; absent fields read as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the field exists but is not a list of strings.
    fn list_field(&self, name: &str) -> Result<Vec<String>, EvalError>;

    /// Descend through several children in order.
    ///
    /// # Errors
    ///
    /// Returns the first error hit on the way down.
    fn descend<S: AsRef<str>>(&self, path: &[S]) -> Result<Self, EvalError>
    where
        Self: Clone,
    {
        let mut node = self.clone();
        for name in path {
            node = node.child(name.as_ref())?;
        }
        Ok(node)
    }
}

/// The catalog evaluation engine.
pub trait Evaluator {
    /// Node handle type produced by this evaluator.
    type Node: NodeHandle + Clone;

    /// Pin a catalog reference to an exact snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Lock`] if the reference cannot be resolved.
    fn lock(&self, catalog: &CatalogRef) -> Result<LockedCatalog, EvalError>;

    /// Open the root node of a locked snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be evaluated.
    fn open_root(
        &self,
        fingerprint: &Fingerprint,
        options: &EvalOptions,
    ) -> Result<Self::Node, EvalError>;
}
