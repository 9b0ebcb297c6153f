//! JSON-document catalogs
//!
//! A [`TreeCatalog`] serves catalogs stored as JSON trees. Package nodes
//! carry `"type": "derivation"`; attribute sets that contain packages below
//! their first level set `"recurseForDerivations": true`; a node of the
//! form `{"type": "error", "message": ...}` fails to evaluate, and a node
//! with `"impure": true` fails under pure evaluation.
//!
//! Every materialization is counted so callers can check how much work a
//! resolution actually did.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use pkgq_schema::Fingerprint;
use serde_json::Value;

use crate::eval::{CatalogRef, EvalError, EvalOptions, Evaluator, LockedCatalog, NodeHandle};

/// Evaluator over in-memory JSON documents keyed by reference.
#[derive(Debug, Default)]
pub struct TreeCatalog {
    by_reference: HashMap<String, Fingerprint>,
    documents: HashMap<Fingerprint, Arc<Value>>,
    evaluations: Arc<AtomicUsize>,
}

impl TreeCatalog {
    /// Create an evaluator with no catalogs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under a reference and return its fingerprint.
    ///
    /// The fingerprint is the BLAKE3 hash of the document's canonical JSON
    /// encoding, so identical documents share one cache.
    pub fn insert(&mut self, reference: impl Into<String>, document: Value) -> Fingerprint {
        let bytes = serde_json::to_vec(&document).unwrap_or_default();
        let fingerprint = Fingerprint::compute(&bytes);
        self.documents
            .insert(fingerprint.clone(), Arc::new(document));
        self.by_reference.insert(reference.into(), fingerprint.clone());
        fingerprint
    }

    /// Load a JSON catalog file and register it under its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_file(&mut self, path: &Path) -> Result<Fingerprint> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        Ok(self.insert(path.display().to_string(), document))
    }

    /// Total node materializations and field reads so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl Evaluator for TreeCatalog {
    type Node = TreeNode;

    fn lock(&self, catalog: &CatalogRef) -> Result<LockedCatalog, EvalError> {
        let fingerprint =
            self.by_reference
                .get(&catalog.reference)
                .ok_or_else(|| EvalError::Lock {
                    reference: catalog.reference.clone(),
                    message: "no such catalog document".to_string(),
                })?;
        Ok(LockedCatalog {
            id: catalog.id.clone(),
            locked_ref: format!("{}?fingerprint={}", catalog.reference, fingerprint.short()),
            fingerprint: fingerprint.clone(),
        })
    }

    fn open_root(
        &self,
        fingerprint: &Fingerprint,
        options: &EvalOptions,
    ) -> Result<TreeNode, EvalError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let root = self
            .documents
            .get(fingerprint)
            .ok_or_else(|| EvalError::Failed {
                path: String::new(),
                message: format!("unknown catalog fingerprint {fingerprint}"),
            })?;
        Ok(TreeNode {
            root: Arc::clone(root),
            path: Vec::new(),
            options: *options,
            evaluations: Arc::clone(&self.evaluations),
        })
    }
}

/// One node of a [`TreeCatalog`] document.
#[derive(Debug, Clone)]
pub struct TreeNode {
    root: Arc<Value>,
    path: Vec<String>,
    options: EvalOptions,
    evaluations: Arc<AtomicUsize>,
}

impl TreeNode {
    fn value(&self) -> &Value {
        self.path
            .iter()
            .fold(self.root.as_ref(), |v, key| &v[key.as_str()])
    }

    fn dotted(&self) -> String {
        self.path.join(".")
    }

    fn tick(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.tick();
        self.value().get(name)
    }
}

impl NodeHandle for TreeNode {
    fn child_names(&self) -> Result<Vec<String>, EvalError> {
        self.tick();
        match self.value() {
            Value::Object(map) => Ok(map
                .iter()
                .filter(|(_, v)| v.is_object())
                .map(|(k, _)| k.clone())
                .collect()),
            _ => Err(EvalError::Failed {
                path: self.dotted(),
                message: "not an attribute set".to_string(),
            }),
        }
    }

    fn child(&self, name: &str) -> Result<Self, EvalError> {
        self.tick();
        let mut path = self.path.clone();
        path.push(name.to_string());
        let dotted = path.join(".");

        let Some(value) = self.value().get(name).filter(|v| v.is_object()) else {
            return Err(EvalError::NotFound(dotted));
        };
        if value.get("type").and_then(Value::as_str) == Some("error") {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("evaluation error")
                .to_string();
            return Err(EvalError::Failed {
                path: dotted,
                message,
            });
        }
        if self.options.pure && value.get("impure").and_then(Value::as_bool) == Some(true) {
            return Err(EvalError::Failed {
                path: dotted,
                message: "access to impure input in pure evaluation mode".to_string(),
            });
        }
        if !self.options.quiet {
            tracing::trace!("evaluated {dotted}");
        }

        Ok(Self {
            root: Arc::clone(&self.root),
            path,
            options: self.options,
            evaluations: Arc::clone(&self.evaluations),
        })
    }

    fn is_package(&self) -> bool {
        self.value().get("type").and_then(Value::as_str) == Some("derivation")
    }

    fn string_field(&self, name: &str) -> Result<String, EvalError> {
        match self.field(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(EvalError::WrongType {
                path: self.dotted(),
                field: name.to_string(),
                expected: "string",
            }),
            None => Err(EvalError::MissingField {
                path: self.dotted(),
                field: name.to_string(),
            }),
        }
    }

    fn bool_field(&self, name: &str) -> Result<Option<bool>, EvalError> {
        match self.field(name) {
            Some(Value::Bool(b)) => Ok(Some(*b)),
            None | Some(Value::Null) => Ok(None),
            Some(_) => Err(EvalError::WrongType {
                path: self.dotted(),
                field: name.to_string(),
                expected: "boolean",
            }),
        }
    }

    fn list_field(&self, name: &str) -> Result<Vec<String>, EvalError> {
        let wrong_type = || EvalError::WrongType {
            path: self.dotted(),
            field: name.to_string(),
            expected: "list of strings",
        };
        match self.field(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(wrong_type))
                .collect(),
            Some(_) => Err(wrong_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (TreeCatalog, LockedCatalog) {
        let mut catalog = TreeCatalog::new();
        catalog.insert(
            "mem:sample",
            json!({
                "packages": {
                    "x86_64-linux": {
                        "hello": {
                            "type": "derivation",
                            "name": "hello-2.12",
                            "outputs": ["out", "man"],
                            "unfree": false
                        },
                        "broken": { "type": "error", "message": "assertion failed" },
                        "secret": { "type": "derivation", "name": "secret-1", "impure": true }
                    }
                }
            }),
        );
        let locked = catalog
            .lock(&CatalogRef::new("sample", "mem:sample"))
            .unwrap();
        (catalog, locked)
    }

    #[test]
    fn lock_unknown_reference_fails() {
        let (catalog, _) = sample();
        let err = catalog.lock(&CatalogRef::new("x", "mem:nope")).unwrap_err();
        assert!(matches!(err, EvalError::Lock { .. }));
    }

    #[test]
    fn descend_and_read_fields() {
        let (catalog, locked) = sample();
        let root = catalog
            .open_root(&locked.fingerprint, &EvalOptions::default())
            .unwrap();
        let hello = root.descend(&["packages", "x86_64-linux", "hello"]).unwrap();
        assert!(hello.is_package());
        assert_eq!(hello.string_field("name").unwrap(), "hello-2.12");
        assert_eq!(hello.list_field("outputs").unwrap(), vec!["out", "man"]);
        assert_eq!(hello.bool_field("unfree").unwrap(), Some(false));
        assert_eq!(hello.bool_field("broken").unwrap(), None);
        assert!(matches!(
            hello.string_field("license"),
            Err(EvalError::MissingField { .. })
        ));
        assert!(catalog.evaluations() > 0);
    }

    #[test]
    fn missing_and_failing_children() {
        let (catalog, locked) = sample();
        let root = catalog
            .open_root(&locked.fingerprint, &EvalOptions::default())
            .unwrap();
        let set = root.descend(&["packages", "x86_64-linux"]).unwrap();
        assert!(set.child("nope").unwrap_err().is_not_found());
        assert!(matches!(set.child("broken"), Err(EvalError::Failed { .. })));
        assert!(matches!(set.child("secret"), Err(EvalError::Failed { .. })));

        let impure = EvalOptions {
            pure: false,
            quiet: true,
        };
        let root = catalog.open_root(&locked.fingerprint, &impure).unwrap();
        assert!(root.descend(&["packages", "x86_64-linux", "secret"]).is_ok());
    }

    #[test]
    fn child_names_skip_scalar_fields() {
        let (catalog, locked) = sample();
        let root = catalog
            .open_root(&locked.fingerprint, &EvalOptions::default())
            .unwrap();
        let set = root.descend(&["packages", "x86_64-linux"]).unwrap();
        assert_eq!(set.child_names().unwrap(), vec!["broken", "hello", "secret"]);
        let hello = set.child("hello").unwrap();
        assert_eq!(hello.child_names().unwrap(), Vec::<String>::new());
    }
}
