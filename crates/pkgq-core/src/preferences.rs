//! Resolution preferences
//!
//! Preferences decide which packages are acceptable at all (unfree, broken,
//! license policy), in which order a catalog's axes are searched, and how
//! results from several catalogs are ranked.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use pkgq_schema::{Stability, Subtree};
use serde::{Deserialize, Serialize};

use crate::eval::CatalogRef;
use crate::predicate::Predicate;

/// Package acceptance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allows {
    /// Accept packages with unfree licenses.
    pub unfree: bool,
    /// Accept packages marked broken.
    pub broken: bool,
    /// When set, only these license ids are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Vec<String>>,
}

impl Default for Allows {
    fn default() -> Self {
        Self {
            unfree: true,
            broken: false,
            licenses: None,
        }
    }
}

/// Semantic version preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemverPrefs {
    /// Let pre-release versions satisfy ranges that cover their release.
    pub prefer_pre_releases: bool,
}

/// Preferences for one resolution session.
///
/// Per-catalog tables are keyed by catalog id; catalogs without an entry
/// fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Catalog ids in ranking order; unlisted catalogs rank after these.
    pub catalogs: Vec<String>,
    /// Subtree search order per catalog.
    pub subtrees: BTreeMap<String, Vec<Subtree>>,
    /// Stability search order per catalog.
    pub stabilities: BTreeMap<String, Vec<Stability>>,
    /// Acceptance policy.
    pub allow: Allows,
    /// Semver preferences.
    pub semver: SemverPrefs,
}

impl Preferences {
    /// Predicate enforcing the unfree, broken, and license policy.
    pub fn policy_predicate(&self) -> Predicate {
        let mut parts = Vec::new();
        if !self.allow.unfree {
            parts.push(Predicate::is_unfree(false));
        }
        if !self.allow.broken {
            parts.push(Predicate::is_broken(false));
        }
        if let Some(licenses) = &self.allow.licenses {
            parts.push(Predicate::has_license_in(licenses.clone()));
        }
        Predicate::all(parts)
    }

    /// Subtrees to search in `catalog_id`, highest priority first.
    pub fn subtree_order(&self, catalog_id: &str) -> Vec<Subtree> {
        self.subtrees
            .get(catalog_id)
            .cloned()
            .unwrap_or_else(|| Subtree::DEFAULT_ORDER.to_vec())
    }

    /// Stability tiers to search in `catalog_id`, highest priority first.
    pub fn stability_order(&self, catalog_id: &str) -> Vec<Stability> {
        self.stabilities
            .get(catalog_id)
            .cloned()
            .unwrap_or_else(Stability::default_order)
    }

    /// Total order over catalog ids: declared position, then lexical id.
    pub fn compare_catalogs(&self, a: &str, b: &str) -> Ordering {
        let rank = |id: &str| {
            self.catalogs
                .iter()
                .position(|c| c == id)
                .unwrap_or(usize::MAX)
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    }

    /// Stable sort of catalogs by [`Preferences::compare_catalogs`].
    pub fn rank_catalogs<'a>(&self, catalogs: &'a [CatalogRef]) -> Vec<&'a CatalogRef> {
        let mut ranked: Vec<&CatalogRef> = catalogs.iter().collect();
        ranked.sort_by(|a, b| self.compare_catalogs(&a.id, &b.id));
        ranked
    }
}
