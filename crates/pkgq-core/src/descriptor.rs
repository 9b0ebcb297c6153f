//! Package query descriptors
//!
//! A [`Descriptor`] is a validated query. It is built either from a
//! structured document ([`DescriptorDoc`], camelCase JSON) or from the
//! short-hand grammar
//!
//! ```text
//! [catalog#]<name | rel.path | subtree.platform.path>[@version | @=version]
//! ```
//!
//! `@=` forces an exact version; a plain `@` is read as a semver range when
//! it parses as one and as an exact version otherwise. `*` or `{{system}}`
//! in the platform position of an absolute path is the wildcard.
//!
//! Every combination that makes no sense is rejected at construction, so
//! the resolver never has to second-guess a descriptor.

use pkgq_schema::{AttrPart, GlobPath, Platform, Prefix, Stability, Subtree};
use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;
use crate::predicate::Predicate;
use crate::preferences::Preferences;

/// Unvalidated descriptor document, as read from JSON or TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorDoc {
    /// Package name (full, short, or attribute name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Exact version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Semver range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,
    /// Absolute path; `null` in position 1 is the platform wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<Vec<AttrPart>>,
    /// Path below the axis prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_path: Option<Vec<String>>,
    /// Restrict the stabilized subtree to one tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<Stability>,
    /// Search the stabilized subtree (default `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_stabilized: Option<bool>,
    /// Search the unstabilized subtrees (default `true`, `false` with a stability).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_unstabilized: Option<bool>,
    /// Only resolve in the catalog with this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

/// A validated package query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DescriptorDoc", into = "DescriptorDoc")]
pub struct Descriptor {
    name: Option<String>,
    version: Option<String>,
    semver: Option<semver::VersionReq>,
    abs_path: Option<GlobPath>,
    rel_path: Option<Vec<String>>,
    stability: Option<Stability>,
    search_stabilized: bool,
    search_unstabilized: bool,
    catalog: Option<String>,
}

impl TryFrom<DescriptorDoc> for Descriptor {
    type Error = DescriptorError;

    fn try_from(doc: DescriptorDoc) -> Result<Self, Self::Error> {
        if doc.abs_path.is_some() && doc.rel_path.is_some() {
            return Err(DescriptorError::PathConflict);
        }

        let abs_path = doc.abs_path.map(GlobPath::from_parts).transpose()?;
        if let Some(path) = &abs_path {
            if path.len() < 3 {
                return Err(DescriptorError::AbsPathTooShort(path.len()));
            }
            if !path.is_absolute() {
                return Err(DescriptorError::NotAbsolute(path.to_string()));
            }
        }

        if doc.version.is_some() && doc.semver.is_some() {
            return Err(DescriptorError::VersionConflict);
        }
        let semver = doc
            .semver
            .map(|range| {
                semver::VersionReq::parse(&range).map_err(|e| DescriptorError::InvalidSemver {
                    range: range.clone(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let search_stabilized = doc.search_stabilized.unwrap_or(true);
        let search_unstabilized = doc
            .search_unstabilized
            .unwrap_or(doc.stability.is_none());
        if doc.stability.is_some() {
            if !search_stabilized {
                return Err(DescriptorError::StabilityWithoutStabilized);
            }
            if search_unstabilized {
                return Err(DescriptorError::StabilityWithUnstabilized);
            }
        }
        if !search_stabilized && !search_unstabilized {
            return Err(DescriptorError::NoSearchScope);
        }

        Ok(Self {
            name: doc.name,
            version: doc.version,
            semver,
            abs_path,
            rel_path: doc.rel_path,
            stability: doc.stability,
            search_stabilized,
            search_unstabilized,
            catalog: doc.catalog,
        })
    }
}

impl From<Descriptor> for DescriptorDoc {
    fn from(d: Descriptor) -> Self {
        Self {
            name: d.name,
            version: d.version,
            semver: d.semver.map(|r| r.to_string()),
            abs_path: d.abs_path.map(GlobPath::into_parts),
            rel_path: d.rel_path,
            stability: d.stability,
            search_stabilized: Some(d.search_stabilized),
            search_unstabilized: Some(d.search_unstabilized),
            catalog: d.catalog,
        }
    }
}

impl std::str::FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Descriptor {
    /// Query for a package by name with default search flags.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: None,
            semver: None,
            abs_path: None,
            rel_path: None,
            stability: None,
            search_stabilized: true,
            search_unstabilized: true,
            catalog: None,
        }
    }

    /// Parse the short-hand string form.
    ///
    /// `[catalog#]target[@version]`, where `target` is a name or a dotted
    /// path. `@=2.12` and `@2.12.0` request an exact version, anything else
    /// that reads as a range (`@^2`, `@>=1.4`) becomes a semver constraint.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Syntax`] for unparseable input, or any
    /// validation error the equivalent document would raise.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgq_core::descriptor::Descriptor;
    ///
    /// let d = Descriptor::parse("nixpkgs#hello@^2.10").unwrap();
    /// assert_eq!(d.name(), Some("hello"));
    /// assert_eq!(d.catalog(), Some("nixpkgs"));
    /// assert!(d.semver().is_some());
    /// ```
    pub fn parse(input: &str) -> Result<Self, DescriptorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DescriptorError::syntax(input, "empty descriptor"));
        }

        let mut doc = DescriptorDoc::default();

        let rest = match trimmed.split_once('#') {
            Some(("", _)) => return Err(DescriptorError::syntax(input, "empty catalog id")),
            Some((catalog, rest)) => {
                doc.catalog = Some(catalog.to_string());
                rest
            }
            None => trimmed,
        };

        let target = match rest.split_once('@') {
            Some((_, "")) => return Err(DescriptorError::syntax(input, "empty version")),
            Some((target, version)) => {
                if let Some(exact) = version.strip_prefix('=') {
                    doc.version = Some(exact.to_string());
                } else if semver::Version::parse(version).is_ok() {
                    // A full version with no operator is an exact match
                    doc.version = Some(version.to_string());
                } else if semver::VersionReq::parse(version).is_ok() {
                    doc.semver = Some(version.to_string());
                } else {
                    doc.version = Some(version.to_string());
                }
                target
            }
            None => rest,
        };

        if target.is_empty() {
            return Err(DescriptorError::syntax(input, "missing package name or path"));
        }
        if target.contains('.') {
            let path = GlobPath::parse(target)?;
            if path.is_absolute() {
                doc.abs_path = Some(path.into_parts());
            } else {
                doc.rel_path = Some(path.concrete_segments().ok_or_else(|| {
                    DescriptorError::syntax(input, "relative paths cannot contain a wildcard")
                })?);
            }
        } else {
            doc.name = Some(target.to_string());
        }

        Self::try_from(doc)
    }

    /// Requested package name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Requested exact version.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Requested semver range.
    pub fn semver(&self) -> Option<&semver::VersionReq> {
        self.semver.as_ref()
    }

    /// Requested absolute path.
    pub fn abs_path(&self) -> Option<&GlobPath> {
        self.abs_path.as_ref()
    }

    /// Requested relative path.
    pub fn rel_path(&self) -> Option<&[String]> {
        self.rel_path.as_deref()
    }

    /// Requested stability tier.
    pub fn stability(&self) -> Option<&Stability> {
        self.stability.as_ref()
    }

    /// Whether the stabilized subtree is searched.
    pub fn search_stabilized(&self) -> bool {
        self.search_stabilized
    }

    /// Whether the unstabilized subtrees are searched.
    pub fn search_unstabilized(&self) -> bool {
        self.search_unstabilized
    }

    /// Catalog this query is restricted to.
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Whether resolving this descriptor requires a guided crawl.
    pub fn needs_crawl(&self) -> bool {
        self.abs_path.is_none() && self.rel_path.is_none()
    }

    /// Combine this descriptor's constraints with the preference policy.
    ///
    /// Path and subtree constraints are only added when `is_full_crawl` is
    /// set; targeted lookups already pin the location.
    pub fn to_predicate(&self, prefs: &Preferences, is_full_crawl: bool) -> Predicate {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(Predicate::has_name(name.clone()));
        }
        if let Some(version) = &self.version {
            parts.push(Predicate::has_version(version.clone()));
        }
        if let Some(range) = &self.semver {
            parts.push(Predicate::satisfies_semver(
                range.clone(),
                prefs.semver.prefer_pre_releases,
            ));
        }

        if is_full_crawl {
            if let Some(path) = &self.abs_path {
                parts.push(Predicate::has_abs_path_prefix(path.clone()));
            }
            if let Some(rel) = &self.rel_path {
                parts.push(Predicate::has_rel_path_prefix(rel.clone()));
            }
            match (self.search_stabilized, self.search_unstabilized) {
                (true, false) => parts.push(Predicate::has_subtree(Subtree::Stabilized)),
                (false, true) => parts.push(!Predicate::has_subtree(Subtree::Stabilized)),
                _ => {}
            }
            if let Some(stability) = &self.stability {
                parts.push(Predicate::has_stability(stability.clone()));
            }
        }

        parts.push(prefs.policy_predicate());
        Predicate::all(parts)
    }

    /// Axis prefixes this descriptor searches in a catalog, in priority order.
    pub fn enabled_prefixes(
        &self,
        prefs: &Preferences,
        catalog_id: &str,
        platforms: &[Platform],
    ) -> Vec<Prefix> {
        let mut out = Vec::new();
        for subtree in prefs.subtree_order(catalog_id) {
            match subtree {
                Subtree::Stabilized if self.search_stabilized => {
                    let tiers = match &self.stability {
                        Some(s) => vec![s.clone()],
                        None => prefs.stability_order(catalog_id),
                    };
                    for tier in tiers {
                        for platform in platforms {
                            out.push(Prefix::stabilized(platform.clone(), tier.clone()));
                        }
                    }
                }
                Subtree::Direct if self.search_unstabilized => {
                    out.extend(platforms.iter().cloned().map(Prefix::direct));
                }
                Subtree::Legacy if self.search_unstabilized => {
                    out.extend(platforms.iter().cloned().map(Prefix::legacy));
                }
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgq_schema::{Location, PackageRecord};

    fn doc_json(json: &str) -> Result<Descriptor, DescriptorError> {
        let doc: DescriptorDoc = serde_json::from_str(json).unwrap();
        Descriptor::try_from(doc)
    }

    #[test]
    fn abs_and_rel_paths_conflict() {
        let err = doc_json(r#"{"absPath": ["a", "b"], "relPath": ["x"]}"#).unwrap_err();
        assert_eq!(err, DescriptorError::PathConflict);
    }

    #[test]
    fn version_and_semver_conflict() {
        let err = doc_json(r#"{"version": "1", "semver": "^1"}"#).unwrap_err();
        assert_eq!(err, DescriptorError::VersionConflict);
    }

    #[test]
    fn search_scope_rules() {
        assert_eq!(
            doc_json(r#"{"searchStabilized": false, "searchUnstabilized": false}"#).unwrap_err(),
            DescriptorError::NoSearchScope
        );
        assert_eq!(
            doc_json(r#"{"stability": "stable", "searchStabilized": false}"#).unwrap_err(),
            DescriptorError::StabilityWithoutStabilized
        );
        assert_eq!(
            doc_json(r#"{"stability": "stable", "searchUnstabilized": true}"#).unwrap_err(),
            DescriptorError::StabilityWithUnstabilized
        );

        let d = doc_json(r#"{"stability": "stable"}"#).unwrap();
        assert!(d.search_stabilized());
        assert!(!d.search_unstabilized());
    }

    #[test]
    fn name_alone_uses_defaults() {
        let d = doc_json(r#"{"name": "hello"}"#).unwrap();
        assert_eq!(d.name(), Some("hello"));
        assert!(d.search_stabilized());
        assert!(d.search_unstabilized());
        assert!(d.needs_crawl());
        assert_eq!(d, Descriptor::by_name("hello"));
    }

    #[test]
    fn abs_path_validation() {
        assert_eq!(
            doc_json(r#"{"absPath": ["packages", "x86_64-linux"]}"#).unwrap_err(),
            DescriptorError::AbsPathTooShort(2)
        );
        assert!(matches!(
            doc_json(r#"{"absPath": ["packages", "x86_64-linux", null]}"#).unwrap_err(),
            DescriptorError::InvalidPath(_)
        ));
        assert!(matches!(
            doc_json(r#"{"absPath": ["nope", "x86_64-linux", "hello"]}"#).unwrap_err(),
            DescriptorError::NotAbsolute(_)
        ));
        let d = doc_json(r#"{"absPath": ["packages", null, "hello"]}"#).unwrap();
        assert!(d.abs_path().unwrap().has_wildcard());
    }

    #[test]
    fn invalid_semver_range() {
        assert!(matches!(
            doc_json(r#"{"semver": "not a range"}"#).unwrap_err(),
            DescriptorError::InvalidSemver { .. }
        ));
    }

    #[test]
    fn document_round_trip() {
        for json in [
            r#"{"name": "hello", "semver": "^2.0.0", "catalog": "nixpkgs"}"#,
            r#"{"absPath": ["legacyPackages", null, "hello"]}"#,
            r#"{"relPath": ["python3Packages", "pip"], "stability": "unstable"}"#,
            r#"{"name": "hello", "version": "2.12", "searchStabilized": false}"#,
        ] {
            let d = doc_json(json).unwrap();
            let value = serde_json::to_value(&d).unwrap();
            let back: Descriptor = serde_json::from_value(value).unwrap();
            assert_eq!(back, d);
        }
    }

    #[test]
    fn shorthand_forms() {
        let d = Descriptor::parse("hello").unwrap();
        assert_eq!(d.name(), Some("hello"));

        let d = Descriptor::parse("hello@=2.12").unwrap();
        assert_eq!(d.version(), Some("2.12"));
        assert!(d.semver().is_none());

        let d = Descriptor::parse("hello@^2").unwrap();
        assert!(d.semver().is_some());

        let d = Descriptor::parse("hello@2.0.0").unwrap();
        assert_eq!(d.version(), Some("2.0.0"));
        assert!(d.semver().is_none());

        let d = Descriptor::parse("hello@2023-01-01").unwrap();
        assert_eq!(d.version(), Some("2023-01-01"));

        let d = Descriptor::parse("nixpkgs#legacyPackages.*.hello").unwrap();
        assert_eq!(d.catalog(), Some("nixpkgs"));
        assert_eq!(
            d.abs_path().unwrap().to_string(),
            "legacyPackages.{{system}}.hello"
        );

        let d = Descriptor::parse("python3Packages.pip").unwrap();
        assert_eq!(
            d.rel_path().unwrap(),
            &["python3Packages".to_string(), "pip".to_string()]
        );

        assert!(Descriptor::parse("").is_err());
        assert!(Descriptor::parse("#hello").is_err());
        assert!(Descriptor::parse("hello@").is_err());
        assert!(Descriptor::parse("foo.*.bar").is_err());
    }

    #[test]
    fn predicate_combines_constraints_and_policy() {
        let d = doc_json(r#"{"name": "hello", "semver": "^2"}"#).unwrap();
        let pred = d.to_predicate(&Preferences::default(), true);
        let loc = Location::new(Prefix::legacy("x86_64-linux"), vec!["hello".into()]);

        assert!(pred.test(&PackageRecord::new(loc.clone(), "hello-2.12", None, None)));
        assert!(!pred.test(&PackageRecord::new(loc.clone(), "hello-1.0", None, None)));
        let mut broken = PackageRecord::new(loc, "hello-2.12", None, None);
        broken.broken = Some(true);
        assert!(!pred.test(&broken));
    }

    #[test]
    fn bare_full_version_matches_exactly() {
        let d = Descriptor::parse("hello@2.0.0").unwrap();
        let pred = d.to_predicate(&Preferences::default(), true);
        let loc = Location::new(Prefix::legacy("x86_64-linux"), vec!["hello".into()]);

        assert!(pred.test(&PackageRecord::new(loc.clone(), "hello-2.0.0", None, None)));
        assert!(!pred.test(&PackageRecord::new(loc, "hello-2.1.0", None, None)));
    }

    #[test]
    fn stabilized_only_restricts_subtree_in_full_crawl() {
        let d = doc_json(r#"{"name": "hello", "stability": "stable"}"#).unwrap();
        let legacy = PackageRecord::new(
            Location::new(Prefix::legacy("x86_64-linux"), vec!["hello".into()]),
            "hello-2.12",
            None,
            None,
        );
        assert!(!d.to_predicate(&Preferences::default(), true).test(&legacy));
        assert!(d.to_predicate(&Preferences::default(), false).test(&legacy));
    }

    #[test]
    fn enabled_prefixes_follow_flags_and_priority() {
        let platforms = vec![Platform::from("x86_64-linux"), Platform::from("aarch64-linux")];
        let prefs = Preferences::default();

        let all = Descriptor::by_name("hello").enabled_prefixes(&prefs, "nixpkgs", &platforms);
        // 3 stabilities + direct + legacy, each per platform
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], Prefix::stabilized("x86_64-linux", "stable"));
        assert_eq!(all[6], Prefix::direct("x86_64-linux"));
        assert_eq!(all[9], Prefix::legacy("aarch64-linux"));

        let d = doc_json(r#"{"name": "hello", "stability": "staging"}"#).unwrap();
        let only = d.enabled_prefixes(&prefs, "nixpkgs", &platforms);
        assert_eq!(
            only,
            vec![
                Prefix::stabilized("x86_64-linux", "staging"),
                Prefix::stabilized("aarch64-linux", "staging"),
            ]
        );
    }
}
