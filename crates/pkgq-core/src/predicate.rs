//! Predicate algebra over package records
//!
//! A [`Predicate`] is an owned, cloneable boolean test. Constructors copy
//! their comparison constants in, so a predicate can outlive whatever it
//! was built from. Evaluation never fails: a missing optional field simply
//! makes the relevant test false.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use pkgq_schema::{GlobPath, PackageRecord, Stability, Subtree};

type TestFn = dyn Fn(&PackageRecord) -> bool + Send + Sync;

/// A composable test over [`PackageRecord`]s.
#[derive(Clone)]
pub struct Predicate {
    test: Arc<TestFn>,
    label: String,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.label).finish()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl Predicate {
    /// Wrap an arbitrary test with a description.
    pub fn new<F>(label: impl Into<String>, test: F) -> Self
    where
        F: Fn(&PackageRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(test),
            label: label.into(),
        }
    }

    /// Run the test.
    pub fn test(&self, record: &PackageRecord) -> bool {
        (self.test)(record)
    }

    /// Human-readable description, used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Accepts everything.
    pub fn always() -> Self {
        Self::new("true", |_| true)
    }

    /// Rejects everything.
    pub fn never() -> Self {
        Self::new("false", |_| false)
    }

    /// Both tests must pass; `other` only runs if `self` passed.
    pub fn and(self, other: Predicate) -> Self {
        let label = format!("({} && {})", self.label, other.label);
        Self::new(label, move |r| self.test(r) && other.test(r))
    }

    /// Either test must pass; `other` only runs if `self` failed.
    pub fn or(self, other: Predicate) -> Self {
        let label = format!("({} || {})", self.label, other.label);
        Self::new(label, move |r| self.test(r) || other.test(r))
    }

    /// Inverts the test.
    pub fn negate(self) -> Self {
        let label = format!("!{}", self.label);
        Self::new(label, move |r| !self.test(r))
    }

    /// Conjunction of every predicate; [`Predicate::always`] when empty.
    pub fn all(preds: impl IntoIterator<Item = Predicate>) -> Self {
        preds
            .into_iter()
            .reduce(Predicate::and)
            .unwrap_or_else(Self::always)
    }

    /// Matches the full name, the short name, or the final attribute name.
    pub fn has_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("name == {name:?}"), move |r| {
            r.name == name || r.pname == name || r.attr_name() == name
        })
    }

    /// Matches the full derivation name only.
    pub fn has_full_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("fullName == {name:?}"), move |r| r.name == name)
    }

    /// Matches the short name only.
    pub fn has_short_name(pname: impl Into<String>) -> Self {
        let pname = pname.into();
        Self::new(format!("pname == {pname:?}"), move |r| r.pname == pname)
    }

    /// Exact version string match; false for unversioned packages.
    pub fn has_version(version: impl Into<String>) -> Self {
        let version = version.into();
        Self::new(format!("version == {version:?}"), move |r| {
            r.version.as_deref() == Some(version.as_str())
        })
    }

    /// Semver range satisfaction; false when the package has no semver.
    ///
    /// With `include_pre_releases`, a pre-release also matches when its
    /// release version satisfies the range.
    pub fn satisfies_semver(range: semver::VersionReq, include_pre_releases: bool) -> Self {
        Self::new(format!("semver ~ {range}"), move |r| {
            let Some(v) = &r.semver else {
                return false;
            };
            if range.matches(v) {
                return true;
            }
            if include_pre_releases && !v.pre.is_empty() {
                let release = semver::Version::new(v.major, v.minor, v.patch);
                return range.matches(&release);
            }
            false
        })
    }

    /// Exact license id match; false for packages without a license.
    pub fn has_license(license: impl Into<String>) -> Self {
        let license = license.into();
        Self::new(format!("license == {license:?}"), move |r| {
            r.license.as_deref() == Some(license.as_str())
        })
    }

    /// License is one of the given ids; false for packages without a license.
    pub fn has_license_in(licenses: Vec<String>) -> Self {
        Self::new(format!("license in {licenses:?}"), move |r| {
            r.license.as_ref().is_some_and(|l| licenses.contains(l))
        })
    }

    /// Package lives under the given subtree.
    pub fn has_subtree(subtree: Subtree) -> Self {
        Self::new(format!("subtree == {subtree}"), move |r| {
            r.location.prefix.subtree() == subtree
        })
    }

    /// Package lives under the given stability tier.
    pub fn has_stability(stability: Stability) -> Self {
        Self::new(format!("stability == {stability}"), move |r| {
            r.location.prefix.stability() == Some(&stability)
        })
    }

    /// Absolute path starts with the given glob (wildcard matches any platform).
    pub fn has_abs_path_prefix(prefix: GlobPath) -> Self {
        Self::new(format!("path ^= {prefix}"), move |r| {
            prefix.is_prefix_of(&r.location.segments())
        })
    }

    /// Relative path (below the axis prefix) starts with the given segments.
    pub fn has_rel_path_prefix(prefix: Vec<String>) -> Self {
        Self::new(format!("relPath ^= {}", prefix.join(".")), move |r| {
            r.location.rel_path.starts_with(&prefix)
        })
    }

    /// Package provides every listed output.
    pub fn has_outputs(outputs: Vec<String>) -> Self {
        Self::new(format!("outputs >= {outputs:?}"), move |r| {
            outputs.iter().all(|o| r.outputs.contains(o))
        })
    }

    /// Relative path is at most `depth` segments long.
    pub fn max_depth(depth: usize) -> Self {
        Self::new(format!("depth <= {depth}"), move |r| {
            r.location.depth() <= depth
        })
    }

    /// Unfree flag equals `value`; an unset flag counts as `false`.
    pub fn is_unfree(value: bool) -> Self {
        Self::new(format!("unfree == {value}"), move |r| {
            r.unfree.unwrap_or(false) == value
        })
    }

    /// Broken flag equals `value`; an unset flag counts as `false`.
    pub fn is_broken(value: bool) -> Self {
        Self::new(format!("broken == {value}"), move |r| {
            r.broken.unwrap_or(false) == value
        })
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgq_schema::{Location, Prefix};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(attr: &str, name: &str) -> PackageRecord {
        PackageRecord::new(
            Location::new(Prefix::legacy("x86_64-linux"), vec![attr.to_string()]),
            name,
            None,
            None,
        )
    }

    fn samples() -> Vec<PackageRecord> {
        let mut unfree = record("vscode", "vscode-1.90.0");
        unfree.unfree = Some(true);
        unfree.license = Some("unfree".into());
        let mut broken = record("old", "old-0.1");
        broken.broken = Some(true);
        let mut licensed = record("hello", "hello-2.12");
        licensed.license = Some("GPL-3.0-or-later".into());
        vec![unfree, broken, licensed, record("tool", "tool"), record("rc", "rc-2.0.0-rc1")]
    }

    fn preds() -> Vec<Predicate> {
        vec![
            Predicate::has_name("hello"),
            Predicate::has_version("0.1"),
            Predicate::is_unfree(true),
            Predicate::is_broken(false),
            Predicate::has_license("GPL-3.0-or-later"),
            Predicate::satisfies_semver(semver::VersionReq::parse(">=1").unwrap(), false),
        ]
    }

    #[test]
    fn combinators_agree_with_boolean_logic() {
        for r in &samples() {
            for a in preds() {
                assert_eq!((!a.clone()).test(r), !a.test(r));
                for b in preds() {
                    assert_eq!((a.clone() & b.clone()).test(r), a.test(r) && b.test(r));
                    assert_eq!((a.clone() | b.clone()).test(r), a.test(r) || b.test(r));
                }
            }
        }
    }

    #[test]
    fn combinators_are_associative() {
        for r in &samples() {
            for a in preds() {
                for b in preds() {
                    for c in preds() {
                        let left = (a.clone() & b.clone()) & c.clone();
                        let right = a.clone() & (b.clone() & c.clone());
                        assert_eq!(left.test(r), right.test(r));
                        let left = (a.clone() | b.clone()) | c.clone();
                        let right = a.clone() | (b.clone() | c.clone());
                        assert_eq!(left.test(r), right.test(r));
                    }
                }
            }
        }
    }

    #[test]
    fn and_short_circuits_left_to_right() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counted = Predicate::new("counted", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let r = record("hello", "hello-2.12");
        assert!(!(Predicate::never() & counted.clone()).test(&r));
        assert!((Predicate::always() | counted.clone()).test(&r));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!((Predicate::always() & counted).test(&r));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_fields_evaluate_false() {
        let r = record("tool", "tool");
        assert!(!Predicate::has_version("1.0").test(&r));
        assert!(!Predicate::has_license("MIT").test(&r));
        assert!(!Predicate::has_license_in(vec!["MIT".into()]).test(&r));
        let any = semver::VersionReq::parse("*").unwrap();
        assert!(!Predicate::satisfies_semver(any, true).test(&r));
    }

    #[test]
    fn name_matches_any_name_form() {
        let r = record("gnuHello", "hello-2.12");
        assert!(Predicate::has_name("hello-2.12").test(&r));
        assert!(Predicate::has_name("hello").test(&r));
        assert!(Predicate::has_name("gnuHello").test(&r));
        assert!(!Predicate::has_full_name("hello").test(&r));
        assert!(Predicate::has_short_name("hello").test(&r));
    }

    #[test]
    fn pre_release_inclusion() {
        let r = record("rc", "rc-2.0.0-rc1");
        let req = semver::VersionReq::parse("^2.0.0").unwrap();
        assert!(!Predicate::satisfies_semver(req.clone(), false).test(&r));
        assert!(Predicate::satisfies_semver(req, true).test(&r));
    }

    #[test]
    fn path_predicates() {
        let mut r = record("pip", "pip-23.0");
        r.location.rel_path = vec!["python3Packages".into(), "pip".into()];
        let glob = GlobPath::parse("legacyPackages.*.python3Packages").unwrap();
        assert!(Predicate::has_abs_path_prefix(glob).test(&r));
        assert!(Predicate::has_rel_path_prefix(vec!["python3Packages".into()]).test(&r));
        assert!(!Predicate::has_rel_path_prefix(vec!["pip".into()]).test(&r));
        assert!(Predicate::max_depth(2).test(&r));
        assert!(!Predicate::max_depth(1).test(&r));
        assert!(Predicate::has_subtree(Subtree::Legacy).test(&r));
        assert!(!Predicate::has_stability(Stability::new("stable")).test(&r));
        assert!(Predicate::has_outputs(vec!["out".into()]).test(&r));
        assert!(!Predicate::has_outputs(vec!["dev".into()]).test(&r));
    }

    #[test]
    fn all_of_nothing_is_true() {
        let r = record("tool", "tool");
        assert!(Predicate::all(Vec::new()).test(&r));
        assert!(!Predicate::all(vec![Predicate::always(), Predicate::never()]).test(&r));
    }
}
