//! Resolution engine
//!
//! Turns a [`Descriptor`] into matches in one or more catalogs. A
//! descriptor that names a location is looked up directly; anything else
//! is answered by a guided crawl of every prefix the descriptor enables,
//! recording each package it meets in the [`CrawlCache`] so the next
//! resolution against the same snapshot reads rows instead of evaluating.
//!
//! Backend trouble never aborts a resolution. Catalogs that cannot be
//! locked, nodes that fail to evaluate, and cache failures are logged and
//! skipped. The one exception is an absolute path without a wildcard:
//! the caller asked for that exact node, so its evaluation error is
//! returned.

use std::cell::OnceCell;
use std::collections::{BTreeMap, VecDeque};

use pkgq_schema::{
    CrawlProgress, GlobPath, Location, PackageRecord, Platform, Prefix, Subtree,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cache::CrawlCache;
use crate::descriptor::Descriptor;
use crate::error::ResolveError;
use crate::eval::{CatalogRef, EvalError, Evaluator, LockedCatalog, NodeHandle};
use crate::merge::merge_by_glob_path;
use crate::predicate::Predicate;
use crate::preferences::Preferences;
use crate::settings::ResolverSettings;

/// One package found in one catalog, possibly on several platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    /// Snapshot the package was found in.
    pub catalog: LockedCatalog,
    /// Where the package lives. After merging, the platform is the wildcard.
    pub path: GlobPath,
    /// Package metadata per platform.
    pub info: BTreeMap<Platform, PackageRecord>,
}

impl ResolvedMatch {
    /// A single-platform match for one record.
    pub fn from_record(catalog: &LockedCatalog, record: PackageRecord) -> Self {
        let path = record.location.glob_path();
        let platform = record.location.prefix.platform().clone();
        Self {
            catalog: catalog.clone(),
            path,
            info: BTreeMap::from([(platform, record)]),
        }
    }

    /// Record for one platform.
    pub fn record(&self, platform: &Platform) -> Option<&PackageRecord> {
        self.info.get(platform)
    }

    /// Platforms this match covers.
    pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
        self.info.keys()
    }
}

/// Resolves descriptors against catalogs served by an [`Evaluator`].
pub struct Resolver<'a, E: Evaluator> {
    evaluator: &'a E,
    prefs: &'a Preferences,
    settings: &'a ResolverSettings,
}

impl<'a, E: Evaluator> Resolver<'a, E> {
    /// Create a resolver.
    pub fn new(evaluator: &'a E, prefs: &'a Preferences, settings: &'a ResolverSettings) -> Self {
        Self {
            evaluator,
            prefs,
            settings,
        }
    }

    /// Resolve in every catalog, ranked by the preference comparator.
    ///
    /// Per-platform matches are merged when `merge_platforms` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Evaluation`] if an explicitly addressed
    /// absolute path fails to evaluate.
    pub fn resolve(
        &self,
        catalogs: &[CatalogRef],
        descriptor: &Descriptor,
    ) -> Result<Vec<ResolvedMatch>, ResolveError> {
        let mut matches = Vec::new();
        for catalog in self.prefs.rank_catalogs(catalogs) {
            matches.extend(self.resolve_in_catalog(catalog, descriptor)?);
        }
        if self.settings.merge_platforms {
            matches = merge_by_glob_path(matches);
        }
        debug!("Resolved {} matches", matches.len());
        Ok(matches)
    }

    /// The best match across all catalogs.
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::resolve`].
    pub fn resolve_one(
        &self,
        catalogs: &[CatalogRef],
        descriptor: &Descriptor,
    ) -> Result<Option<ResolvedMatch>, ResolveError> {
        Ok(self.resolve(catalogs, descriptor)?.into_iter().next())
    }

    /// Resolve in a single catalog, without merging.
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::resolve`].
    pub fn resolve_in_catalog(
        &self,
        catalog: &CatalogRef,
        descriptor: &Descriptor,
    ) -> Result<Vec<ResolvedMatch>, ResolveError> {
        if descriptor.catalog().is_some_and(|id| id != catalog.id) {
            trace!("Skipping catalog {} (descriptor names another)", catalog.id);
            return Ok(Vec::new());
        }

        let locked = match self.evaluator.lock(catalog) {
            Ok(locked) => locked,
            Err(e) => {
                warn!("Skipping catalog {}: {e}", catalog.id);
                return Ok(Vec::new());
            }
        };
        debug!("Resolving in {} ({})", locked.id, locked.locked_ref);

        let run = CatalogRun {
            evaluator: self.evaluator,
            settings: self.settings,
            cache: CrawlCache::open(&self.settings.cache_dir, &locked.fingerprint),
            locked: &locked,
            root: OnceCell::new(),
        };

        let records = if let Some(path) = descriptor.abs_path() {
            let predicate = descriptor.to_predicate(self.prefs, false);
            if path.has_wildcard() {
                let mut found = Vec::new();
                for platform in &self.settings.platforms {
                    found.extend(run.lookup_path(&path.with_platform(platform), &predicate, false)?);
                }
                found
            } else {
                run.lookup_path(path, &predicate, true)?.into_iter().collect()
            }
        } else if let Some(rel_path) = descriptor.rel_path() {
            let predicate = descriptor.to_predicate(self.prefs, false);
            let mut found = Vec::new();
            for prefix in self.enabled_prefixes(descriptor, &locked) {
                let location = Location::new(prefix, rel_path.to_vec());
                found.extend(run.lookup(&location, &predicate, false)?);
            }
            found
        } else {
            let predicate = descriptor.to_predicate(self.prefs, true);
            let mut found = Vec::new();
            for prefix in self.enabled_prefixes(descriptor, &locked) {
                found.extend(run.crawl(&prefix, &predicate));
            }
            found
        };

        debug!("{} matches in {}", records.len(), locked.id);
        Ok(records
            .into_iter()
            .map(|r| ResolvedMatch::from_record(&locked, r))
            .collect())
    }

    fn enabled_prefixes(&self, descriptor: &Descriptor, locked: &LockedCatalog) -> Vec<Prefix> {
        descriptor.enabled_prefixes(self.prefs, &locked.id, &self.settings.platforms)
    }
}

/// State for resolving in one locked catalog.
struct CatalogRun<'r, E: Evaluator> {
    evaluator: &'r E,
    settings: &'r ResolverSettings,
    locked: &'r LockedCatalog,
    cache: CrawlCache,
    root: OnceCell<Option<E::Node>>,
}

impl<E: Evaluator> CatalogRun<'_, E> {
    /// The catalog root, opened on first use.
    fn root(&self) -> Option<&E::Node> {
        self.root
            .get_or_init(|| {
                match self
                    .evaluator
                    .open_root(&self.locked.fingerprint, &self.settings.eval)
                {
                    Ok(root) => Some(root),
                    Err(e) => {
                        warn!("Cannot open catalog {}: {e}", self.locked.id);
                        None
                    }
                }
            })
            .as_ref()
    }

    fn lookup_path(
        &self,
        path: &GlobPath,
        predicate: &Predicate,
        strict: bool,
    ) -> Result<Option<PackageRecord>, ResolveError> {
        let Some(segments) = path.concrete_segments() else {
            return Ok(None);
        };
        match Prefix::split_path(&segments) {
            Ok((prefix, rel_path)) if !rel_path.is_empty() => {
                self.lookup(&Location::new(prefix, rel_path), predicate, strict)
            }
            Ok(_) => Ok(None),
            Err(e) => {
                debug!("Not a package path {path}: {e}");
                Ok(None)
            }
        }
    }

    /// Open one package node directly. Never advances crawl progress.
    fn lookup(
        &self,
        location: &Location,
        predicate: &Predicate,
        strict: bool,
    ) -> Result<Option<PackageRecord>, ResolveError> {
        if !self.settings.force_recrawl && self.cache.get_progress(&location.prefix).is_complete() {
            if let Some(record) = self.cache.get_package(location) {
                trace!("{location}: cached");
                return Ok(predicate.test(&record).then_some(record));
            }
        }

        let Some(root) = self.root() else {
            return Ok(None);
        };
        let evaluated = root
            .descend(&location.segments())
            .and_then(|node| {
                if node.is_package() {
                    extract_record(&node, location.clone()).map(Some)
                } else {
                    Ok(None)
                }
            });

        match evaluated {
            Ok(record) => Ok(record.filter(|r| predicate.test(r))),
            Err(e) if e.is_not_found() => {
                trace!("{location}: not found");
                Ok(None)
            }
            Err(e) if strict => Err(ResolveError::Evaluation {
                path: location.to_string(),
                source: e,
            }),
            Err(e) => {
                debug!("Skipping {location}: {e}");
                Ok(None)
            }
        }
    }

    /// All packages under `prefix` that pass `predicate`.
    ///
    /// A completed prefix is read back from the cache. Otherwise the prefix
    /// is walked breadth first, recording every package seen.
    fn crawl(&self, prefix: &Prefix, predicate: &Predicate) -> Vec<PackageRecord> {
        let stored = if self.settings.force_recrawl {
            CrawlProgress::Force
        } else {
            self.cache.get_progress(prefix)
        };

        if stored.is_complete() {
            let cached: Vec<PackageRecord> = self
                .cache
                .packages_in(prefix)
                .filter(|r| predicate.test(r))
                .collect();
            if !self.cache.is_failed() {
                debug!("{prefix}: {stored}, served {} from cache", cached.len());
                return cached;
            }
        }

        self.walk(prefix, predicate)
    }

    fn walk(&self, prefix: &Prefix, predicate: &Predicate) -> Vec<PackageRecord> {
        let Some(root) = self.root() else {
            return Vec::new();
        };
        debug!("Crawling {prefix}");

        self.cache.set_progress(prefix, CrawlProgress::Partial);
        self.cache.begin_batch();

        let start = match root.descend(&prefix.segments()) {
            Ok(node) => node,
            Err(e) => {
                if e.is_not_found() {
                    trace!("{prefix}: absent");
                    self.cache.set_progress(prefix, CrawlProgress::Empty);
                } else {
                    warn!("Cannot crawl {prefix}: {e}");
                }
                self.cache.commit_batch();
                return Vec::new();
            }
        };

        let mut seen = 0usize;
        let mut matches = Vec::new();
        let mut queue = VecDeque::from([(start, Vec::<String>::new())]);

        while let Some((node, rel_path)) = queue.pop_front() {
            let names = match node.child_names() {
                Ok(names) => names,
                Err(e) => {
                    debug!("Skipping children of {prefix}.{}: {e}", rel_path.join("."));
                    continue;
                }
            };
            for name in names {
                let child = node.child(&name);
                let mut path = rel_path.clone();
                path.push(name);
                let child = match child {
                    Ok(child) => child,
                    Err(e) => {
                        debug!("Skipping {prefix}.{}: {e}", path.join("."));
                        continue;
                    }
                };

                if child.is_package() {
                    let location = Location::new(prefix.clone(), path);
                    match extract_record(&child, location) {
                        Ok(record) => {
                            seen += 1;
                            self.cache.put_package(&record);
                            if predicate.test(&record) {
                                matches.push(record);
                            }
                        }
                        Err(e) => debug!("Skipping package: {e}"),
                    }
                } else if should_recurse(prefix.subtree(), &child) {
                    queue.push_back((child, path));
                }
            }
        }

        let done = if seen == 0 {
            CrawlProgress::Empty
        } else {
            CrawlProgress::FullInfo
        };
        self.cache.set_progress(prefix, done);
        self.cache.commit_batch();
        debug!("{prefix}: {seen} packages, {} matched", matches.len());
        matches
    }
}

/// Whether to descend into a non-package node found during a crawl.
///
/// Below `packages` every attribute set is enumerated; elsewhere only sets
/// flagged `recurseForDerivations`.
fn should_recurse<N: NodeHandle>(subtree: Subtree, node: &N) -> bool {
    subtree == Subtree::Direct || matches!(node.bool_field("recurseForDerivations"), Ok(Some(true)))
}

/// Read a package node into a record.
fn extract_record<N: NodeHandle>(node: &N, location: Location) -> Result<PackageRecord, EvalError> {
    let name = node.string_field("name")?;
    let pname = optional_string(node, "pname")?;
    let version = optional_string(node, "version")?;

    let mut record = PackageRecord::new(location, name, pname, version);
    record.license = optional_string(node, "license")?;

    let outputs = node.list_field("outputs")?;
    if !outputs.is_empty() {
        record.outputs = outputs;
    }
    let to_install = node.list_field("outputsToInstall")?;
    record.outputs_to_install = if to_install.is_empty() {
        record.outputs.iter().take(1).cloned().collect()
    } else {
        to_install
    };

    record.broken = node.bool_field("broken")?;
    record.unfree = node.bool_field("unfree")?;
    Ok(record)
}

fn optional_string<N: NodeHandle>(node: &N, field: &str) -> Result<Option<String>, EvalError> {
    match node.string_field(field) {
        Ok(value) => Ok(Some(value)),
        Err(EvalError::MissingField { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorDoc;
    use crate::tree::TreeCatalog;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    fn settings(dir: &TempDir) -> ResolverSettings {
        ResolverSettings {
            cache_dir: dir.path().to_path_buf(),
            platforms: vec![Platform::from("x86_64-linux")],
            merge_platforms: false,
            ..ResolverSettings::default()
        }
    }

    fn catalog() -> (TreeCatalog, CatalogRef) {
        let mut evaluator = TreeCatalog::new();
        evaluator.insert(
            "mem:nixpkgs",
            json!({
                "legacyPackages": {
                    "x86_64-linux": {
                        "hello": { "type": "derivation", "name": "hello-2.12", "license": "GPL-3.0" },
                        "zlib": { "type": "derivation", "name": "zlib-1.3", "outputs": ["out", "dev"] },
                        "python3Packages": {
                            "recurseForDerivations": true,
                            "pip": { "type": "derivation", "pname": "pip", "version": "24.0", "name": "python3.12-pip-24.0" }
                        },
                        "hidden": {
                            "inner": { "type": "derivation", "name": "inner-1.0" }
                        },
                        "bad": { "type": "error", "message": "assertion failed" }
                    }
                }
            }),
        );
        (evaluator, CatalogRef::new("nixpkgs", "mem:nixpkgs"))
    }

    #[test]
    fn crawl_respects_recursion_flags_and_skips_errors() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let all = Descriptor::try_from(DescriptorDoc {
            search_stabilized: Some(false),
            ..DescriptorDoc::default()
        })
        .unwrap();
        let names: Vec<String> = resolver
            .resolve_in_catalog(&cat, &all)
            .unwrap()
            .into_iter()
            .flat_map(|m| m.info.into_values().map(|r| r.pname))
            .collect();
        assert_eq!(names, vec!["hello", "zlib", "pip"]);
    }

    #[test]
    fn extracted_records_carry_metadata() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let m = resolver
            .resolve_one(&[cat.clone()], &Descriptor::parse("zlib").unwrap())
            .unwrap()
            .unwrap();
        let zlib = m.record(&Platform::from("x86_64-linux")).unwrap();
        assert_eq!(zlib.version.as_deref(), Some("1.3"));
        assert_eq!(zlib.outputs, vec!["out", "dev"]);
        assert_eq!(zlib.outputs_to_install, vec!["out"]);

        let m = resolver
            .resolve_one(&[cat], &Descriptor::parse("pip").unwrap())
            .unwrap()
            .unwrap();
        let pip = m.record(&Platform::from("x86_64-linux")).unwrap();
        assert_eq!(pip.name, "python3.12-pip-24.0");
        assert_eq!(pip.version.as_deref(), Some("24.0"));
        assert_eq!(
            m.path.to_string(),
            "legacyPackages.x86_64-linux.python3Packages.pip"
        );
    }

    #[test]
    fn explicit_absolute_path_surfaces_evaluation_errors() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let bad = Descriptor::parse("legacyPackages.x86_64-linux.bad").unwrap();
        assert!(matches!(
            resolver.resolve_in_catalog(&cat, &bad),
            Err(ResolveError::Evaluation { .. })
        ));

        let wildcard = Descriptor::parse("legacyPackages.*.bad").unwrap();
        assert!(resolver.resolve_in_catalog(&cat, &wildcard).unwrap().is_empty());

        let missing = Descriptor::parse("legacyPackages.x86_64-linux.nope").unwrap();
        assert!(resolver.resolve_in_catalog(&cat, &missing).unwrap().is_empty());
    }

    #[test]
    fn relative_path_tries_each_prefix() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let d = Descriptor::parse("hidden.inner").unwrap();
        let found = resolver.resolve_in_catalog(&cat, &d).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].path.to_string(),
            "legacyPackages.x86_64-linux.hidden.inner"
        );

        let cache = CrawlCache::open(dir.path(), &found[0].catalog.fingerprint);
        assert!(cache.progress_all().is_empty());
    }

    #[test]
    fn descriptor_catalog_filters_catalogs() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let d = Descriptor::parse("other#hello").unwrap();
        assert!(resolver.resolve_in_catalog(&cat, &d).unwrap().is_empty());
        assert_eq!(evaluator.evaluations(), 0);
    }

    #[test]
    fn unknown_catalog_yields_nothing() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, _) = catalog();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let missing = CatalogRef::new("gone", "mem:gone");
        assert!(resolver
            .resolve(&[missing], &Descriptor::by_name("hello"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn storage_failure_mid_crawl_still_resolves() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let locked = evaluator.lock(&cat).unwrap();
        let resolver = Resolver::new(&evaluator, &prefs, &settings);

        let run = CatalogRun {
            evaluator: &evaluator,
            settings: &settings,
            locked: &locked,
            cache: CrawlCache::open(&settings.cache_dir, &locked.fingerprint),
            root: OnceCell::new(),
        };
        // The first record lands, the write after it fails
        let trip = Arc::new(AtomicBool::new(false));
        run.cache.interrupt_when(Arc::clone(&trip));
        let tested = Arc::new(AtomicUsize::new(0));
        let predicate = {
            let tested = Arc::clone(&tested);
            Predicate::new("name == hello, then fail", move |r| {
                if tested.fetch_add(1, Ordering::SeqCst) == 0 {
                    trip.store(true, Ordering::SeqCst);
                }
                r.pname == "hello"
            })
        };

        let prefix = Prefix::legacy("x86_64-linux");
        let found = run.crawl(&prefix, &predicate);
        assert_eq!(found.len(), 1);
        // The walk went on past the failure
        assert_eq!(tested.load(Ordering::SeqCst), 3);
        assert!(run.cache.is_failed());
        assert_eq!(run.cache.get_progress(&prefix), CrawlProgress::None);
        drop(run);

        // The batch was discarded, leaving the prefix partial and empty
        let reopened = CrawlCache::open(&settings.cache_dir, &locked.fingerprint);
        assert_eq!(reopened.get_progress(&prefix), CrawlProgress::Partial);
        let hello = Location::new(prefix.clone(), vec!["hello".to_string()]);
        assert!(reopened.get_package(&hello).is_none());
        drop(reopened);

        // The next session crawls again and succeeds
        let again = resolver
            .resolve_in_catalog(&cat, &Descriptor::by_name("hello"))
            .unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn force_recrawl_evaluates_again() {
        let dir = tempdir().unwrap();
        let mut settings = settings(&dir);
        let prefs = Preferences::default();
        let (evaluator, cat) = catalog();
        let hello = Descriptor::by_name("hello");

        Resolver::new(&evaluator, &prefs, &settings)
            .resolve_in_catalog(&cat, &hello)
            .unwrap();
        let after_first = evaluator.evaluations();

        settings.force_recrawl = true;
        let found = Resolver::new(&evaluator, &prefs, &settings)
            .resolve_in_catalog(&cat, &hello)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(evaluator.evaluations() > after_first);

        let locked = evaluator.lock(&cat).unwrap();
        let cache = CrawlCache::open(dir.path(), &locked.fingerprint);
        assert_eq!(
            cache.get_progress(&Prefix::legacy("x86_64-linux")),
            CrawlProgress::FullInfo
        );
    }
}
