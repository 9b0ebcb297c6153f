//! SQLite crawl cache
//!
//! One database per catalog fingerprint records how far each prefix has
//! been crawled and the metadata of every package seen along the way.
//!
//! The cache never fails a resolution. The first storage error disables it
//! for the rest of the session: the open batch is rolled back, a warning is
//! logged, and every later call returns absent or empty.

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pkgq_schema::{
    CrawlProgress, Fingerprint, Location, PackageRecord, Platform, Prefix, Stability, Subtree,
};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths::cache_file;

/// Bumped whenever the table layout changes; older databases are reset.
const SCHEMA_VERSION: &str = "1";

/// Rows fetched per page by [`PackageIter`].
const PAGE_SIZE: i64 = 256;

/// Storage-layer failures. Never leaves this module.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cached value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt cache row: {0}")]
    Corrupt(String),
}

/// Crawl state and package metadata for one catalog snapshot.
pub struct CrawlCache {
    conn: Option<Connection>,
    path: PathBuf,
    failed: Cell<bool>,
    in_batch: Cell<bool>,
}

impl std::fmt::Debug for CrawlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlCache")
            .field("path", &self.path)
            .field("failed", &self.failed.get())
            .field("in_batch", &self.in_batch.get())
            .finish_non_exhaustive()
    }
}

impl CrawlCache {
    /// Open or create the cache for `fingerprint` under `cache_root`.
    ///
    /// A database that cannot be opened yields a disabled cache.
    pub fn open(cache_root: &Path, fingerprint: &Fingerprint) -> Self {
        Self::open_at(&cache_file(cache_root, fingerprint))
    }

    /// Open the cache database at a specific path
    pub fn open_at(path: &Path) -> Self {
        match Self::try_open(path) {
            Ok(conn) => {
                debug!("Opened crawl cache {}", path.display());
                Self {
                    conn: Some(conn),
                    path: path.to_path_buf(),
                    failed: Cell::new(false),
                    in_batch: Cell::new(false),
                }
            }
            Err(e) => {
                warn!("Crawl cache {} unavailable: {e}", path.display());
                Self::disabled(path)
            }
        }
    }

    /// A cache that stores nothing and answers every query with absent.
    pub fn disabled(path: &Path) -> Self {
        Self {
            conn: None,
            path: path.to_path_buf(),
            failed: Cell::new(true),
            in_batch: Cell::new(false),
        }
    }

    fn try_open(path: &Path) -> Result<Connection, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // Concurrent crawls of the same snapshot wait on each other
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(conn)
    }

    /// Path of the backing database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the cache has been disabled by a storage failure.
    pub fn is_failed(&self) -> bool {
        self.failed.get()
    }

    /// Run `f` against the connection unless the cache is disabled.
    /// A failure disables the cache and yields `None`.
    fn with_conn<T>(
        &self,
        op: &str,
        f: impl FnOnce(&Connection) -> Result<T, CacheError>,
    ) -> Option<T> {
        if self.failed.get() {
            return None;
        }
        let conn = self.conn.as_ref()?;
        match f(conn) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    "Crawl cache {} failed during {op}, disabling: {e}",
                    self.path.display()
                );
                self.failed.set(true);
                if self.in_batch.replace(false) {
                    conn.execute_batch("ROLLBACK;").ok();
                }
                None
            }
        }
    }

    /// Stored progress for a prefix; `None` if never crawled.
    pub fn get_progress(&self, prefix: &Prefix) -> CrawlProgress {
        self.with_conn("get_progress", |conn| try_get_progress(conn, prefix))
            .unwrap_or_default()
    }

    /// Advance the progress of a prefix and return the previous value.
    ///
    /// Progress never moves backwards: a state at or below the stored one is
    /// ignored. [`CrawlProgress::Force`] is never written.
    pub fn set_progress(&self, prefix: &Prefix, state: CrawlProgress) -> CrawlProgress {
        self.with_conn("set_progress", |conn| {
            let previous = try_get_progress(conn, prefix)?;
            if !state.is_persistable() {
                return Ok(previous);
            }
            if let Some(code) = state.code().filter(|_| state > previous) {
                let (subtree, platform, stability) = key(prefix);
                conn.execute(
                    "INSERT OR REPLACE INTO progress (subtree, platform, stability, state)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![subtree, platform, stability, code],
                )?;
                debug!("{prefix}: {previous} -> {state}");
            }
            Ok(previous)
        })
        .unwrap_or_default()
    }

    /// Every prefix with stored progress, in key order.
    pub fn progress_all(&self) -> Vec<(Prefix, CrawlProgress)> {
        self.with_conn("progress_all", |conn| {
            let mut stmt = conn.prepare(
                "SELECT subtree, platform, stability, state FROM progress
                 ORDER BY subtree, platform, stability",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (subtree, platform, stability, code) = row?;
                let prefix = decode_prefix(&subtree, &platform, &stability)?;
                let state = CrawlProgress::from_code(code)
                    .ok_or_else(|| CacheError::Corrupt(format!("progress code {code}")))?;
                out.push((prefix, state));
            }
            Ok(out)
        })
        .unwrap_or_default()
    }

    /// Record (or replace) the metadata of one package.
    pub fn put_package(&self, record: &PackageRecord) {
        self.with_conn("put_package", |conn| {
            let (subtree, platform, stability) = key(&record.location.prefix);
            conn.execute(
                "INSERT OR REPLACE INTO packages
                 (subtree, platform, stability, rel_path, name, pname, version, semver,
                  license, outputs, outputs_to_install, broken, unfree)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    subtree,
                    platform,
                    stability,
                    serde_json::to_string(&record.location.rel_path)?,
                    record.name,
                    record.pname,
                    record.version,
                    record.semver.as_ref().map(ToString::to_string),
                    record.license,
                    serde_json::to_string(&record.outputs)?,
                    serde_json::to_string(&record.outputs_to_install)?,
                    record.broken,
                    record.unfree,
                ],
            )?;
            Ok(())
        });
    }

    /// Cached metadata for the package at `location`.
    pub fn get_package(&self, location: &Location) -> Option<PackageRecord> {
        self.with_conn("get_package", |conn| {
            let (subtree, platform, stability) = key(&location.prefix);
            let rel_path = serde_json::to_string(&location.rel_path)?;
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {ROW_COLUMNS} FROM packages
                         WHERE subtree = ?1 AND platform = ?2 AND stability = ?3 AND rel_path = ?4"
                    ),
                    params![subtree, platform, stability, rel_path],
                    CachedRow::from_row,
                )
                .optional()?;
            row.map(|r| r.into_record(&location.prefix)).transpose()
        })
        .flatten()
    }

    /// All cached packages under a prefix, in the order they were recorded.
    ///
    /// Rows are fetched lazily in pages. Each call starts a fresh pass over
    /// the stored rows.
    pub fn packages_in(&self, prefix: &Prefix) -> PackageIter<'_> {
        PackageIter {
            cache: self,
            prefix: prefix.clone(),
            last_rowid: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fetch_page(&self, prefix: &Prefix, after: i64) -> Option<Vec<(i64, PackageRecord)>> {
        self.with_conn("packages_in", |conn| {
            let (subtree, platform, stability) = key(prefix);
            let mut stmt = conn.prepare(&format!(
                "SELECT rowid, {ROW_COLUMNS} FROM packages
                 WHERE subtree = ?1 AND platform = ?2 AND stability = ?3 AND rowid > ?4
                 ORDER BY rowid LIMIT ?5"
            ))?;
            let rows = stmt.query_map(
                params![subtree, platform, stability, after, PAGE_SIZE],
                |row| Ok((row.get::<_, i64>(0)?, CachedRow::from_row_at(row, 1)?)),
            )?;
            let mut page = Vec::new();
            for row in rows {
                let (rowid, cached) = row?;
                page.push((rowid, cached.into_record(prefix)?));
            }
            Ok(page)
        })
    }

    /// Open a write batch; later writes land in one transaction.
    pub fn begin_batch(&self) {
        if self.in_batch.get() {
            return;
        }
        if self
            .with_conn("begin_batch", |conn| Ok(conn.execute_batch("BEGIN IMMEDIATE;")?))
            .is_some()
        {
            self.in_batch.set(true);
        }
    }

    /// Commit the open write batch, if any.
    pub fn commit_batch(&self) {
        if !self.in_batch.get() {
            return;
        }
        if self
            .with_conn("commit_batch", |conn| Ok(conn.execute_batch("COMMIT;")?))
            .is_some()
        {
            self.in_batch.set(false);
        }
    }

    /// Interrupt the next statement run after `trip` is set.
    #[cfg(test)]
    pub(crate) fn interrupt_when(&self, trip: std::sync::Arc<std::sync::atomic::AtomicBool>) {
        if let Some(conn) = &self.conn {
            conn.progress_handler(
                1,
                Some(move || trip.swap(false, std::sync::atomic::Ordering::SeqCst)),
            );
        }
    }

    /// Make every later statement fail, to exercise the degrade path.
    #[cfg(test)]
    pub(crate) fn break_storage(&self) {
        if let Some(conn) = &self.conn {
            conn.execute_batch("DROP TABLE packages; DROP TABLE progress;")
                .ok();
        }
    }
}

impl Drop for CrawlCache {
    fn drop(&mut self) {
        if !self.in_batch.get() {
            return;
        }
        if let Some(conn) = &self.conn {
            let sql = if self.failed.get() { "ROLLBACK;" } else { "COMMIT;" };
            if let Err(e) = conn.execute_batch(sql) {
                warn!("Crawl cache {}: {sql} failed: {e}", self.path.display());
            }
        }
    }
}

/// Lazy pass over the cached packages of one prefix.
pub struct PackageIter<'a> {
    cache: &'a CrawlCache,
    prefix: Prefix,
    last_rowid: i64,
    buffer: VecDeque<PackageRecord>,
    exhausted: bool,
}

impl Iterator for PackageIter<'_> {
    type Item = PackageRecord;

    fn next(&mut self) -> Option<PackageRecord> {
        if self.buffer.is_empty() && !self.exhausted {
            let page = self
                .cache
                .fetch_page(&self.prefix, self.last_rowid)
                .unwrap_or_default();
            if (page.len() as i64) < PAGE_SIZE {
                self.exhausted = true;
            }
            if let Some((rowid, _)) = page.last() {
                self.last_rowid = *rowid;
            }
            self.buffer.extend(page.into_iter().map(|(_, r)| r));
        }
        self.buffer.pop_front()
    }
}

fn init_schema(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if version.as_deref().is_some_and(|v| v != SCHEMA_VERSION) {
        debug!("Crawl cache schema changed, resetting");
        conn.execute_batch("DROP TABLE IF EXISTS progress; DROP TABLE IF EXISTS packages;")?;
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS progress (
            subtree TEXT NOT NULL,
            platform TEXT NOT NULL,
            stability TEXT NOT NULL DEFAULT '',
            state INTEGER NOT NULL,
            PRIMARY KEY (subtree, platform, stability)
        );

        CREATE TABLE IF NOT EXISTS packages (
            subtree TEXT NOT NULL,
            platform TEXT NOT NULL,
            stability TEXT NOT NULL DEFAULT '',
            rel_path TEXT NOT NULL,
            name TEXT NOT NULL,
            pname TEXT NOT NULL,
            version TEXT,
            semver TEXT,
            license TEXT,
            outputs TEXT NOT NULL,
            outputs_to_install TEXT NOT NULL,
            broken INTEGER,
            unfree INTEGER,
            PRIMARY KEY (subtree, platform, stability, rel_path)
        );
        ",
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

fn key(prefix: &Prefix) -> (&str, &str, &str) {
    (
        prefix.subtree().as_str(),
        prefix.platform().as_str(),
        prefix.stability().map_or("", Stability::as_str),
    )
}

fn decode_prefix(subtree: &str, platform: &str, stability: &str) -> Result<Prefix, CacheError> {
    let subtree = subtree
        .parse::<Subtree>()
        .map_err(|e| CacheError::Corrupt(e.to_string()))?;
    let stability = (!stability.is_empty()).then(|| Stability::new(stability));
    Prefix::new(subtree, Platform::new(platform), stability)
        .map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn try_get_progress(conn: &Connection, prefix: &Prefix) -> Result<CrawlProgress, CacheError> {
    let (subtree, platform, stability) = key(prefix);
    let code: Option<i64> = conn
        .query_row(
            "SELECT state FROM progress WHERE subtree = ?1 AND platform = ?2 AND stability = ?3",
            params![subtree, platform, stability],
            |row| row.get(0),
        )
        .optional()?;
    match code {
        None => Ok(CrawlProgress::None),
        Some(code) => CrawlProgress::from_code(code)
            .ok_or_else(|| CacheError::Corrupt(format!("progress code {code}"))),
    }
}

const ROW_COLUMNS: &str = "rel_path, name, pname, version, semver, license, \
                           outputs, outputs_to_install, broken, unfree";

/// Raw column values of one `packages` row.
struct CachedRow {
    rel_path: String,
    name: String,
    pname: String,
    version: Option<String>,
    semver: Option<String>,
    license: Option<String>,
    outputs: String,
    outputs_to_install: String,
    broken: Option<bool>,
    unfree: Option<bool>,
}

impl CachedRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    fn from_row_at(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            rel_path: row.get(at)?,
            name: row.get(at + 1)?,
            pname: row.get(at + 2)?,
            version: row.get(at + 3)?,
            semver: row.get(at + 4)?,
            license: row.get(at + 5)?,
            outputs: row.get(at + 6)?,
            outputs_to_install: row.get(at + 7)?,
            broken: row.get(at + 8)?,
            unfree: row.get(at + 9)?,
        })
    }

    fn into_record(self, prefix: &Prefix) -> Result<PackageRecord, CacheError> {
        let semver = self
            .semver
            .map(|s| semver::Version::parse(&s))
            .transpose()
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        Ok(PackageRecord {
            location: Location::new(prefix.clone(), serde_json::from_str(&self.rel_path)?),
            name: self.name,
            pname: self.pname,
            version: self.version,
            semver,
            license: self.license,
            outputs: serde_json::from_str(&self.outputs)?,
            outputs_to_install: serde_json::from_str(&self.outputs_to_install)?,
            broken: self.broken,
            unfree: self.unfree,
        })
    }
}
