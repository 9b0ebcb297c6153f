//! Folding per-platform matches into one result per path

use std::collections::HashMap;

use pkgq_schema::GlobPath;

use crate::resolver::ResolvedMatch;

/// Combine matches that differ only in platform.
///
/// Matches are grouped by catalog id and glob path with the platform
/// forced to the wildcard. Each group becomes one match whose records are
/// the union of the group's per-platform records; for a platform seen twice
/// the first record is kept. Groups appear in the order they were first
/// seen.
///
/// Merging is idempotent: merging merged output changes nothing.
pub fn merge_by_glob_path(matches: Vec<ResolvedMatch>) -> Vec<ResolvedMatch> {
    let mut merged: Vec<ResolvedMatch> = Vec::with_capacity(matches.len());
    let mut groups: HashMap<(String, GlobPath), usize> = HashMap::new();

    for m in matches {
        let key = (m.catalog.id.clone(), m.path.coerced());
        if let Some(&i) = groups.get(&key) {
            let group = &mut merged[i];
            for (platform, record) in m.info {
                group.info.entry(platform).or_insert(record);
            }
        } else {
            groups.insert(key.clone(), merged.len());
            merged.push(ResolvedMatch { path: key.1, ..m });
        }
    }

    tracing::trace!("Merged into {} results", merged.len());
    merged
}
