//! Resolve command

use std::path::Path;

use anyhow::{Context, Result};
use pkgq_core::{Descriptor, Resolver};
use pkgq_schema::Platform;

use crate::ui;

/// Flags of `pkgq resolve`
#[derive(Debug, Default)]
pub struct ResolveArgs {
    pub catalogs: Vec<String>,
    pub platforms: Vec<String>,
    pub one: bool,
    pub no_merge: bool,
    pub force: bool,
    pub json: bool,
}

/// Parse a query given either as short-hand or as a JSON descriptor document.
pub fn parse_query(query: &str) -> Result<Descriptor> {
    if query.trim_start().starts_with('{') {
        serde_json::from_str(query).with_context(|| format!("Invalid descriptor document {query}"))
    } else {
        Descriptor::parse(query).with_context(|| format!("Invalid query '{query}'"))
    }
}

/// Resolve a query and print the matches
pub fn resolve(config: Option<&Path>, query: &str, args: &ResolveArgs) -> Result<()> {
    let descriptor = parse_query(query)?;
    let mut settings = super::load_settings(config)?;
    let catalogs = super::collect_catalogs(&settings, &args.catalogs)?;

    if !args.platforms.is_empty() {
        settings.resolver.platforms = args.platforms.iter().map(|p| Platform::new(p.as_str())).collect();
    }
    settings.resolver.merge_platforms &= !args.no_merge;
    settings.resolver.force_recrawl |= args.force;

    if catalogs.is_empty() {
        tracing::warn!("No catalogs configured; pass --catalog ID=PATH");
    }

    let evaluator = super::load_catalogs(&catalogs);
    let resolver = Resolver::new(&evaluator, &settings.preferences, &settings.resolver);

    let matches = if args.one {
        resolver.resolve_one(&catalogs, &descriptor)?.into_iter().collect()
    } else {
        resolver.resolve(&catalogs, &descriptor)?
    };
    tracing::debug!("{} evaluations", evaluator.evaluations());

    if args.json {
        let text = if args.one {
            serde_json::to_string_pretty(&matches.first())?
        } else {
            serde_json::to_string_pretty(&matches)?
        };
        println!("{text}");
        return Ok(());
    }

    if matches.is_empty() {
        println!();
        println!("  No packages match '{query}'.");
        return Ok(());
    }

    ui::print_match_header();
    for m in &matches {
        ui::print_match_row(m);
    }
    Ok(())
}
