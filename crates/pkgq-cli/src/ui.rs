//! Column-aligned output for `pkgq resolve` and `pkgq progress`

use crossterm::style::{Color, Stylize};
use pkgq_core::ResolvedMatch;
use pkgq_schema::{CrawlProgress, Prefix};

const CATALOG_WIDTH: usize = 12;
const PATH_WIDTH: usize = 44;
const VERSION_WIDTH: usize = 12;
const PREFIX_WIDTH: usize = 40;

/// Print column headers for resolve results
pub fn print_match_header() {
    let header = format!(
        "  {:<cw$} {:<pw$} {:<vw$} {}",
        "catalog",
        "path",
        "version",
        "platforms",
        cw = CATALOG_WIDTH,
        pw = PATH_WIDTH,
        vw = VERSION_WIDTH,
    );
    println!("{}", header.dark_grey());
}

/// Print one resolve result
pub fn print_match_row(m: &ResolvedMatch) {
    let version = m
        .info
        .values()
        .find_map(|r| r.version.as_deref())
        .unwrap_or("-");
    let platforms = m
        .platforms()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let catalog = format!("{:<CATALOG_WIDTH$}", m.catalog.id);
    let path = format!("{:<PATH_WIDTH$}", m.path.to_string());
    let version = format!("{version:<VERSION_WIDTH$}");
    println!(
        "  {} {} {} {}",
        catalog.with(Color::DarkGrey),
        path.with(Color::Cyan),
        version.with(Color::Green),
        platforms.with(Color::DarkGrey),
    );
}

/// Print one catalog's crawl progress
pub fn print_progress(catalog_id: &str, locked_ref: &str, rows: &[(Prefix, CrawlProgress)]) {
    println!("{} {}", catalog_id.bold(), locked_ref.dark_grey());
    if rows.is_empty() {
        println!("  {}", "not crawled".dark_grey());
        return;
    }
    for (prefix, state) in rows {
        let color = match state {
            CrawlProgress::FullInfo => Color::Green,
            CrawlProgress::Empty => Color::DarkGrey,
            _ => Color::Yellow,
        };
        let prefix = format!("{:<PREFIX_WIDTH$}", prefix.to_string());
        println!("  {} {}", prefix, state.as_str().with(color));
    }
}
