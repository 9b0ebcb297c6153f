//! pkgq - package query resolver
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves package queries against lazily evaluated catalogs, caching
//! crawl results per catalog snapshot.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.pkgq/
//! ├── config.toml   # Catalogs, preferences, resolver settings
//! └── cache/        # One SQLite crawl cache per catalog fingerprint
//! ```

pub mod cmd;
pub mod ui;

pub use pkgq_core::paths::*;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pkgq")]
#[command(author, version, about = "pkgq - resolve package queries against lazy catalogs")]
pub struct Cli {
    /// Settings file (defaults to ~/.pkgq/config.toml)
    #[arg(long, global = true, env = "PKGQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a package query
    Resolve {
        /// Query: [catalog#]name|attr.path[@version|@=version], or a JSON descriptor
        query: String,
        /// Extra catalog as id=path/to/catalog.json (repeatable)
        #[arg(long = "catalog", value_name = "ID=PATH")]
        catalogs: Vec<String>,
        /// Platform to search (repeatable; defaults to the settings file)
        #[arg(long = "platform", value_name = "SYSTEM")]
        platforms: Vec<String>,
        /// Only print the best match
        #[arg(long)]
        one: bool,
        /// Keep per-platform results separate
        #[arg(long)]
        no_merge: bool,
        /// Ignore stored crawl progress and evaluate again
        #[arg(long, short = 'f')]
        force: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show crawl progress per prefix
    Progress {
        /// Only show this catalog id
        id: Option<String>,
        /// Extra catalog as id=path/to/catalog.json (repeatable)
        #[arg(long = "catalog", value_name = "ID=PATH")]
        catalogs: Vec<String>,
    },
    /// Manage declared catalogs in the settings file
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Remove crawl caches
    Clean {
        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// Declare a catalog, replacing one with the same id
    Add {
        /// Catalog as id=path/to/catalog.json
        #[arg(value_name = "ID=PATH")]
        catalog: String,
    },
    /// Forget a declared catalog
    Remove {
        /// Catalog id
        id: String,
    },
}
