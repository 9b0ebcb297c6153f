//! pkgq CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgq_cli::cmd;
use pkgq_cli::{CatalogAction, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Resolve {
            query,
            catalogs,
            platforms,
            one,
            no_merge,
            force,
            json,
        } => cmd::resolve::resolve(
            config,
            &query,
            &cmd::resolve::ResolveArgs {
                catalogs,
                platforms,
                one,
                no_merge,
                force,
                json,
            },
        ),
        Commands::Progress { id, catalogs } => {
            cmd::progress::progress(config, id.as_deref(), &catalogs)
        }
        Commands::Catalog { action } => match action {
            CatalogAction::Add { catalog } => cmd::catalog::add(config, &catalog),
            CatalogAction::Remove { id } => cmd::catalog::remove(config, &id),
        },
        Commands::Clean { dry_run } => cmd::clean::clean(config, dry_run),
    }
}
