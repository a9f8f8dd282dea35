//! `cadence`: keep an inventory of the audio files under a set of library
//! roots, and report how the files on disk drifted from it.

mod error;
mod logging;

use crate::error::{ErrorKind, Result};
use cadence_config::Config;
use cadence_inventory::{Database, PreferenceRepository, PreferenceStore, Repository};
use cadence_library::scan::{ScanEvent, scan_events};
use cadence_library::{ChangeOperation, ChangeRecord, Context, apply};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Audio library indexer")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults to the platform config directory
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (unless RUST_LOG is set)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the library roots against the inventory
    Scan {
        /// Write the changes to the inventory
        #[arg(long)]
        apply: bool,
    },
    /// Library root directories
    #[command(subcommand)]
    Roots(RootsCommand),
    /// MIME types allowed into the inventory
    #[command(subcommand)]
    Mime(MimeCommand),
}

#[derive(Subcommand, Debug)]
enum RootsCommand {
    List,
    Add { path: PathBuf },
    Remove { path: PathBuf },
    /// Replace every root (no paths clears them)
    Set { paths: Vec<PathBuf> },
}

#[derive(Subcommand, Debug)]
enum MimeCommand {
    List,
    Add { mime: String },
    Remove { mime: String },
    /// Replace the allow-list (no types clears it)
    Set { mimes: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .or_raise(|| ErrorKind::Config)?;
    logging::init(config.log.filter.as_deref(), cli.verbose)?;

    let db = open_database(&config).await?;
    let preferences = PreferenceRepository::from(&db);
    preferences
        .seed(&config.library.roots, &config.library.mime_types)
        .await
        .or_raise(|| ErrorKind::Preferences)?;

    let result = match cli.command {
        Command::Scan { apply } => run_scan(&config, &db, &preferences, apply).await,
        Command::Roots(command) => run_roots(&preferences, command).await,
        Command::Mime(command) => run_mime(&preferences, command).await,
    };
    db.close().await;
    result
}

async fn open_database(config: &Config) -> Result<Database> {
    let path = config.database_path().or_raise(|| ErrorKind::Config)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Path(parent.to_path_buf()))?;
    }
    tracing::debug!(path = %path.display(), "opening inventory");
    Database::connect(&path).await.or_raise(|| ErrorKind::Database)
}

async fn run_scan(config: &Config, db: &Database, preferences: &PreferenceRepository, write: bool) -> Result<()> {
    let ctx = Context::default().with_concurrency(config.concurrency());
    let inventory = Repository::from(db);

    let mut changes: Vec<ChangeRecord> = Vec::new();
    let mut events = std::pin::pin!(scan_events(&ctx, &inventory, preferences));
    while let Some(event) = events.next().await {
        match event.or_raise(|| ErrorKind::Scan)? {
            ScanEvent::RootsResolved(count) => tracing::info!(roots = count, "walking library roots"),
            ScanEvent::DiscoveryComplete(count) => tracing::info!(files = count, "fingerprinting"),
            ScanEvent::Fingerprinted(path) => tracing::trace!(path = %path.display(), "fingerprinted"),
            ScanEvent::Classified(classified) => changes = classified,
            ScanEvent::Started | ScanEvent::Complete => {},
        }
    }

    let mut totals: BTreeMap<ChangeOperation, usize> = BTreeMap::new();
    for change in &changes {
        *totals.entry(change.operation()).or_default() += 1;
        if change.operation() != ChangeOperation::None {
            println!("{change}");
        }
    }
    let totals: Vec<String> = totals.iter().map(|(operation, count)| format!("{count} {operation}")).collect();
    println!("{} files: {}", changes.len(), if totals.is_empty() { "no changes".to_string() } else { totals.join(", ") });

    if write {
        let summary = apply(&inventory, &changes).await.or_raise(|| ErrorKind::Scan)?;
        println!("applied: {summary}");
    }
    Ok(())
}

async fn run_roots(preferences: &PreferenceRepository, command: RootsCommand) -> Result<()> {
    let roots = match command {
        RootsCommand::List => preferences.library_roots().await,
        RootsCommand::Add { path } => preferences.add_library_root(&absolute(&path)?).await,
        RootsCommand::Remove { path } => preferences.remove_library_root(&absolute(&path)?).await,
        RootsCommand::Set { paths } => {
            let paths = paths.iter().map(|path| absolute(path)).collect::<Result<Vec<_>>>()?;
            preferences.set_library_roots(&paths).await
        },
    }
    .or_raise(|| ErrorKind::Preferences)?;
    for root in roots {
        println!("{}", root.display());
    }
    Ok(())
}

async fn run_mime(preferences: &PreferenceRepository, command: MimeCommand) -> Result<()> {
    let mimes = match command {
        MimeCommand::List => preferences.mime_types().await,
        MimeCommand::Add { mime } => preferences.add_mime_type(&mime).await,
        MimeCommand::Remove { mime } => preferences.remove_mime_type(&mime).await,
        MimeCommand::Set { mimes } => preferences.set_mime_types(&mimes).await,
    }
    .or_raise(|| ErrorKind::Preferences)?;
    for mime in mimes {
        println!("{mime}");
    }
    Ok(())
}

/// Roots are stored as absolute paths; relative ones are resolved against the
/// working directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).or_raise(|| ErrorKind::Path(path.to_path_buf()))
}
