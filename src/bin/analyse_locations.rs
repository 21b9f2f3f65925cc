//! Count library files per major folder location
//!
//! Usage: analyse-locations [--db master.db]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use rekordbox_dedup::config::Config;
use rekordbox_dedup::locations::count_locations;
use rekordbox_dedup::logger;
use rekordbox_dedup::progress::set_log_only;
use rekordbox_dedup::store::{LibraryStore, RekordboxStore};

#[derive(Parser)]
#[command(name = "analyse-locations")]
#[command(about = "Show how many library files live under each major folder")]
struct Args {
    /// Path to master.db (default: config, REKORDBOX_DB_PATH, then the Rekordbox install).
    /// Rekordbox 6/7 databases are encrypted: build with `--features sqlcipher` to open them
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    #[arg(long)]
    log_only: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    logger::init(args.verbose).context("Failed to install logger")?;

    let config = Config::load(&args.config)?;
    let db_path = config
        .resolve_db_path(args.db.as_deref())
        .context("No Rekordbox database found; pass --db or set REKORDBOX_DB_PATH")?;
    let store = RekordboxStore::open(&db_path)?;

    let tracks = store.fetch_all_tracks()?;
    let paths: Vec<&str> = tracks.iter().map(|t| t.folder_path.as_str()).collect();
    let counts = count_locations(&paths);

    println!("\n{:=<60}", "");
    for (location, count) in &counts {
        println!("{:>8}  {}", count, location);
    }
    println!("{:-<60}", "");
    println!("{:>8}  files in {} locations", tracks.len(), counts.len());
    println!("{:=<60}", "");
    Ok(())
}
