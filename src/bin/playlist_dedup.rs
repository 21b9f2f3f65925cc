//! Remove repeated tracks from one manually managed playlist
//!
//! Usage: playlist-dedup [--db master.db] [--playlist <id or name>] [--yes]

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use rekordbox_dedup::config::Config;
use rekordbox_dedup::logger;
use rekordbox_dedup::models::Playlist;
use rekordbox_dedup::pipeline::deduplicate_playlist;
use rekordbox_dedup::progress::set_log_only;
use rekordbox_dedup::prompt::{AutoConfirm, Confirm, StdinPrompt};
use rekordbox_dedup::store::{LibraryStore, RekordboxStore};

#[derive(Parser)]
#[command(name = "playlist-dedup")]
#[command(about = "Remove repeated tracks from a Rekordbox playlist")]
struct Args {
    /// Path to master.db (default: config, REKORDBOX_DB_PATH, then the Rekordbox install).
    /// Rekordbox 6/7 databases are encrypted: build with `--features sqlcipher` to open them
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Playlist id or exact name; prompts with a numbered list when omitted
    #[arg(long)]
    playlist: Option<String>,

    #[arg(long, short)]
    yes: bool,

    #[arg(long)]
    log_only: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn find_playlist(playlists: Vec<Playlist>, wanted: &str) -> Result<Playlist> {
    let mut matches: Vec<Playlist> = playlists
        .into_iter()
        .filter(|p| p.id == wanted || p.name == wanted)
        .collect();
    match matches.len() {
        0 => bail!("No manual playlist with id or name '{}'", wanted),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}' matches {} playlists, pass the id instead", wanted, n),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    logger::init(args.verbose).context("Failed to install logger")?;

    let config = Config::load(&args.config)?;
    let db_path = config
        .resolve_db_path(args.db.as_deref())
        .context("No Rekordbox database found; pass --db or set REKORDBOX_DB_PATH")?;
    let mut store = RekordboxStore::open(&db_path)?;

    let mut playlists = store.fetch_non_smart_playlists()?;
    if playlists.is_empty() {
        info!("No manual playlists in this library");
        return Ok(());
    }

    let mut prompt = StdinPrompt;
    let playlist = match &args.playlist {
        Some(wanted) => find_playlist(playlists, wanted)?,
        None => {
            let labels: Vec<String> = playlists.iter().map(|p| p.name.clone()).collect();
            match prompt.choose(&labels)? {
                Some(choice) => playlists.swap_remove(choice),
                None => {
                    info!("No playlist chosen");
                    return Ok(());
                }
            }
        }
    };

    let mut auto = AutoConfirm;
    let confirm: &mut dyn Confirm = if args.yes { &mut auto } else { &mut prompt };
    let summary = deduplicate_playlist(&mut store, confirm, &playlist)?;

    println!(
        "{}: {} entries, {} repeated, {} removed",
        playlist.name,
        summary.entries,
        summary.redundant.len(),
        summary.removed_count()
    );
    Ok(())
}
