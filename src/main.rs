use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use rekordbox_dedup::config::Config;
use rekordbox_dedup::logger;
use rekordbox_dedup::pipeline::{deduplicate_library, DedupOptions, Phase, RunOutcome};
use rekordbox_dedup::progress::{create_spinner, set_log_only};
use rekordbox_dedup::prompt::{AutoConfirm, Confirm, StdinPrompt};
use rekordbox_dedup::store::RekordboxStore;

#[derive(Parser)]
#[command(name = "rekordbox-dedup")]
#[command(about = "Find duplicate tracks in a Rekordbox library, repoint playlists and remove the extras")]
struct Args {
    /// Path to master.db (default: config, REKORDBOX_DB_PATH, then the Rekordbox install).
    /// Rekordbox 6/7 databases are encrypted: build with `--features sqlcipher` to open them
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Folder receiving the duplicate audio files (overrides move_files_folder)
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Export song, playlist and resolution data as JSON
    #[arg(long)]
    dump: bool,

    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(long, short)]
    yes: bool,

    /// Report what would happen without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Disable progress bars, log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    #[arg(long, short)]
    verbose: bool,

    /// Path substring marking device-imported tracks
    #[arg(long)]
    import_marker: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    logger::init(args.verbose).context("Failed to install logger")?;

    let start = Instant::now();
    let config = Config::load(&args.config)?;
    let db_path = config
        .resolve_db_path(args.db.as_deref())
        .context("No Rekordbox database found; pass --db or set REKORDBOX_DB_PATH")?;

    let options = DedupOptions {
        backup_dir: config.resolve_backup_dir(args.backup_dir.as_deref()),
        db_path: Some(db_path.clone()),
        import_marker: config.resolve_import_marker(args.import_marker.as_deref()),
        dump_dir: config.resolve_dump_dir(args.dump_dir.as_deref()),
        verbose_dump: args.dump,
        dry_run: args.dry_run,
    };

    let spinner = create_spinner("Opening database");
    let mut store = RekordboxStore::open(&db_path)?;
    spinner.finish_and_clear();

    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinPrompt)
    };
    let summary = deduplicate_library(&mut store, confirm.as_mut(), &options)?;

    let status = match summary.outcome {
        RunOutcome::NoDuplicates => "No duplicates found",
        RunOutcome::DryRun => "Dry run complete",
        RunOutcome::Cancelled(Phase::ReplaceInPlaylists) => "Cancelled, library unchanged",
        RunOutcome::Cancelled(Phase::RelocateAndDelete) => "Cancelled after updating playlists",
        RunOutcome::Completed => "Deduplication complete!",
    };

    println!("\n{:=<60}", "");
    println!("{}", status);
    println!("  Tracks: {}", summary.stats.total_tracks);
    println!("  Duplicate groups: {}", summary.stats.total_groups);
    println!("  Scheduled for removal: {}", summary.removals.duplicate_count());
    if let Some(report) = &summary.repointed {
        println!("  Playlist rows updated: {}", report.rows_affected);
    }
    if let Some(report) = &summary.relocation {
        println!("  Files moved: {} ({} failed)", report.moved.len(), report.failed.len());
    }
    if let Some(report) = &summary.deleted {
        println!("  Tracks deleted: {} ({} failed)", report.rows_affected, report.failed.len());
    }
    println!("  Elapsed: {:.2}s", start.elapsed().as_secs_f64());
    println!("{:=<60}", "");

    Ok(())
}
