use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use footsync::events::TracingLogger;
use footsync::player_sync::SyncEngine;
use footsync::retry::{HttpTransport, RetryingFetcher};
use footsync::store::RecordStore;
use footsync::team_sync::{self, DEFAULT_MATCHES_BACK};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let team_id = parse_flag(&args, "--team")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| anyhow!("usage: team_sync --team <id> [--matches <n>] [--db <path>]"))?;
    let matches_back = parse_flag(&args, "--matches")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MATCHES_BACK);
    let db_path = parse_flag(&args, "--db")
        .map(PathBuf::from)
        .or_else(footsync::store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let store = RecordStore::open(&db_path)?;
    let fetcher = RetryingFetcher::new(HttpTransport);
    let logger = TracingLogger;
    let engine = SyncEngine::new(&store, &fetcher, &logger);

    let summary = team_sync::sync_team(&engine, &fetcher, team_id, matches_back)?;

    println!("Team {team_id} sync complete");
    println!("DB: {}", db_path.display());
    println!("Players: {}", summary.players);
    println!("Matches: {:?}", summary.matches);
    println!(
        "Records: {} resolved, {} fetched, {} cache hits",
        summary.records_resolved, summary.records_fetched, summary.cache_hits
    );
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }
    Ok(())
}

fn parse_flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(flag)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value.trim());
        }
        if arg == flag {
            return args.get(idx + 1).map(|v| v.trim());
        }
    }
    None
}
