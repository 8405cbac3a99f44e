use std::path::PathBuf;

use anyhow::{Context, Result};

use footsync::events::TracingLogger;
use footsync::fixtures;
use footsync::player_sync::SyncEngine;
use footsync::retry::{HttpTransport, RetryingFetcher};
use footsync::store::RecordStore;
use footsync::team_sync::{self, DEFAULT_MATCHES_BACK};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let db_path = parse_db_path_arg()
        .or_else(footsync::store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let store = RecordStore::open(&db_path)?;
    let fetcher = RetryingFetcher::new(HttpTransport);
    let logger = TracingLogger;
    let engine = SyncEngine::new(&store, &fetcher, &logger);

    let events = fixtures::fetch_todays_fixtures(&fetcher)?;
    println!("Fixtures today: {}", events.len());

    let mut total_fetched = 0usize;
    let mut total_hits = 0usize;
    let mut total_errors = 0usize;
    for event in &events {
        println!(
            "{} v {} ({})",
            event.home_team, event.away_team, event.tournament
        );
        for (team_id, team_name) in [
            (event.home_team_id, event.home_team.as_str()),
            (event.away_team_id, event.away_team.as_str()),
        ] {
            match team_sync::sync_team(&engine, &fetcher, team_id, DEFAULT_MATCHES_BACK) {
                Ok(summary) => {
                    total_fetched += summary.records_fetched;
                    total_hits += summary.cache_hits;
                    total_errors += summary.errors.len();
                    println!(
                        "  {team_name}: {} players, {} fetched, {} cache hits",
                        summary.players, summary.records_fetched, summary.cache_hits
                    );
                    for err in summary.errors.iter().take(5) {
                        println!("   - {err}");
                    }
                }
                Err(err) => {
                    total_errors += 1;
                    println!("  {team_name}: sync failed: {err}");
                }
            }
        }
    }

    println!("DB: {}", db_path.display());
    println!("Fetched: {total_fetched}, cache hits: {total_hits}");
    if total_errors > 0 {
        println!("Errors: {total_errors} (stale rows retry on the next run)");
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
