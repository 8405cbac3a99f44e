use anyhow::{Result, anyhow};
use rayon::prelude::*;
use serde_json::Value;

use crate::config;
use crate::player_sync::SyncEngine;
use crate::provider::{self, as_u32_any, as_u64_any};
use crate::retry::{FetchOutcome, FetchReport, RetryingFetcher, Transport};

pub const DEFAULT_MATCHES_BACK: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TeamPlayer {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct TeamSyncSummary {
    pub team_id: u32,
    pub players: usize,
    pub matches: Vec<u64>,
    pub records_resolved: usize,
    pub records_fetched: usize,
    pub cache_hits: usize,
    pub errors: Vec<String>,
}

pub fn fetch_team_players<T: Transport>(
    fetcher: &RetryingFetcher<T>,
    team_id: u32,
) -> Result<Vec<TeamPlayer>> {
    let report = fetcher.fetch(&provider::team_players_url(team_id));
    let body = success_body(report, "team players")?;
    Ok(parse_team_players(&body))
}

/// Ids of the team's most recent finished matches, newest first.
pub fn fetch_recent_finished_matches<T: Transport>(
    fetcher: &RetryingFetcher<T>,
    team_id: u32,
    limit: usize,
) -> Result<Vec<u64>> {
    let report = fetcher.fetch(&provider::team_previous_matches_url(team_id));
    let body = success_body(report, "previous matches")?;
    Ok(parse_finished_match_ids(&body)
        .into_iter()
        .take(limit)
        .collect())
}

/// Resolves every squad player against the team's recent finished matches.
/// Players run on an outer bounded pool; each resolution applies its own
/// per-player fetch ceiling underneath.
pub fn sync_team<T: Transport>(
    engine: &SyncEngine<'_, T>,
    fetcher: &RetryingFetcher<T>,
    team_id: u32,
    matches_back: usize,
) -> Result<TeamSyncSummary> {
    let players = fetch_team_players(fetcher, team_id)?;
    let matches = fetch_recent_finished_matches(fetcher, team_id, matches_back)?;

    let mut summary = TeamSyncSummary {
        team_id,
        players: players.len(),
        matches: matches.clone(),
        ..TeamSyncSummary::default()
    };
    if players.is_empty() || matches.is_empty() {
        return Ok(summary);
    }

    let threads = config::team_fetch_parallelism().min(players.len()).max(1);
    let resolutions: Vec<_> = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| {
            players
                .par_iter()
                .map(|player| (player, engine.resolve(player.id, &matches)))
                .collect()
        }),
        Err(_) => players
            .iter()
            .map(|player| (player, engine.resolve(player.id, &matches)))
            .collect(),
    };

    for (player, result) in resolutions {
        match result {
            Ok(resolution) => {
                summary.records_resolved += resolution.records.len();
                summary.records_fetched += resolution.fetched;
                summary.cache_hits += resolution.cache_hits;
                summary.errors.extend(resolution.errors);
            }
            Err(err) => summary
                .errors
                .push(format!("player {} ({}): {err}", player.id, player.name)),
        }
    }
    Ok(summary)
}

/// Parses the team players payload (`{"players": [{"player": {...}}]}`).
pub fn parse_team_players(raw: &str) -> Vec<TeamPlayer> {
    let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
        return Vec::new();
    };
    let Some(players) = value.get("players").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    players
        .iter()
        .filter_map(|entry| {
            let player = entry.get("player")?;
            Some(TeamPlayer {
                id: player.get("id").and_then(as_u32_any)?,
                name: player
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Finished match ids from a previous-matches payload, newest first.
pub fn parse_finished_match_ids(raw: &str) -> Vec<u64> {
    let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
        return Vec::new();
    };
    let Some(events) = value.get("events").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    events
        .iter()
        .rev()
        .filter(|event| {
            event
                .get("status")
                .and_then(|s| s.get("type"))
                .and_then(|t| t.as_str())
                == Some("finished")
        })
        .filter_map(|event| event.get("id").and_then(as_u64_any))
        .collect()
}

fn success_body(report: FetchReport, what: &str) -> Result<String> {
    match report.outcome {
        FetchOutcome::Success(resp) => Ok(resp.body),
        FetchOutcome::NonRetriable(resp) | FetchOutcome::Exhausted(resp) => {
            Err(anyhow!("{what}: http {}", resp.status))
        }
        FetchOutcome::TransportFailed(message) => Err(anyhow!("{what}: {message}")),
    }
}
