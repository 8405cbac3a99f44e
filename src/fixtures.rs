use anyhow::{Result, anyhow};
use chrono::{Datelike, Local, TimeZone};
use serde_json::Value;

use crate::provider::{self, as_u32_any, as_u64_any};
use crate::retry::{FetchOutcome, RetryingFetcher, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureEvent {
    pub id: u64,
    pub tournament: String,
    pub home_team_id: u32,
    pub home_team: String,
    pub away_team_id: u32,
    pub away_team: String,
    pub start_timestamp: i64,
}

/// Today's top fixtures. The feed includes spillover from adjacent days, so
/// events are filtered to those that actually kick off on the local date.
pub fn fetch_todays_fixtures<T: Transport>(
    fetcher: &RetryingFetcher<T>,
) -> Result<Vec<FixtureEvent>> {
    let now = Local::now();
    let url = provider::daily_fixtures_url(now.day(), now.month(), now.year());
    let report = fetcher.fetch(&url);
    let body = match report.outcome {
        FetchOutcome::Success(resp) => resp.body,
        FetchOutcome::NonRetriable(resp) | FetchOutcome::Exhausted(resp) => {
            return Err(anyhow!("daily fixtures fetch failed: http {}", resp.status));
        }
        FetchOutcome::TransportFailed(message) => {
            return Err(anyhow!("daily fixtures fetch failed: {message}"));
        }
    };

    let today = now.date_naive();
    Ok(parse_daily_fixtures(&body)
        .into_iter()
        .filter(|event| {
            Local
                .timestamp_opt(event.start_timestamp, 0)
                .single()
                .is_some_and(|kickoff| kickoff.date_naive() == today)
        })
        .collect())
}

/// Parses the daily fixtures payload; malformed bodies yield no events.
pub fn parse_daily_fixtures(raw: &str) -> Vec<FixtureEvent> {
    let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
        return Vec::new();
    };
    let Some(events) = value.get("events").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    events.iter().filter_map(parse_fixture_event).collect()
}

fn parse_fixture_event(v: &Value) -> Option<FixtureEvent> {
    let id = v.get("id").and_then(as_u64_any)?;
    let home = v.get("homeTeam")?;
    let away = v.get("awayTeam")?;
    Some(FixtureEvent {
        id,
        tournament: v
            .get("tournament")
            .and_then(|t| t.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
        home_team_id: home.get("id").and_then(as_u32_any)?,
        home_team: home.get("name").and_then(|n| n.as_str())?.to_string(),
        away_team_id: away.get("id").and_then(as_u32_any)?,
        away_team: away.get("name").and_then(|n| n.as_str())?.to_string(),
        start_timestamp: v.get("startTimestamp").and_then(|t| t.as_i64())?,
    })
}
