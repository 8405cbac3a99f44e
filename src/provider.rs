use serde_json::Value;

use crate::config::PROVIDER_HOST;

/// One player's statistical line as returned by the statistics endpoint.
/// `minutes_played` stays `None` when the provider omitted the field or sent
/// something non-numeric, so aggregation can exclude it from the denominator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerMatchStats {
    pub was_fouled: u32,
    pub fouls: u32,
    pub shots_off_target: u32,
    pub shots_on_target: u32,
    pub minutes_played: Option<f64>,
    pub rating: Option<f64>,
}

pub fn player_statistics_url(match_id: u64, player_id: u32) -> String {
    format!("https://{PROVIDER_HOST}/api/match/{match_id}/player/{player_id}/statistics")
}

pub fn match_incidents_url(match_id: u64) -> String {
    format!("https://{PROVIDER_HOST}/api/match/{match_id}/incidents")
}

pub fn team_players_url(team_id: u32) -> String {
    format!("https://{PROVIDER_HOST}/api/team/{team_id}/players")
}

pub fn team_previous_matches_url(team_id: u32) -> String {
    format!("https://{PROVIDER_HOST}/api/team/{team_id}/matches/previous/0")
}

pub fn daily_fixtures_url(day: u32, month: u32, year: i32) -> String {
    format!("https://{PROVIDER_HOST}/api/matches/top/{day}/{month}/{year}")
}

/// Parses a statistics payload. Returns `None` for malformed bodies or bodies
/// without a `statistics` object; callers treat that as an empty payload.
/// The upstream name for shots on target is `onTargetScoringAttempt`.
pub fn parse_player_statistics(raw: &str) -> Option<PlayerMatchStats> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    let value = serde_json::from_str::<Value>(trimmed).ok()?;
    let stats = value.get("statistics")?;
    if !stats.is_object() {
        return None;
    }

    Some(PlayerMatchStats {
        was_fouled: count_field(stats, "wasFouled"),
        fouls: count_field(stats, "fouls"),
        shots_off_target: count_field(stats, "shotOffTarget"),
        shots_on_target: count_field(stats, "onTargetScoringAttempt"),
        minutes_played: stats.get("minutesPlayed").and_then(Value::as_f64),
        rating: stats.get("rating").and_then(Value::as_f64),
    })
}

/// Derives (yellow card count, red card) for one player from an incidents
/// payload. A `yellowRed` incident counts as both. Malformed bodies yield
/// (0, false).
pub fn card_counts(raw: &str, player_id: u32) -> (u32, bool) {
    let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
        return (0, false);
    };
    let Some(incidents) = value.get("incidents").and_then(|v| v.as_array()) else {
        return (0, false);
    };

    let mut yellow_cards = 0u32;
    let mut red_card = false;
    for incident in incidents {
        let is_this_player = incident
            .get("player")
            .and_then(|p| p.get("id"))
            .and_then(as_u64_any)
            .is_some_and(|id| id == u64::from(player_id));
        if !is_this_player {
            continue;
        }
        match incident.get("incidentClass").and_then(|v| v.as_str()) {
            Some("yellow") => yellow_cards += 1,
            Some("yellowRed") => {
                yellow_cards += 1;
                red_card = true;
            }
            Some("red") => red_card = true,
            _ => {}
        }
    }
    (yellow_cards, red_card)
}

fn count_field(stats: &Value, key: &str) -> u32 {
    stats
        .get(key)
        .and_then(as_u64_any)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

pub(crate) fn as_u64_any(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<u64>().ok()
}

pub(crate) fn as_u32_any(v: &Value) -> Option<u32> {
    let n = as_u64_any(v)?;
    u32::try_from(n).ok()
}

#[cfg(test)]
mod tests {
    use super::{card_counts, parse_player_statistics};

    #[test]
    fn missing_statistics_object_is_empty_payload() {
        assert_eq!(parse_player_statistics("{}"), None);
        assert_eq!(parse_player_statistics("null"), None);
        assert_eq!(parse_player_statistics("not json"), None);
    }

    #[test]
    fn non_numeric_minutes_are_dropped() {
        let parsed =
            parse_player_statistics(r#"{"statistics":{"fouls":2,"minutesPlayed":"no data"}}"#)
                .expect("statistics object present");
        assert_eq!(parsed.fouls, 2);
        assert_eq!(parsed.minutes_played, None);
    }

    #[test]
    fn card_counts_ignore_malformed_bodies() {
        assert_eq!(card_counts("<html>rate limited</html>", 7), (0, false));
    }
}
