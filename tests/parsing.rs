use std::fs;
use std::path::PathBuf;

use footsync::fixtures::parse_daily_fixtures;
use footsync::provider::{card_counts, parse_player_statistics};
use footsync::team_sync::{parse_finished_match_ids, parse_team_players};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_player_statistics_fixture() {
    let raw = read_fixture("player_statistics.json");
    let stats = parse_player_statistics(&raw).expect("fixture should parse");
    assert_eq!(stats.was_fouled, 2);
    assert_eq!(stats.fouls, 1);
    assert_eq!(stats.shots_off_target, 3);
    // Upstream calls shots on target "onTargetScoringAttempt".
    assert_eq!(stats.shots_on_target, 2);
    assert_eq!(stats.minutes_played, Some(78.0));
    assert_eq!(stats.rating, Some(7.4));
}

#[test]
fn sparse_statistics_default_to_zero_with_no_minutes_sample() {
    let raw = read_fixture("player_statistics_sparse.json");
    let stats = parse_player_statistics(&raw).expect("fixture should parse");
    assert_eq!(stats.fouls, 1);
    assert_eq!(stats.was_fouled, 0);
    assert_eq!(stats.shots_on_target, 0);
    assert_eq!(stats.minutes_played, None);
    assert_eq!(stats.rating, None);
}

#[test]
fn malformed_statistics_bodies_parse_to_none() {
    assert_eq!(parse_player_statistics(""), None);
    assert_eq!(parse_player_statistics("<html>502</html>"), None);
    assert_eq!(parse_player_statistics(r#"{"event": {}}"#), None);
}

#[test]
fn derives_cards_per_player_from_incidents() {
    let raw = read_fixture("match_incidents.json");
    // Two plain yellows, goal and substitution entries ignored.
    assert_eq!(card_counts(&raw, 9001), (2, false));
    // yellowRed counts as a yellow and a red.
    assert_eq!(card_counts(&raw, 9002), (1, true));
    // Straight red, no yellow.
    assert_eq!(card_counts(&raw, 9003), (0, true));
    // Uninvolved player.
    assert_eq!(card_counts(&raw, 9999), (0, false));
}

#[test]
fn parses_team_players_skipping_malformed_entries() {
    let raw = read_fixture("team_players.json");
    let players = parse_team_players(&raw);
    assert_eq!(players.len(), 3);
    assert_eq!(players[0].id, 9001);
    assert_eq!(players[0].name, "Avery Holt");
}

#[test]
fn finished_match_ids_are_newest_first_and_filtered() {
    let raw = read_fixture("previous_matches.json");
    // The feed lists oldest first; canceled and notstarted entries drop out.
    assert_eq!(parse_finished_match_ids(&raw), vec![104, 102, 101]);
}

#[test]
fn parses_daily_fixtures_fixture() {
    let raw = read_fixture("daily_fixtures.json");
    let events = parse_daily_fixtures(&raw);
    // The entry without an away team or kickoff is dropped.
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, 501);
    assert_eq!(events[0].home_team, "Rivertown FC");
    assert_eq!(events[0].away_team_id, 45);
    assert_eq!(events[1].tournament, "UEFA Champions League, Group B");
}

#[test]
fn malformed_discovery_payloads_yield_empty_lists() {
    assert!(parse_team_players("not json").is_empty());
    assert!(parse_finished_match_ids(r#"{"events": 3}"#).is_empty());
    assert!(parse_daily_fixtures("").is_empty());
}
