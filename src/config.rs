use std::env;

use anyhow::{Context, Result};

pub const PROVIDER_HOST: &str = "footapi7.p.rapidapi.com";

/// RapidAPI headers for every provider call. The key comes from the
/// environment; binaries load `.env` / `.env.local` first.
pub fn provider_headers() -> Result<Vec<(String, String)>> {
    let key = env::var("RAPIDAPI_KEY").context("RAPIDAPI_KEY is not set")?;
    Ok(vec![
        ("X-RapidAPI-Key".to_string(), key),
        ("X-RapidAPI-Host".to_string(), PROVIDER_HOST.to_string()),
    ])
}

/// Concurrent statistics fetches per player. Small on purpose: the ceiling
/// protects the provider's rate limit, not local resources.
pub fn player_fetch_parallelism() -> usize {
    env::var("PLAYER_FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(3)
        .clamp(1, 8)
}

/// Concurrent players resolved per team at the outer level.
pub fn team_fetch_parallelism() -> usize {
    env::var("TEAM_FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(1, 16)
}
