use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rayon::prelude::*;

use crate::aggregate::average_minutes;
use crate::config;
use crate::events::{ApiDiagnostics, DataSource, DbOutcome, SyncEvent, SyncLogger, body_snippet};
use crate::provider;
use crate::retry::{FetchOutcome, RetryingFetcher, Transport};
use crate::store::{RecordStore, StatRecord};

/// Ephemeral unit of work: one (player, match) pair that needs the network.
#[derive(Debug, Clone, Copy)]
struct FetchJob {
    player_id: u32,
    match_id: u64,
}

#[derive(Debug)]
struct FetchedRecord {
    record: StatRecord,
    /// Numeric minutes sample, `None` when the provider never returned one.
    minutes: Option<f64>,
    diagnostics: ApiDiagnostics,
    error: Option<String>,
}

#[derive(Debug)]
pub struct PlayerResolution {
    pub player_id: u32,
    pub records: HashMap<u64, StatRecord>,
    pub average_minutes: f64,
    pub cache_hits: usize,
    pub fetched: usize,
    pub errors: Vec<String>,
}

/// Resolves per-player match statistics: cache partition, bounded concurrent
/// fetch of the misses, aggregation, one write-back batch.
pub struct SyncEngine<'a, T: Transport> {
    store: &'a RecordStore,
    fetcher: &'a RetryingFetcher<T>,
    logger: &'a dyn SyncLogger,
    parallelism: usize,
}

impl<'a, T: Transport> SyncEngine<'a, T> {
    pub fn new(
        store: &'a RecordStore,
        fetcher: &'a RetryingFetcher<T>,
        logger: &'a dyn SyncLogger,
    ) -> Self {
        Self {
            store,
            fetcher,
            logger,
            parallelism: config::player_fetch_parallelism(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// The resulting map holds exactly one entry per requested match id:
    /// the cached record for valid hits, the fetched (or zero-valued, on
    /// failure) record for everything else. Zero-valued failure rows are
    /// stale by definition and get re-fetched on the next run.
    pub fn resolve(&self, player_id: u32, match_ids: &[u64]) -> Result<PlayerResolution> {
        let mut errors = Vec::new();
        let mut hits: Vec<StatRecord> = Vec::new();
        let mut misses: Vec<FetchJob> = Vec::new();

        // Partition sequentially so no fetch is ever dispatched for a key
        // the store already answers.
        let mut seen = HashSet::new();
        for &match_id in match_ids {
            if !seen.insert(match_id) {
                continue;
            }
            match self.store.get(match_id, player_id) {
                Ok(Some(record)) if !record.is_stale() => hits.push(record),
                Ok(_) => misses.push(FetchJob {
                    player_id,
                    match_id,
                }),
                Err(err) => {
                    errors.push(format!("store read {match_id}/{player_id}: {err}"));
                    misses.push(FetchJob {
                        player_id,
                        match_id,
                    });
                }
            }
        }

        let fetched = self.fetch_misses(&misses);
        let fetched_count = fetched.len();
        let cache_hits = hits.len();

        let mut records = HashMap::with_capacity(cache_hits + fetched_count);
        let mut minutes_samples: Vec<Option<f64>> = Vec::with_capacity(cache_hits + fetched_count);

        for record in hits {
            minutes_samples.push(Some(record.minutes_played));
            self.logger.record(SyncEvent {
                action: "resolve",
                match_id: record.match_id,
                player_id,
                stats: record.clone(),
                source: DataSource::Cache,
                db_outcome: DbOutcome::Skipped,
                api: None,
            });
            records.insert(record.match_id, record);
        }

        // Write-back happens in one batch; a failed batch is logged and the
        // in-memory results still go back to the caller.
        let batch: Vec<StatRecord> = fetched.iter().map(|f| f.record.clone()).collect();
        let db_outcome = if batch.is_empty() {
            DbOutcome::Skipped
        } else {
            match self.store.upsert_many(&batch) {
                Ok(_) => DbOutcome::Ok,
                Err(err) => {
                    errors.push(format!("upsert batch for player {player_id}: {err}"));
                    DbOutcome::Error(err.to_string())
                }
            }
        };

        for fetch in fetched {
            minutes_samples.push(fetch.minutes);
            if let Some(err) = fetch.error {
                errors.push(err);
            }
            self.logger.record(SyncEvent {
                action: "resolve",
                match_id: fetch.record.match_id,
                player_id,
                stats: fetch.record.clone(),
                source: DataSource::Api,
                db_outcome: db_outcome.clone(),
                api: Some(fetch.diagnostics),
            });
            records.insert(fetch.record.match_id, fetch.record);
        }

        Ok(PlayerResolution {
            player_id,
            records,
            average_minutes: average_minutes(minutes_samples),
            cache_hits,
            fetched: fetched_count,
            errors,
        })
    }

    fn fetch_misses(&self, misses: &[FetchJob]) -> Vec<FetchedRecord> {
        if misses.is_empty() {
            return Vec::new();
        }
        let threads = self.parallelism.min(misses.len()).max(1);
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => {
                pool.install(|| misses.par_iter().map(|job| self.fetch_one(*job)).collect())
            }
            Err(_) => misses.iter().map(|job| self.fetch_one(*job)).collect(),
        }
    }

    fn fetch_one(&self, job: FetchJob) -> FetchedRecord {
        let mut record = StatRecord::empty(job.match_id, job.player_id);
        let mut diagnostics = ApiDiagnostics::default();
        let mut minutes = None;
        let mut error = None;

        let stats_report = self
            .fetcher
            .fetch(&provider::player_statistics_url(job.match_id, job.player_id));
        diagnostics.attempts = stats_report.state.attempts;
        match &stats_report.outcome {
            FetchOutcome::Success(resp) => {
                diagnostics.statistics_status = Some(resp.status);
                match provider::parse_player_statistics(&resp.body) {
                    Some(stats) => {
                        record.was_fouled = stats.was_fouled;
                        record.fouls = stats.fouls;
                        record.shots_off_target = stats.shots_off_target;
                        record.shots_on_target = stats.shots_on_target;
                        record.minutes_played = stats.minutes_played.unwrap_or(0.0);
                        minutes = stats.minutes_played;
                        diagnostics.rating = stats.rating;
                    }
                    None => {
                        // Malformed body on a 200: empty payload, not a failure.
                        diagnostics.body_snippet = body_snippet(&resp.body);
                    }
                }
            }
            FetchOutcome::NonRetriable(resp) => {
                diagnostics.statistics_status = Some(resp.status);
                diagnostics.body_snippet = body_snippet(&resp.body);
                // 404 means the player did not feature in this match.
                if resp.status != 404 {
                    error = Some(format!(
                        "statistics {}/{}: http {}",
                        job.match_id, job.player_id, resp.status
                    ));
                }
            }
            FetchOutcome::Exhausted(resp) => {
                diagnostics.statistics_status = Some(resp.status);
                diagnostics.retry_after = resp.retry_after;
                diagnostics.body_snippet = body_snippet(&resp.body);
                error = Some(format!(
                    "statistics {}/{}: retries exhausted (http {})",
                    job.match_id, job.player_id, resp.status
                ));
            }
            FetchOutcome::TransportFailed(message) => {
                error = Some(format!(
                    "statistics {}/{}: {message}",
                    job.match_id, job.player_id
                ));
            }
        }

        let incidents_report = self
            .fetcher
            .fetch(&provider::match_incidents_url(job.match_id));
        diagnostics.attempts += incidents_report.state.attempts;
        match &incidents_report.outcome {
            FetchOutcome::Success(resp) => {
                diagnostics.incidents_status = Some(resp.status);
                let (yellow_cards, red_card) = provider::card_counts(&resp.body, job.player_id);
                record.yellow_cards = yellow_cards;
                record.red_card = red_card;
            }
            FetchOutcome::NonRetriable(resp) | FetchOutcome::Exhausted(resp) => {
                diagnostics.incidents_status = Some(resp.status);
                if error.is_none() && resp.status != 404 {
                    error = Some(format!("incidents {}: http {}", job.match_id, resp.status));
                }
            }
            FetchOutcome::TransportFailed(message) => {
                if error.is_none() {
                    error = Some(format!("incidents {}: {message}", job.match_id));
                }
            }
        }

        FetchedRecord {
            record,
            minutes,
            diagnostics,
            error,
        }
    }
}
