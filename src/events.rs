use std::sync::Mutex;

use serde::Serialize;

use crate::store::StatRecord;

const BODY_SNIPPET_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Api,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbOutcome {
    Ok,
    /// Nothing was written for this entry (cache hit, or empty batch).
    Skipped,
    Error(String),
}

/// Raw API context attached to events for fetched entries: enough to debug a
/// throttled or failing provider without re-running the sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiDiagnostics {
    pub statistics_status: Option<u16>,
    pub incidents_status: Option<u16>,
    pub attempts: u32,
    pub retry_after: Option<f64>,
    pub rating: Option<f64>,
    pub body_snippet: Option<String>,
}

/// One structured record per resolved (match, player) entry.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub action: &'static str,
    pub match_id: u64,
    pub player_id: u32,
    pub stats: StatRecord,
    pub source: DataSource,
    pub db_outcome: DbOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiDiagnostics>,
}

/// Injected so the orchestrator never prints; tests capture deterministically
/// with [`MemoryLogger`].
pub trait SyncLogger: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// Emits each event as one JSON line through `tracing`.
pub struct TracingLogger;

impl SyncLogger for TracingLogger {
    fn record(&self, event: SyncEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "footsync::sync", event = %json, "record synced"),
            Err(err) => {
                tracing::warn!(target: "footsync::sync", error = %err, "unserializable sync event");
            }
        }
    }
}

/// Collects events in memory for assertions.
#[derive(Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemoryLogger {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().expect("event log lock poisoned").clone()
    }
}

impl SyncLogger for MemoryLogger {
    fn record(&self, event: SyncEvent) {
        self.events
            .lock()
            .expect("event log lock poisoned")
            .push(event);
    }
}

/// Truncated body excerpt for failure diagnostics.
pub fn body_snippet(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let snippet: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
    if snippet.len() < trimmed.len() {
        return Some(format!("{snippet}..."));
    }
    Some(snippet)
}
