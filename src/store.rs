use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

const CACHE_DIR: &str = "footsync";

/// One player's statistical line for one match. (match_id, player_id) is the
/// record's identity; writes replace all other fields, never merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub match_id: u64,
    pub player_id: u32,
    pub was_fouled: u32,
    pub fouls: u32,
    pub shots_off_target: u32,
    pub shots_on_target: u32,
    pub yellow_cards: u32,
    pub red_card: bool,
    pub minutes_played: f64,
}

impl StatRecord {
    pub fn empty(match_id: u64, player_id: u32) -> Self {
        Self {
            match_id,
            player_id,
            ..Self::default()
        }
    }

    /// All-zero rows are placeholders left behind by failed fetches. They
    /// must read as cache misses or they would never be repaired.
    pub fn is_stale(&self) -> bool {
        self.minutes_played <= 0.0
            && self.was_fouled == 0
            && self.fouls == 0
            && self.shots_off_target == 0
            && self.shots_on_target == 0
            && self.yellow_cards == 0
            && !self.red_card
    }
}

/// Durable store for player match statistics. Opens a fresh connection per
/// operation; independent callers coordinate through SQLite itself (WAL +
/// busy_timeout), not through a shared handle.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.connect()?;
        init_schema(&conn)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open sqlite db {}", self.path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("apply sqlite pragmas")?;
        Ok(conn)
    }

    pub fn get(&self, match_id: u64, player_id: u32) -> Result<Option<StatRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT match_id, player_id, was_fouled, fouls, shots_off_target, shots_on_target,
                    yellow_cards, red_card, minutes_played
             FROM player_match_statistics
             WHERE match_id = ?1 AND player_id = ?2",
            params![match_id as i64, player_id as i64],
            |row| {
                Ok(StatRecord {
                    match_id: row.get::<_, u64>(0)?,
                    player_id: row.get::<_, u32>(1)?,
                    was_fouled: row.get::<_, u32>(2)?,
                    fouls: row.get::<_, u32>(3)?,
                    shots_off_target: row.get::<_, u32>(4)?,
                    shots_on_target: row.get::<_, u32>(5)?,
                    yellow_cards: row.get::<_, u32>(6)?,
                    red_card: row.get::<_, i64>(7)? != 0,
                    minutes_played: row.get::<_, f64>(8)?,
                })
            },
        )
        .optional()
        .context("query player match statistics")
    }

    /// Insert-or-replace for every record in one transaction. Calling this
    /// twice with the same input leaves the table unchanged the second time.
    pub fn upsert_many(&self, records: &[StatRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("begin upsert transaction")?;
        for record in records {
            upsert_record(&tx, record)?;
        }
        tx.commit().context("commit upsert transaction")?;
        Ok(records.len())
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("player_match_statistics.sqlite"))
}

fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS player_match_statistics (
            match_id INTEGER NOT NULL,
            player_id INTEGER NOT NULL,
            was_fouled INTEGER NOT NULL DEFAULT 0,
            fouls INTEGER NOT NULL DEFAULT 0,
            shots_off_target INTEGER NOT NULL DEFAULT 0,
            shots_on_target INTEGER NOT NULL DEFAULT 0,
            yellow_cards INTEGER NOT NULL DEFAULT 0,
            red_card INTEGER NOT NULL DEFAULT 0,
            minutes_played REAL NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (match_id, player_id)
        );
        CREATE INDEX IF NOT EXISTS idx_pms_player ON player_match_statistics(player_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn upsert_record(tx: &rusqlite::Transaction<'_>, record: &StatRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO player_match_statistics (
            match_id, player_id, was_fouled, fouls, shots_off_target,
            shots_on_target, yellow_cards, red_card, minutes_played, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(match_id, player_id) DO UPDATE SET
            was_fouled = excluded.was_fouled,
            fouls = excluded.fouls,
            shots_off_target = excluded.shots_off_target,
            shots_on_target = excluded.shots_on_target,
            yellow_cards = excluded.yellow_cards,
            red_card = excluded.red_card,
            minutes_played = excluded.minutes_played,
            updated_at = excluded.updated_at
        "#,
        params![
            record.match_id as i64,
            record.player_id as i64,
            record.was_fouled,
            record.fouls,
            record.shots_off_target,
            record.shots_on_target,
            record.yellow_cards,
            bool_to_i64(record.red_card),
            record.minutes_played,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert stat record")?;
    Ok(())
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
