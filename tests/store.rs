use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use footsync::store::{RecordStore, StatRecord};

static NEXT_DB: AtomicU32 = AtomicU32::new(0);

fn temp_store() -> (RecordStore, PathBuf) {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "footsync_store_test_{}_{}.sqlite",
        std::process::id(),
        NEXT_DB.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_file(&path);
    let store = RecordStore::open(&path).expect("open temp store");
    (store, path)
}

fn sample_record(match_id: u64, player_id: u32) -> StatRecord {
    StatRecord {
        match_id,
        player_id,
        was_fouled: 2,
        fouls: 1,
        shots_off_target: 3,
        shots_on_target: 2,
        yellow_cards: 1,
        red_card: false,
        minutes_played: 78.0,
    }
}

fn row_count(path: &PathBuf) -> i64 {
    let conn = rusqlite::Connection::open(path).expect("open raw connection");
    conn.query_row("SELECT COUNT(*) FROM player_match_statistics", [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

#[test]
fn get_returns_none_for_absent_key() {
    let (store, _path) = temp_store();
    assert_eq!(store.get(1, 2).expect("lookup"), None);
}

#[test]
fn upsert_then_get_roundtrip() {
    let (store, _path) = temp_store();
    let record = sample_record(101, 7);
    store.upsert_many(std::slice::from_ref(&record)).expect("upsert");
    assert_eq!(store.get(101, 7).expect("lookup"), Some(record));
}

#[test]
fn repeated_upsert_is_idempotent() {
    let (store, path) = temp_store();
    let batch = vec![sample_record(101, 7), sample_record(102, 7)];
    store.upsert_many(&batch).expect("first upsert");
    store.upsert_many(&batch).expect("second upsert");
    assert_eq!(row_count(&path), 2);
    assert_eq!(store.get(101, 7).expect("lookup"), Some(batch[0].clone()));
}

#[test]
fn upsert_replaces_all_non_key_fields() {
    let (store, path) = temp_store();
    store
        .upsert_many(&[sample_record(101, 7)])
        .expect("initial upsert");

    let mut corrected = StatRecord::empty(101, 7);
    corrected.minutes_played = 90.0;
    corrected.red_card = true;
    store.upsert_many(&[corrected.clone()]).expect("overwrite");

    let stored = store.get(101, 7).expect("lookup").expect("row exists");
    // Full replacement, not a merge: the old counts are gone.
    assert_eq!(stored, corrected);
    assert_eq!(stored.was_fouled, 0);
    assert_eq!(row_count(&path), 1);
}

#[test]
fn stale_rows_read_back_as_stale() {
    let (store, _path) = temp_store();
    store
        .upsert_many(&[StatRecord::empty(103, 7)])
        .expect("placeholder upsert");
    let stored = store.get(103, 7).expect("lookup").expect("row exists");
    assert!(stored.is_stale());
}

#[test]
fn concurrent_upserts_from_independent_connections() {
    let (store, path) = temp_store();
    let handles: Vec<_> = (0..4u32)
        .map(|worker| {
            let store = store.clone();
            std::thread::spawn(move || {
                let batch: Vec<StatRecord> = (0..10u64)
                    .map(|m| sample_record(worker as u64 * 100 + m, worker))
                    .collect();
                store.upsert_many(&batch).expect("worker upsert");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }
    assert_eq!(row_count(&path), 40);
}
