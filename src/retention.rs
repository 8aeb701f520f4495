//! Background storage sweeps. Shape kept from the teacher's original
//! retention task: open its own connection, sleep past startup, loop on a
//! fixed interval. Here it garbage-collects encrypted file blobs that no
//! longer have any referencing message instead of pruning messages by age.

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

const SWEEP_INTERVAL_SECS: u64 = 300;

pub fn spawn_blob_gc_task(db_path: String) {
    tokio::spawn(async move {
        let conn = Arc::new(Mutex::new(match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("⚠️ blob GC task: failed to open DB: {e}");
                return;
            }
        }));
        {
            let db = conn.lock().unwrap_or_else(|e| e.into_inner());
            db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;").ok();
        }

        tokio::time::sleep(std::time::Duration::from_secs(30)).await;

        loop {
            {
                let db = conn.lock().unwrap_or_else(|e| {
                    eprintln!("WARN: blob GC task DB mutex poisoned, recovering");
                    e.into_inner()
                });
                match crate::db::gc_unreferenced_blobs(&db) {
                    Ok(n) if n > 0 => eprintln!("🧹 blob GC: removed {n} unreferenced file(s)"),
                    Ok(_) => {}
                    Err(e) => eprintln!("⚠️ blob GC sweep failed: {e}"),
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS)).await;
        }
    });
}
