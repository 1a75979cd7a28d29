// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe, multi-consumer job processing.
//!
//! A job is visible when it is `pending` and its `available_at` has passed, or
//! when it is `processing` but its visibility window (`locked_until`) expired
//! because the consumer that claimed it never answered.

use std::time::Duration;

use courier_core::CourierError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::QueueEntry;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        available_at: row.get(8)?,
        locked_until: row.get(9)?,
        last_error: row.get(10)?,
    })
}

/// SQLite datetime modifier for a positive duration, e.g. `+2.500 seconds`.
fn seconds_modifier(d: Duration) -> String {
    format!("+{:.3} seconds", d.as_secs_f64())
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, CourierError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Enqueue many items in one transaction, preserving their order.
pub async fn enqueue_batch(
    db: &Database,
    queue_name: &str,
    payloads: &[String],
    max_attempts: i32,
) -> Result<usize, CourierError> {
    let queue_name = queue_name.to_string();
    let payloads = payloads.to_vec();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                )?;
                for payload in &payloads {
                    stmt.execute(params![queue_name, payload, max_attempts])?;
                }
            }
            tx.commit()?;
            Ok(payloads.len())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next visible entry and hide it for `visibility`.
///
/// The select and the update are one statement, so two consumers can never
/// claim the same row. Each claim counts as one delivery attempt.
pub async fn claim(
    db: &Database,
    queue_name: &str,
    visibility: Duration,
) -> Result<Option<QueueEntry>, CourierError> {
    let queue_name = queue_name.to_string();
    let lock = seconds_modifier(visibility);
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            let sql = format!(
                "UPDATE queue SET status = 'processing',
                     attempts = attempts + 1,
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                     updated_at = {NOW}
                 WHERE id = (
                     SELECT id FROM queue
                     WHERE queue_name = ?1
                       AND ((status = 'pending' AND available_at <= {NOW})
                         OR (status = 'processing' AND locked_until < {NOW}))
                     ORDER BY id ASC
                     LIMIT 1
                 )
                 RETURNING id, queue_name, payload, status, attempts, max_attempts,
                           created_at, updated_at, available_at, locked_until, last_error"
            );
            conn.query_row(&sql, params![queue_name, lock], entry_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge an entry. It is never delivered again.
pub async fn ack(db: &Database, id: i64) -> Result<(), CourierError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'completed', locked_until = NULL, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Return an entry to the queue after `delay`.
///
/// When the entry already used all of its attempts it is marked `failed`
/// instead and `false` is returned.
pub async fn retry(
    db: &Database,
    id: i64,
    delay: Duration,
    error: &str,
) -> Result<bool, CourierError> {
    let error = error.to_string();
    let delay = seconds_modifier(delay);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let requeued = conn.execute(
                &format!(
                    "UPDATE queue SET status = 'pending', locked_until = NULL,
                         available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                         last_error = ?3, updated_at = {NOW}
                     WHERE id = ?1 AND attempts < max_attempts"
                ),
                params![id, delay, error],
            )?;
            if requeued == 1 {
                return Ok(true);
            }
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'failed', locked_until = NULL,
                         last_error = ?2, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, error],
            )?;
            Ok(false)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an entry as permanently failed (malformed payload, exhausted retries).
pub async fn bury(db: &Database, id: i64, error: &str) -> Result<(), CourierError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'failed', locked_until = NULL,
                         last_error = ?2, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Pending plus in-flight entries.
pub async fn depth(db: &Database, queue_name: &str) -> Result<i64, CourierError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM queue
                 WHERE queue_name = ?1 AND status IN ('pending', 'processing')",
                params![queue_name],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
pub(crate) async fn get_entry(db: &Database, id: i64) -> QueueEntry {
    db.connection()
        .call(move |conn| -> Result<QueueEntry, rusqlite::Error> {
            conn.query_row(
                "SELECT id, queue_name, payload, status, attempts, max_attempts,
                        created_at, updated_at, available_at, locked_until, last_error
                 FROM queue WHERE id = ?1",
                params![id],
                entry_from_row,
            )
        })
        .await
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    const VISIBLE: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn enqueue_and_claim_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "sends", r#"{"n":1}"#, 5).await.unwrap();
        assert!(id > 0);

        let entry = claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.payload, r#"{"n":1}"#);
        assert!(entry.locked_until.is_some());

        // Hidden while the visibility window is open.
        assert!(claim(&db, "sends", VISIBLE).await.unwrap().is_none());

        ack(&db, id).await.unwrap();
        assert_eq!(get_entry(&db, id).await.status, "completed");
        assert_eq!(depth(&db, "sends").await.unwrap(), 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_is_fifo_and_scoped_to_queue() {
        let (db, _dir) = setup_db().await;
        let payloads: Vec<String> = (0..3).map(|i| format!("job-{i}")).collect();
        assert_eq!(enqueue_batch(&db, "a", &payloads, 5).await.unwrap(), 3);
        enqueue(&db, "b", "other", 5).await.unwrap();

        for expected in &payloads {
            let entry = claim(&db, "a", VISIBLE).await.unwrap().unwrap();
            assert_eq!(&entry.payload, expected);
        }
        assert!(claim(&db, "a", VISIBLE).await.unwrap().is_none());
        assert_eq!(depth(&db, "a").await.unwrap(), 3);
        assert_eq!(depth(&db, "b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_visibility_window_redelivers() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "sends", "x", 5).await.unwrap();

        let first = claim(&db, "sends", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        assert_eq!(second.id, id);
        assert_eq!(second.attempts, 2);
    }

    #[tokio::test]
    async fn retry_delays_redelivery() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "sends", "x", 5).await.unwrap();
        claim(&db, "sends", VISIBLE).await.unwrap().unwrap();

        assert!(retry(&db, id, Duration::from_secs(60), "throttled").await.unwrap());
        let entry = get_entry(&db, id).await;
        assert_eq!(entry.status, "pending");
        assert_eq!(entry.last_error.as_deref(), Some("throttled"));
        assert!(claim(&db, "sends", VISIBLE).await.unwrap().is_none());

        let id2 = enqueue(&db, "sends", "y", 5).await.unwrap();
        claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        assert!(retry(&db, id2, Duration::ZERO, "again").await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(claim(&db, "sends", VISIBLE).await.unwrap().unwrap().id, id2);
    }

    #[tokio::test]
    async fn retry_marks_failed_at_max_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "sends", "x", 2).await.unwrap();

        claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        assert!(retry(&db, id, Duration::ZERO, "one").await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        assert!(!retry(&db, id, Duration::ZERO, "two").await.unwrap());

        let entry = get_entry(&db, id).await;
        assert_eq!(entry.status, "failed");
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_error.as_deref(), Some("two"));
        assert!(claim(&db, "sends", VISIBLE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bury_is_terminal() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "sends", "not json", 5).await.unwrap();
        claim(&db, "sends", VISIBLE).await.unwrap().unwrap();
        bury(&db, id, "malformed payload").await.unwrap();
        assert_eq!(get_entry(&db, id).await.status, "failed");
        assert_eq!(depth(&db, "sends").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_job() {
        let (db, _dir) = setup_db().await;
        let payloads: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        enqueue_batch(&db, "sends", &payloads, 5).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(entry) = claim(&db, "sends", VISIBLE).await.unwrap() {
                    got.push(entry.id);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(before, 20);
        assert_eq!(all.len(), 20);
    }
}
