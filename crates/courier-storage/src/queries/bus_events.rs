// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbox table carrying bus events between processes.

use std::time::Duration;

use courier_core::CourierError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Append an event. Returns its id, which is monotonically increasing.
pub async fn append(db: &Database, channel: &str, payload: &str) -> Result<i64, CourierError> {
    let channel = channel.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO bus_events (channel, payload) VALUES (?1, ?2)",
                params![channel, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Events newer than `after_id`, oldest first, as `(id, payload)` pairs.
pub async fn after(
    db: &Database,
    after_id: i64,
    limit: i64,
) -> Result<Vec<(i64, String)>, CourierError> {
    db.connection()
        .call(move |conn| -> Result<Vec<(i64, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM bus_events WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![after_id, limit], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Highest event id, or 0 when the outbox is empty.
pub async fn latest_id(db: &Database) -> Result<i64, CourierError> {
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COALESCE(MAX(id), 0) FROM bus_events", [], |row| {
                row.get(0)
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delete events older than `retention`.
pub async fn prune(db: &Database, retention: Duration) -> Result<usize, CourierError> {
    let cutoff = format!("-{} seconds", retention.as_secs());
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM bus_events
                 WHERE created_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}
