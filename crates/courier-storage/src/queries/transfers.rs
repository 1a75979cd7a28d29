// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent transfers: claim-based hand-off and SLA breach bookkeeping.

use std::time::Duration;

use courier_core::types::BreachKind;
use courier_core::CourierError;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{enum_column, AgentTransfer};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const COLUMNS: &str = "id, organization_id, contact_id, team_id, status, assigned_agent_id,
    created_at, assigned_at, resumed_at";

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<AgentTransfer> {
    Ok(AgentTransfer {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        contact_id: row.get(2)?,
        team_id: row.get(3)?,
        status: enum_column(row, 4)?,
        assigned_agent_id: row.get(5)?,
        created_at: row.get(6)?,
        assigned_at: row.get(7)?,
        resumed_at: row.get(8)?,
    })
}

/// SQLite datetime modifier subtracting `d`.
fn ago(d: Duration) -> String {
    format!("-{:.3} seconds", d.as_secs_f64())
}

/// Insert a waiting transfer.
///
/// Returns `false` when the contact already has an open transfer; the partial
/// unique index on open transfers is the arbiter.
pub async fn create(db: &Database, transfer: &AgentTransfer) -> Result<bool, CourierError> {
    let t = transfer.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let result = conn.execute(
                "INSERT INTO agent_transfers (id, organization_id, contact_id, team_id, status,
                     assigned_agent_id, created_at, assigned_at, resumed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    t.id,
                    t.organization_id,
                    t.contact_id,
                    t.team_id,
                    t.status.to_string(),
                    t.assigned_agent_id,
                    t.created_at,
                    t.assigned_at,
                    t.resumed_at,
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<AgentTransfer>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AgentTransfer>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM agent_transfers WHERE id = ?1"),
                params![id],
                transfer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest waiting transfer for `agent_id`.
///
/// With a team, only that team's transfers are eligible; without one, the
/// whole organization's queue is. The status guard is re-checked by the
/// outer update so a row taken by a racing agent is never handed out twice.
pub async fn claim_next(
    db: &Database,
    organization_id: &str,
    team_id: Option<&str>,
    agent_id: &str,
) -> Result<Option<AgentTransfer>, CourierError> {
    let organization_id = organization_id.to_string();
    let team_id = team_id.map(str::to_string);
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AgentTransfer>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE agent_transfers
                     SET status = 'active', assigned_agent_id = ?3, assigned_at = {NOW}
                     WHERE id = (
                         SELECT id FROM agent_transfers
                         WHERE organization_id = ?1 AND status = 'waiting'
                           AND (?2 IS NULL OR team_id = ?2)
                         ORDER BY created_at ASC, rowid ASC
                         LIMIT 1
                     ) AND status = 'waiting'
                     RETURNING {COLUMNS}"
                ),
                params![organization_id, team_id, agent_id],
                transfer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Force-assign a waiting or active transfer to `agent_id`.
pub async fn assign(
    db: &Database,
    id: &str,
    agent_id: &str,
) -> Result<Option<AgentTransfer>, CourierError> {
    let id = id.to_string();
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AgentTransfer>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE agent_transfers
                     SET status = 'active', assigned_agent_id = ?2, assigned_at = {NOW}
                     WHERE id = ?1 AND status IN ('waiting', 'active')
                     RETURNING {COLUMNS}"
                ),
                params![id, agent_id],
                transfer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Hand an active transfer back to automated handling.
pub async fn resume(db: &Database, id: &str) -> Result<Option<AgentTransfer>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AgentTransfer>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE agent_transfers SET status = 'resumed', resumed_at = {NOW}
                     WHERE id = ?1 AND status = 'active'
                     RETURNING {COLUMNS}"
                ),
                params![id],
                transfer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Transfers that crossed a threshold and have not been flagged for it yet.
pub async fn list_breaches(
    db: &Database,
    kind: BreachKind,
    threshold: Duration,
) -> Result<Vec<AgentTransfer>, CourierError> {
    let cutoff = ago(threshold);
    let filter = match kind {
        BreachKind::Pickup => {
            "status = 'waiting' AND pickup_breached_at IS NULL
             AND created_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)"
        }
        BreachKind::Resolution => {
            "status = 'active' AND resolution_breached_at IS NULL
             AND assigned_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)"
        }
    };
    db.connection()
        .call(move |conn| -> Result<Vec<AgentTransfer>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM agent_transfers WHERE {filter} ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], transfer_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Flag a breach. Returns `true` only for the caller that set the flag.
pub async fn mark_breach(db: &Database, id: &str, kind: BreachKind) -> Result<bool, CourierError> {
    let id = id.to_string();
    let sql = match kind {
        BreachKind::Pickup => format!(
            "UPDATE agent_transfers SET pickup_breached_at = {NOW}
             WHERE id = ?1 AND status = 'waiting' AND pickup_breached_at IS NULL"
        ),
        BreachKind::Resolution => format!(
            "UPDATE agent_transfers SET resolution_breached_at = {NOW}
             WHERE id = ?1 AND status = 'active' AND resolution_breached_at IS NULL"
        ),
    };
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute(&sql, params![id])? == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::TransferStatus;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn transfer(contact: &str, team: Option<&str>, created_at: &str) -> AgentTransfer {
        let mut t = AgentTransfer::waiting("org-1", contact, team.map(str::to_string));
        t.created_at = created_at.to_string();
        t
    }

    #[tokio::test]
    async fn second_open_transfer_for_contact_is_rejected() {
        let (db, _dir) = setup_db().await;
        let first = transfer("c-1", None, "2026-01-01T00:00:00.000Z");
        assert!(create(&db, &first).await.unwrap());
        assert!(!create(&db, &transfer("c-1", None, "2026-01-01T00:00:01.000Z")).await.unwrap());

        // Once resumed, the contact may be transferred again.
        assign(&db, &first.id, "agent-1").await.unwrap().unwrap();
        resume(&db, &first.id).await.unwrap().unwrap();
        assert!(create(&db, &transfer("c-1", None, "2026-01-01T00:00:02.000Z")).await.unwrap());
    }

    #[tokio::test]
    async fn claim_next_is_oldest_first_and_team_scoped() {
        let (db, _dir) = setup_db().await;
        let sales_new = transfer("c-1", Some("sales"), "2026-01-01T00:00:03.000Z");
        let support = transfer("c-2", Some("support"), "2026-01-01T00:00:01.000Z");
        let sales_old = transfer("c-3", Some("sales"), "2026-01-01T00:00:02.000Z");
        for t in [&sales_new, &support, &sales_old] {
            create(&db, t).await.unwrap();
        }

        let got = claim_next(&db, "org-1", Some("sales"), "agent-1").await.unwrap().unwrap();
        assert_eq!(got.id, sales_old.id);
        assert_eq!(got.status, TransferStatus::Active);
        assert_eq!(got.assigned_agent_id.as_deref(), Some("agent-1"));
        assert!(got.assigned_at.is_some());

        let any = claim_next(&db, "org-1", None, "agent-2").await.unwrap().unwrap();
        assert_eq!(any.id, support.id);

        assert!(claim_next(&db, "org-2", None, "agent-3").await.unwrap().is_none());
        assert!(claim_next(&db, "org-1", Some("support"), "agent-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn racing_agents_claim_exactly_once() {
        let (db, _dir) = setup_db().await;
        let only = transfer("c-1", None, "2026-01-01T00:00:00.000Z");
        create(&db, &only).await.unwrap();

        let mut handles = Vec::new();
        for agent in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                claim_next(&db, "org-1", None, &format!("agent-{agent}"))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn resume_requires_active() {
        let (db, _dir) = setup_db().await;
        let t = transfer("c-1", None, "2026-01-01T00:00:00.000Z");
        create(&db, &t).await.unwrap();
        assert!(resume(&db, &t.id).await.unwrap().is_none());

        let active = assign(&db, &t.id, "agent-1").await.unwrap().unwrap();
        assert_eq!(active.status, TransferStatus::Active);
        let reassigned = assign(&db, &t.id, "agent-2").await.unwrap().unwrap();
        assert_eq!(reassigned.assigned_agent_id.as_deref(), Some("agent-2"));

        let resumed = resume(&db, &t.id).await.unwrap().unwrap();
        assert_eq!(resumed.status, TransferStatus::Resumed);
        assert!(resumed.resumed_at.is_some());
        assert!(assign(&db, &t.id, "agent-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn breaches_are_listed_and_marked_once() {
        let (db, _dir) = setup_db().await;
        let stale = transfer("c-1", None, "2000-01-01T00:00:00.000Z");
        let fresh = AgentTransfer::waiting("org-1", "c-2", None);
        create(&db, &stale).await.unwrap();
        create(&db, &fresh).await.unwrap();

        let threshold = Duration::from_secs(300);
        let found = list_breaches(&db, BreachKind::Pickup, threshold).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);

        assert!(mark_breach(&db, &stale.id, BreachKind::Pickup).await.unwrap());
        assert!(!mark_breach(&db, &stale.id, BreachKind::Pickup).await.unwrap());
        assert!(list_breaches(&db, BreachKind::Pickup, threshold)
            .await
            .unwrap()
            .is_empty());

        // Resolution is measured from assignment, so a fresh assignment is not breaching.
        assign(&db, &stale.id, "agent-1").await.unwrap();
        assert!(list_breaches(&db, BreachKind::Resolution, threshold)
            .await
            .unwrap()
            .is_empty());
        let zero = list_breaches(&db, BreachKind::Resolution, Duration::ZERO).await.unwrap();
        assert_eq!(zero.len(), 1);
        assert!(mark_breach(&db, &stale.id, BreachKind::Resolution).await.unwrap());
        assert!(!mark_breach(&db, &fresh.id, BreachKind::Resolution).await.unwrap());
    }

    #[tokio::test]
    async fn breach_threshold_keeps_subsecond_precision() {
        let (db, _dir) = setup_db().await;
        let created = chrono::Utc::now() - chrono::Duration::seconds(10);
        let t = transfer("c-1", None, &courier_core::types::format_timestamp(created));
        create(&db, &t).await.unwrap();

        assert_eq!(ago(Duration::from_millis(10_500)), "-10.500 seconds");
        assert!(list_breaches(&db, BreachKind::Pickup, Duration::from_millis(10_500))
            .await
            .unwrap()
            .is_empty());
        let found = list_breaches(&db, BreachKind::Pickup, Duration::from_millis(9_500))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
