// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign recipient state, idempotent outcome recording, and delivery receipts.

use courier_core::types::{ReceiptStatus, RecipientOutcome};
use courier_core::CourierError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{enum_column, json_column, Recipient};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const COLUMNS: &str = "id, campaign_id, phone_number, recipient_name, template_params, status,
    provider_message_id, sent_at, error_message, delivered_at, read_at";

fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<Recipient> {
    Ok(Recipient {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        phone_number: row.get(2)?,
        recipient_name: row.get(3)?,
        template_params: json_column(row, 4)?,
        status: enum_column(row, 5)?,
        provider_message_id: row.get(6)?,
        sent_at: row.get(7)?,
        error_message: row.get(8)?,
        delivered_at: row.get(9)?,
        read_at: row.get(10)?,
    })
}

pub async fn get_recipient(db: &Database, id: &str) -> Result<Option<Recipient>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Recipient>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM campaign_recipients WHERE id = ?1"),
                params![id],
                recipient_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Pending recipients with no pending or in-flight job in `queue_name`.
///
/// Starting or resuming a campaign enqueues exactly these, so a resume never
/// duplicates jobs that are still waiting in the queue.
pub async fn list_unqueued_pending(
    db: &Database,
    campaign_id: &str,
    queue_name: &str,
) -> Result<Vec<Recipient>, CourierError> {
    let campaign_id = campaign_id.to_string();
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Recipient>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM campaign_recipients r
                 WHERE r.campaign_id = ?1 AND r.status = 'pending'
                   AND NOT EXISTS (
                       SELECT 1 FROM queue q
                       WHERE q.queue_name = ?2
                         AND q.status IN ('pending', 'processing')
                         AND json_extract(q.payload, '$.recipient_id') = r.id
                   )
                 ORDER BY r.rowid ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id, queue_name], recipient_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_pending(db: &Database, campaign_id: &str) -> Result<i64, CourierError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM campaign_recipients
                 WHERE campaign_id = ?1 AND status = 'pending'",
                params![campaign_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Move a pending recipient to its terminal state and bump the matching
/// campaign counter, both in one transaction.
///
/// Returns `false` without touching the campaign when the recipient was not
/// pending any more (a redelivered job).
pub async fn record_outcome(
    db: &Database,
    campaign_id: &str,
    recipient_id: &str,
    outcome: &RecipientOutcome,
) -> Result<bool, CourierError> {
    let campaign_id = campaign_id.to_string();
    let recipient_id = recipient_id.to_string();
    let outcome = outcome.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let (changed, counter) = match &outcome {
                RecipientOutcome::Sent {
                    provider_message_id,
                } => (
                    tx.execute(
                        &format!(
                            "UPDATE campaign_recipients
                             SET status = 'sent', provider_message_id = ?3, sent_at = {NOW}
                             WHERE id = ?1 AND campaign_id = ?2 AND status = 'pending'"
                        ),
                        params![recipient_id, campaign_id, provider_message_id],
                    )?,
                    "sent_count",
                ),
                RecipientOutcome::Failed { error } => (
                    tx.execute(
                        "UPDATE campaign_recipients SET status = 'failed', error_message = ?3
                         WHERE id = ?1 AND campaign_id = ?2 AND status = 'pending'",
                        params![recipient_id, campaign_id, error],
                    )?,
                    "failed_count",
                ),
            };
            if changed == 1 {
                tx.execute(
                    &format!(
                        "UPDATE campaigns SET {counter} = {counter} + 1, updated_at = {NOW}
                         WHERE id = ?1"
                    ),
                    params![campaign_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a delivery receipt once and bump the campaign counters it implies.
///
/// A `read` receipt for a recipient without a recorded delivery also counts
/// the delivery. Returns the campaign id when any counter moved.
pub async fn apply_receipt(
    db: &Database,
    provider_message_id: &str,
    status: ReceiptStatus,
) -> Result<Option<String>, CourierError> {
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let delivered: Option<String> = tx
                .query_row(
                    &format!(
                        "UPDATE campaign_recipients SET delivered_at = {NOW}
                         WHERE provider_message_id = ?1 AND status = 'sent' AND delivered_at IS NULL
                         RETURNING campaign_id"
                    ),
                    params![provider_message_id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(campaign_id) = &delivered {
                tx.execute(
                    &format!(
                        "UPDATE campaigns SET delivered_count = delivered_count + 1,
                             updated_at = {NOW}
                         WHERE id = ?1"
                    ),
                    params![campaign_id],
                )?;
            }

            let read: Option<String> = if status == ReceiptStatus::Read {
                tx.query_row(
                    &format!(
                        "UPDATE campaign_recipients SET read_at = {NOW}
                         WHERE provider_message_id = ?1 AND status = 'sent' AND read_at IS NULL
                         RETURNING campaign_id"
                    ),
                    params![provider_message_id],
                    |row| row.get(0),
                )
                .optional()?
            } else {
                None
            };
            if let Some(campaign_id) = &read {
                tx.execute(
                    &format!(
                        "UPDATE campaigns SET read_count = read_count + 1, updated_at = {NOW}
                         WHERE id = ?1"
                    ),
                    params![campaign_id],
                )?;
            }

            tx.commit()?;
            Ok(read.or(delivered))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Campaign;
    use crate::queries::{campaigns, queue};
    use courier_core::types::{RecipientStatus, SendJob, TemplateParams};
    use tempfile::tempdir;

    async fn setup(n: usize) -> (Database, tempfile::TempDir, Campaign, Vec<Recipient>) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let campaign = Campaign::draft("org-1", "spring", "main", "promo");
        let recipients: Vec<Recipient> = (0..n)
            .map(|i| {
                let mut params = TemplateParams::new();
                params.insert("1".into(), serde_json::json!(format!("name-{i}")));
                Recipient::pending(&campaign.id, format!("1555000{i}"), None, params)
            })
            .collect();
        campaigns::create_campaign(&db, &campaign, &recipients)
            .await
            .unwrap();
        (db, dir, campaign, recipients)
    }

    fn sent(id: &str) -> RecipientOutcome {
        RecipientOutcome::Sent {
            provider_message_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn recipient_round_trips_template_params() {
        let (db, _dir, _campaign, recipients) = setup(1).await;
        let stored = get_recipient(&db, &recipients[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecipientStatus::Pending);
        assert_eq!(stored.template_params["1"], "name-0");
    }

    #[tokio::test]
    async fn redelivered_outcome_does_not_double_count() {
        let (db, _dir, campaign, recipients) = setup(2).await;
        let r = &recipients[0];

        assert!(record_outcome(&db, &campaign.id, &r.id, &sent("wamid.1")).await.unwrap());
        assert!(!record_outcome(&db, &campaign.id, &r.id, &sent("wamid.2")).await.unwrap());
        assert!(!record_outcome(
            &db,
            &campaign.id,
            &r.id,
            &RecipientOutcome::Failed {
                error: "late".into()
            }
        )
        .await
        .unwrap());

        let stored = get_recipient(&db, &r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecipientStatus::Sent);
        assert_eq!(stored.provider_message_id.as_deref(), Some("wamid.1"));
        assert!(stored.sent_at.is_some());

        let c = campaigns::get_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(c.sent_count, 1);
        assert_eq!(c.failed_count, 0);
        assert_eq!(count_pending(&db, &campaign.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_outcomes_increment_atomically() {
        let (db, _dir, campaign, recipients) = setup(20).await;
        let mut handles = Vec::new();
        for (i, r) in recipients.iter().enumerate() {
            let db = db.clone();
            let campaign_id = campaign.id.clone();
            let recipient_id = r.id.clone();
            handles.push(tokio::spawn(async move {
                let outcome = if i % 4 == 0 {
                    RecipientOutcome::Failed {
                        error: "rejected".into(),
                    }
                } else {
                    sent(&format!("wamid.{i}"))
                };
                record_outcome(&db, &campaign_id, &recipient_id, &outcome)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let c = campaigns::get_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(c.sent_count, 15);
        assert_eq!(c.failed_count, 5);
        assert_eq!(c.processed_count(), c.total_recipients);
        assert_eq!(count_pending(&db, &campaign.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unqueued_pending_skips_outstanding_jobs() {
        let (db, _dir, campaign, recipients) = setup(3).await;
        let job = SendJob::for_recipient(&campaign, &recipients[0]);
        queue::enqueue(&db, "sends", &serde_json::to_string(&job).unwrap(), 5)
            .await
            .unwrap();
        record_outcome(&db, &campaign.id, &recipients[1].id, &sent("wamid.1"))
            .await
            .unwrap();

        let todo = list_unqueued_pending(&db, &campaign.id, "sends").await.unwrap();
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].id, recipients[2].id);

        // A different queue does not shadow recipients.
        let other = list_unqueued_pending(&db, &campaign.id, "other").await.unwrap();
        assert_eq!(other.len(), 2);
    }

    #[tokio::test]
    async fn receipts_count_once_and_read_implies_delivered() {
        let (db, _dir, campaign, recipients) = setup(2).await;
        record_outcome(&db, &campaign.id, &recipients[0].id, &sent("wamid.a"))
            .await
            .unwrap();
        record_outcome(&db, &campaign.id, &recipients[1].id, &sent("wamid.b"))
            .await
            .unwrap();

        assert_eq!(
            apply_receipt(&db, "wamid.a", ReceiptStatus::Delivered).await.unwrap(),
            Some(campaign.id.clone())
        );
        assert!(apply_receipt(&db, "wamid.a", ReceiptStatus::Delivered)
            .await
            .unwrap()
            .is_none());
        apply_receipt(&db, "wamid.a", ReceiptStatus::Read).await.unwrap();

        // Read without a prior delivery counts both.
        apply_receipt(&db, "wamid.b", ReceiptStatus::Read).await.unwrap();
        assert!(apply_receipt(&db, "wamid.b", ReceiptStatus::Read)
            .await
            .unwrap()
            .is_none());
        assert!(apply_receipt(&db, "unknown", ReceiptStatus::Read)
            .await
            .unwrap()
            .is_none());

        let c = campaigns::get_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(c.delivered_count, 2);
        assert_eq!(c.read_count, 2);
    }
}
