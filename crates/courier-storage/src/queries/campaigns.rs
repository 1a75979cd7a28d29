// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign persistence and guarded lifecycle transitions.

use courier_core::types::CampaignStatus;
use courier_core::CourierError;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{enum_column, to_json, Campaign, Recipient};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const COLUMNS: &str = "id, organization_id, name, account_name, template_name, status,
    total_recipients, sent_count, delivered_count, read_count, failed_count,
    scheduled_at, started_at, completed_at, created_at, updated_at";

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        account_name: row.get(3)?,
        template_name: row.get(4)?,
        status: enum_column(row, 5)?,
        total_recipients: row.get(6)?,
        sent_count: row.get(7)?,
        delivered_count: row.get(8)?,
        read_count: row.get(9)?,
        failed_count: row.get(10)?,
        scheduled_at: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Insert a campaign and its recipients in one transaction.
///
/// `total_recipients` is taken from the recipient list, not from the struct.
pub async fn create_campaign(
    db: &Database,
    campaign: &Campaign,
    recipients: &[Recipient],
) -> Result<(), CourierError> {
    let c = campaign.clone();
    let recipients = recipients.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO campaigns (id, organization_id, name, account_name, template_name,
                     status, total_recipients, sent_count, delivered_count, read_count,
                     failed_count, scheduled_at, started_at, completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0, 0, ?8, NULL, NULL, ?9, ?10)",
                params![
                    c.id,
                    c.organization_id,
                    c.name,
                    c.account_name,
                    c.template_name,
                    c.status.to_string(),
                    recipients.len() as i64,
                    c.scheduled_at,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO campaign_recipients
                         (id, campaign_id, phone_number, recipient_name, template_params, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                )?;
                for r in &recipients {
                    stmt.execute(params![
                        r.id,
                        c.id,
                        r.phone_number,
                        r.recipient_name,
                        to_json(&r.template_params)?,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Campaign>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                campaign_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_by_status(
    db: &Database,
    status: CampaignStatus,
) -> Result<Vec<Campaign>, CourierError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![status], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Scheduled campaigns whose start time has passed.
pub async fn list_due_scheduled(db: &Database) -> Result<Vec<Campaign>, CourierError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM campaigns
                 WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= {NOW}
                 ORDER BY scheduled_at ASC"
            ))?;
            let rows = stmt.query_map([], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Conditionally move a campaign from any of `from` to `to`.
///
/// Only one of several racing callers can observe `true` for the same edge,
/// since the status guard and the write are a single statement.
pub async fn transition(
    db: &Database,
    id: &str,
    from: &[CampaignStatus],
    to: CampaignStatus,
) -> Result<bool, CourierError> {
    if from.is_empty() {
        return Ok(false);
    }
    let mut values: Vec<String> = Vec::with_capacity(from.len() + 2);
    values.push(to.to_string());
    values.push(id.to_string());
    values.extend(from.iter().map(|s| s.to_string()));

    let placeholders = (0..from.len())
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let stamps = match to {
        CampaignStatus::Processing => format!(", started_at = COALESCE(started_at, {NOW})"),
        CampaignStatus::Completed => format!(", completed_at = {NOW}"),
        _ => String::new(),
    };
    let sql = format!(
        "UPDATE campaigns SET status = ?1, updated_at = {NOW}{stamps}
         WHERE id = ?2 AND status IN ({placeholders})"
    );

    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Set the start time of a draft campaign and mark it scheduled.
pub async fn schedule(db: &Database, id: &str, at: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                &format!(
                    "UPDATE campaigns SET status = 'scheduled', scheduled_at = ?2, updated_at = {NOW}
                     WHERE id = ?1 AND status = 'draft'"
                ),
                params![id, at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
