// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message audit records.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::{enum_column, Message};

/// Insert a new message. Messages are never updated afterwards.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), CourierError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (id, organization_id, contact_id, direction, content, status,
                     provider_message_id, error_message, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    msg.id,
                    msg.organization_id,
                    msg.contact_id,
                    msg.direction.to_string(),
                    msg.content,
                    msg.status.to_string(),
                    msg.provider_message_id,
                    msg.error_message,
                    msg.metadata,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Messages for a contact in chronological order.
pub async fn list_for_contact(
    db: &Database,
    contact_id: &str,
) -> Result<Vec<Message>, CourierError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, organization_id, contact_id, direction, content, status,
                        provider_message_id, error_message, metadata, created_at
                 FROM messages WHERE contact_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![contact_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    contact_id: row.get(2)?,
                    direction: enum_column(row, 3)?,
                    content: row.get(4)?,
                    status: enum_column(row, 5)?,
                    provider_message_id: row.get(6)?,
                    error_message: row.get(7)?,
                    metadata: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
