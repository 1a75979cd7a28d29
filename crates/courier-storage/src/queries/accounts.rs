// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending accounts and message templates, both looked up by (organization, name).

use courier_core::CourierError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{Account, Template};

pub async fn create_account(db: &Database, account: &Account) -> Result<(), CourierError> {
    let a = account.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (id, organization_id, name, phone_number_id, access_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    a.id,
                    a.organization_id,
                    a.name,
                    a.phone_number_id,
                    a.access_token,
                    a.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_account(
    db: &Database,
    organization_id: &str,
    name: &str,
) -> Result<Option<Account>, CourierError> {
    let organization_id = organization_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, organization_id, name, phone_number_id, access_token, created_at
                 FROM accounts WHERE organization_id = ?1 AND name = ?2",
                params![organization_id, name],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        name: row.get(2)?,
                        phone_number_id: row.get(3)?,
                        access_token: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create_template(db: &Database, template: &Template) -> Result<(), CourierError> {
    let t = template.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO templates (id, organization_id, name, language, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![t.id, t.organization_id, t.name, t.language, t.body, t.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_template(
    db: &Database,
    organization_id: &str,
    name: &str,
) -> Result<Option<Template>, CourierError> {
    let organization_id = organization_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Template>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, organization_id, name, language, body, created_at
                 FROM templates WHERE organization_id = ?1 AND name = ?2",
                params![organization_id, name],
                |row| {
                    Ok(Template {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        name: row.get(2)?,
                        language: row.get(3)?,
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
