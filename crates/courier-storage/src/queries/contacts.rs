// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact lookup and race-free creation.

use courier_core::CourierError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::models::Contact;

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        phone_number: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Exact-match lookup. Callers handle phone normalization.
pub async fn find_contact(
    db: &Database,
    organization_id: &str,
    phone_number: &str,
) -> Result<Option<Contact>, CourierError> {
    let organization_id = organization_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, organization_id, phone_number, name, created_at
                 FROM contacts WHERE organization_id = ?1 AND phone_number = ?2",
                params![organization_id, phone_number],
                contact_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert unless (organization, phone) already exists, then return the stored row.
///
/// Two workers resolving the same new number both end up with the same contact.
pub async fn insert_if_absent(db: &Database, contact: &Contact) -> Result<Contact, CourierError> {
    let c = contact.clone();
    db.connection()
        .call(move |conn| -> Result<Contact, rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO contacts (id, organization_id, phone_number, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![c.id, c.organization_id, c.phone_number, c.name, c.created_at],
            )?;
            conn.query_row(
                "SELECT id, organization_id, phone_number, name, created_at
                 FROM contacts WHERE organization_id = ?1 AND phone_number = ?2",
                params![c.organization_id, c.phone_number],
                contact_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn contact(id: &str, phone: &str) -> Contact {
        Contact {
            id: id.into(),
            organization_id: "org-1".into(),
            phone_number: phone.into(),
            name: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn insert_if_absent_returns_existing_row() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let first = insert_if_absent(&db, &contact("c-1", "14155550123")).await.unwrap();
        let second = insert_if_absent(&db, &contact("c-2", "14155550123")).await.unwrap();
        assert_eq!(first.id, "c-1");
        assert_eq!(second.id, "c-1");

        assert!(find_contact(&db, "org-1", "+14155550123").await.unwrap().is_none());
        assert_eq!(
            find_contact(&db, "org-1", "14155550123").await.unwrap().unwrap().id,
            "c-1"
        );
    }
}
