// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact resolution tolerant of mixed phone formats.

use courier_core::{Contact, CourierError, StorageAdapter};
use tracing::debug;

/// Strip surrounding whitespace and one leading `+`.
pub fn normalize_phone(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('+').unwrap_or(trimmed)
}

/// Find the contact for `phone` in either stored form, creating it if absent.
///
/// Stored data may hold `14155550123` or `+14155550123` for the same person;
/// both forms are tried before a new row (normalized form) is inserted.
pub async fn resolve_contact(
    storage: &dyn StorageAdapter,
    organization_id: &str,
    phone: &str,
    name: Option<&str>,
) -> Result<Contact, CourierError> {
    let normalized = normalize_phone(phone);
    if normalized.is_empty() {
        return Err(CourierError::Validation(format!(
            "invalid phone number: {phone:?}"
        )));
    }

    if let Some(contact) = storage.find_contact(organization_id, normalized).await? {
        return Ok(contact);
    }
    let prefixed = format!("+{normalized}");
    if let Some(contact) = storage.find_contact(organization_id, &prefixed).await? {
        return Ok(contact);
    }

    debug!(organization_id, phone = normalized, "creating contact");
    let contact = Contact::new(organization_id, normalized, name.map(str::to_string));
    storage.insert_contact_if_absent(&contact).await
}
