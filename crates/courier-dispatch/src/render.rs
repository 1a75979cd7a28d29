// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Positional placeholder substitution for template bodies.

use std::sync::LazyLock;

use courier_core::TemplateParams;
use regex::{Captures, Regex};

/// Highest positional placeholder that is substituted.
pub const MAX_PLACEHOLDER: u32 = 10;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\d+)\}\}").expect("placeholder pattern is valid"));

/// Replace `{{1}}` .. `{{10}}` with the matching entry of `params`.
///
/// Placeholders without a parameter, and indexes outside the supported
/// range, are left verbatim.
pub fn render(body: &str, params: &TemplateParams) -> String {
    PLACEHOLDER
        .replace_all(body, |caps: &Captures<'_>| {
            let index = &caps[1];
            let in_range = index
                .parse::<u32>()
                .is_ok_and(|n| (1..=MAX_PLACEHOLDER).contains(&n));
            match params.get(index) {
                Some(value) if in_range => param_text(value),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Parameters as plain text, strings unquoted.
pub fn param_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
