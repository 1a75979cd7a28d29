// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics for `courier.toml`.
//!
//! Unknown keys, tables and enum values get a "did you mean" hint. When the
//! offending key came from a file the report points at it. Type errors also
//! name the `COURIER_*` variable that overrides the same key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt::Write;

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler score for a suggestion (`concurency` -> `concurrency`).
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key (or top-level table) that no courier setting uses.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(courier::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Table the key appeared in; `None` when the key is itself a table.
        section: Option<String>,
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a courier setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A string that does not name any variant of an enum setting.
    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(
        code(courier::config::unknown_value),
        help("{}", unknown_value_help(suggestion.as_deref(), expected))
    )]
    UnknownValue {
        key: String,
        value: String,
        suggestion: Option<String>,
        expected: String,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(courier::config::invalid_type),
        help("{}", invalid_type_help(key, expected))
    )]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that deserialized but failed a cross-field or range check.
    #[error("validation error: {message}")]
    #[diagnostic(
        code(courier::config::validation),
        help("checked after every config file and COURIER_* variable is merged")
    )]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(courier::config::other))]
    Other(String),
}

fn unknown_key_help(section: Option<&str>, suggestion: Option<&str>, valid_keys: &str) -> String {
    let scope = match section {
        Some(section) => format!("[{section}] accepts"),
        None => "courier.toml sections are".to_string(),
    };
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {scope}: {valid_keys}"),
        None => format!("{scope}: {valid_keys}"),
    }
}

fn unknown_value_help(suggestion: Option<&str>, expected: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? expected one of: {expected}"),
        None => format!("expected one of: {expected}"),
    }
}

fn invalid_type_help(key: &str, expected: &str) -> String {
    format!("expected {expected}; `{}` can also set this key", env_var(key))
}

/// Environment variable that overrides a dotted key (`server.port` -> `COURIER_SERVER_PORT`).
pub fn env_var(key: &str) -> String {
    format!("COURIER_{}", key.replace('.', "_").to_uppercase())
}

/// Convert a (possibly multi-error) `figment::Error` into diagnostics.
///
/// `toml_sources` pairs file paths with their contents so unknown keys and
/// bad types can be labelled in place.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, sources: &[(String, String)]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let section = error.path.first().filter(|table| *table != field).cloned();
            let (span, src) = locate(error, section.as_deref(), field, sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                section,
                span,
                src,
            }
        }
        Kind::UnknownVariant(value, expected) => ConfigError::UnknownValue {
            key: error.path.join("."),
            value: value.clone(),
            suggestion: suggest_key(value, expected),
            expected: expected.join(", "),
        },
        Kind::InvalidType(actual, expected) => {
            let (span, src) = match error.path.split_last() {
                Some((field, table)) => {
                    locate(error, table.first().map(String::as_str), field, sources)
                }
                None => (None, None),
            };
            ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.clone(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Span of `key` in the file the error came from, if that file was read.
fn locate(
    error: &figment::Error,
    table: Option<&str>,
    key: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => return (None, None),
    };
    sources
        .iter()
        .find(|(path, _)| *path == origin)
        .and_then(|(path, content)| {
            let offset = find_key_offset(content, table, key)?;
            Some((
                Some(SourceSpan::new(offset.into(), key.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `key` inside `[table]`, scanning the file once.
///
/// With `table = None` the key is looked up before the first header, or as
/// a table header itself (`[telemetry]` reports the name inside brackets).
pub fn find_key_offset(content: &str, table: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let text = line.trim();

        if let Some((header, _)) = text.strip_prefix('[').and_then(|h| h.split_once(']')) {
            let header = header.trim();
            if table.is_none() && header == key {
                return line.find(key).map(|col| start + col);
            }
            current = Some(header);
            continue;
        }
        if current != table {
            continue;
        }
        if let Some(rest) = text.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(start + (line.len() - line.trim_start().len()));
        }
    }
    None
}

/// Closest candidate to `unknown` above the similarity threshold.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::jaro_winkler(unknown, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Print every diagnostic to stderr under one summary line.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            let _ = writeln!(out, "Error: {error}");
        }
    }
    let noun = if errors.len() == 1 { "error" } else { "errors" };
    eprintln!("courier: {} configuration {noun}", errors.len());
    eprint!("{out}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_closest_key() {
        let server = &["host", "port", "bearer_token", "embedded_workers"];
        assert_eq!(suggest_key("prot", server), Some("port".to_string()));
        assert_eq!(
            suggest_key("concurency", &["concurrency", "restart_delay_ms"]),
            Some("concurrency".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", server), None);
    }

    #[test]
    fn offset_is_scoped_to_the_table() {
        let content = "[server]\nport = 1\n\n[hub]\nport = 80\n";
        let o = find_key_offset(content, Some("hub"), "port").unwrap();
        assert_eq!(o, content.rfind("port").unwrap());
        assert!(find_key_offset(content, Some("sla"), "port").is_none());
    }

    #[test]
    fn offset_ignores_prefix_matches() {
        let content = "[queue]\nname_suffix = 1\n  name = \"x\"\n";
        let o = find_key_offset(content, Some("queue"), "name").unwrap();
        assert_eq!(&content[o..o + 6], "name =");
    }

    #[test]
    fn unknown_table_points_at_its_header() {
        let content = "[logging]\nlevel = \"debug\"\n[ telemetry ]\nenabled = true\n";
        let o = find_key_offset(content, None, "telemetry").unwrap();
        assert_eq!(&content[o..o + 9], "telemetry");
    }

    #[test]
    fn env_var_for_dotted_key() {
        assert_eq!(env_var("server.port"), "COURIER_SERVER_PORT");
        assert_eq!(env_var("queue.max_attempts"), "COURIER_QUEUE_MAX_ATTEMPTS");
    }

    #[test]
    fn help_names_the_scope() {
        let top = unknown_key_help(None, None, "logging, server");
        assert_eq!(top, "courier.toml sections are: logging, server");
        let keyed = unknown_key_help(Some("server"), Some("port"), "host, port");
        assert_eq!(keyed, "did you mean `port`? [server] accepts: host, port");
        assert!(invalid_type_help("worker.concurrency", "u64").contains("COURIER_WORKER_CONCURRENCY"));
    }
}
