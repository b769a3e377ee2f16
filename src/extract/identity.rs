//! Server identity parsing

use crate::extract::ExtractError;
use serde_json::Value;

/// Parses the numeric server id from a detail-page link
///
/// The id is the trailing path segment (query and fragment ignored), e.g.
/// `/rust_servers/41234` or `https://www.battlemetrics.com/servers/rust/123/`.
/// Non-numeric tails such as `/rust_servers/map` are rejected.
pub fn server_id_from_href(href: &str) -> Result<i64, ExtractError> {
    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    let tail = path.rsplit('/').next().unwrap_or_default().trim();
    parse_numeric_id(tail)
}

/// Parses an id carried as a JSON string or number
pub fn server_id_from_json(value: &Value) -> Result<i64, ExtractError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|id| *id >= 0)
            .ok_or_else(|| ExtractError::NonNumericId(n.to_string())),
        Value::String(s) => parse_numeric_id(s.trim()),
        other => Err(ExtractError::NonNumericId(other.to_string())),
    }
}

fn parse_numeric_id(raw: &str) -> Result<i64, ExtractError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractError::NonNumericId(raw.to_string()));
    }
    raw.parse::<i64>()
        .map_err(|_| ExtractError::NonNumericId(raw.to_string()))
}
