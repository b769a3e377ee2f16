//! BattleMetrics API item extraction

use crate::extract::group::resolve_max_group;
use crate::extract::identity::server_id_from_json;
use crate::extract::wipe::instant_or;
use crate::extract::{ExtractError, ExtractOptions, Extraction};
use crate::model::CandidateServer;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Extracts a candidate from one `data[]` object of the servers endpoint
///
/// Expected shape:
///
/// ```json
/// { "id": "123", "attributes": { "id": "123", "name": "...",
///   "details": { "rust_last_wipe": "2024-01-04T18:00:00.000Z", "maxGroup": 2 } } }
/// ```
///
/// A missing `rust_last_wipe` falls back to `observed_at`.
pub fn extract_api_server(
    item: &Value,
    observed_at: DateTime<Utc>,
    options: &ExtractOptions,
) -> Extraction {
    match candidate_from_api(item, observed_at, options) {
        Ok(candidate) => Extraction::Candidate(candidate),
        Err(e) => Extraction::Malformed(e),
    }
}

fn candidate_from_api(
    item: &Value,
    observed_at: DateTime<Utc>,
    options: &ExtractOptions,
) -> Result<CandidateServer, ExtractError> {
    let attributes = item
        .get("attributes")
        .filter(|a| a.is_object())
        .ok_or(ExtractError::MissingField("attributes"))?;

    let id_value = attributes
        .get("id")
        .or_else(|| item.get("id"))
        .ok_or(ExtractError::MissingField("id"))?;
    let server_id = server_id_from_json(id_value)?;

    let server_name = attributes
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ExtractError::MissingField("attributes.name"))?
        .trim();
    if server_name.is_empty() {
        return Err(ExtractError::EmptyName);
    }

    let details = attributes.get("details");
    let last_wipe = details
        .and_then(|d| d.get("rust_last_wipe"))
        .and_then(Value::as_str);
    let reported_group = details
        .and_then(|d| d.get("maxGroup").or_else(|| d.get("rust_settings_group_size")))
        .and_then(Value::as_i64);

    Ok(CandidateServer::from_instant(
        server_id,
        server_name,
        resolve_max_group(server_name, reported_group),
        instant_or(last_wipe, observed_at),
        options.keep_instant,
    ))
}
