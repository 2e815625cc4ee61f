use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{ActivitySession, ActivitySource};
use crate::error::{SyncError, SyncResult};
use crate::http::JsonClient;

const SERVICE: &str = "tautulli";
const TVDB_GUID_PREFIX: &str = "tvdb://";
const UNKNOWN_TITLE: &str = "Unknown Title";

#[derive(Debug, Clone)]
pub(crate) struct TautulliClient {
    http: JsonClient,
    api_key: String,
}

impl TautulliClient {
    pub(crate) fn new(url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http: JsonClient::new(SERVICE, url, timeout),
            api_key: api_key.to_string(),
        }
    }
}

impl ActivitySource for TautulliClient {
    fn current_sessions(&self) -> SyncResult<Vec<ActivitySession>> {
        let body = self.http.get(
            "",
            &[("apikey", self.api_key.as_str()), ("cmd", "get_activity")],
        )?;
        let sessions = parse_activity(&body)?;
        debug!(count = sessions.len(), "Fetched Tautulli activity");
        Ok(sessions)
    }
}

/// Reads `response.data.sessions`. A missing list means nobody is watching;
/// an explicit non-success result is an error.
pub(crate) fn parse_activity(body: &Value) -> SyncResult<Vec<ActivitySession>> {
    if let Some(result) = body.pointer("/response/result").and_then(Value::as_str)
        && result != "success"
    {
        let message = body
            .pointer("/response/message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(SyncError::InvalidResponse {
            service: SERVICE,
            detail: format!("get_activity returned '{result}': {message}"),
        });
    }

    let Some(sessions) = body
        .pointer("/response/data/sessions")
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    Ok(sessions.iter().map(parse_session).collect())
}

fn parse_session(session: &Value) -> ActivitySession {
    let session_id = ["session_key", "session_id"]
        .iter()
        .find_map(|field| value_as_text(session.get(*field)))
        .filter(|id| !id.is_empty());

    ActivitySession {
        session_id,
        media_type: value_as_text(session.get("media_type")).unwrap_or_default(),
        series_title: value_as_text(session.get("grandparent_title"))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        external_id: tvdb_id_from_guids(session.get("grandparent_guids")),
        season: value_as_u32(session.get("parent_media_index")),
        episode: value_as_u32(session.get("media_index")),
        watched_percent: value_as_u32(session.get("progress_percent")).min(100) as u8,
    }
}

fn tvdb_id_from_guids(guids: Option<&Value>) -> Option<String> {
    guids?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find_map(|guid| guid.strip_prefix(TVDB_GUID_PREFIX))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn value_as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

// Tautulli sends most numbers as strings; anything unreadable counts as 0.
fn value_as_u32(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        Some(Value::String(text)) => {
            let text = text.trim();
            text.parse::<u32>()
                .ok()
                .or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite() && *n >= 0.0)
                        .map(|n| n as u32)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}
