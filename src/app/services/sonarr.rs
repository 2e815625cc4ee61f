use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use super::{CatalogService, Series};
use crate::app::catalog::{EpisodeId, RawEpisode, SeriesId};
use crate::error::{SyncError, SyncResult};
use crate::http::JsonClient;

const SERVICE: &str = "sonarr";
const API_KEY_HEADER: &str = "X-Api-Key";
const EPISODE_SEARCH_COMMAND: &str = "EpisodeSearch";

#[derive(Debug, Clone)]
pub(crate) struct SonarrClient {
    http: JsonClient,
}

impl SonarrClient {
    pub(crate) fn new(url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http: JsonClient::new(SERVICE, url, timeout).with_header(API_KEY_HEADER, api_key),
        }
    }

    fn lookup(&self, term: &str) -> SyncResult<Vec<Series>> {
        let body = self.http.get("series/lookup", &[("term", term)])?;
        parse_library_series(&body)
    }
}

impl CatalogService for SonarrClient {
    fn lookup_series_by_external_id(&self, external_id: &str) -> SyncResult<Option<Series>> {
        let candidates = self.lookup(&format!("tvdb:{external_id}"))?;
        Ok(candidates
            .into_iter()
            .find(|series| series.external_id.as_deref() == Some(external_id)))
    }

    fn lookup_series_by_title(&self, title: &str) -> SyncResult<Vec<Series>> {
        self.lookup(title)
    }

    fn list_episodes(&self, series_id: SeriesId) -> SyncResult<Vec<RawEpisode>> {
        let body = self
            .http
            .get("episode", &[("seriesId", series_id.to_string().as_str())])?;
        serde_json::from_value(body).map_err(|err| SyncError::InvalidResponse {
            service: SERVICE,
            detail: format!("episode list for series {series_id}: {err}"),
        })
    }

    fn set_episode_monitored(&self, episode_id: EpisodeId, monitored: bool) -> SyncResult<()> {
        self.http.put(
            &format!("episode/{episode_id}"),
            &json!({ "monitored": monitored }),
        )?;
        Ok(())
    }

    fn trigger_search(&self, series_id: SeriesId, episode_ids: &[EpisodeId]) -> SyncResult<()> {
        let ids = episode_ids.iter().map(|id| id.0).collect::<Vec<_>>();
        let body = self.http.post(
            "command",
            &json!({ "name": EPISODE_SEARCH_COMMAND, "episodeIds": ids }),
        )?;
        let command_id = body.get("id").and_then(Value::as_i64);
        debug!(series_id = %series_id, ?command_id, "Queued Sonarr episode search");
        Ok(())
    }
}

/// Lookup results include shows Sonarr merely knows about; only entries with a
/// library `id` are series it actually manages.
pub(crate) fn parse_library_series(body: &Value) -> SyncResult<Vec<Series>> {
    let Some(items) = body.as_array() else {
        return Err(SyncError::InvalidResponse {
            service: SERVICE,
            detail: "series lookup did not return a list".to_string(),
        });
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item.get("id").and_then(Value::as_i64).filter(|id| *id > 0)?;
            let title = item.get("title").and_then(Value::as_str)?.to_string();
            let external_id = item
                .get("tvdbId")
                .and_then(Value::as_i64)
                .filter(|id| *id > 0)
                .map(|id| id.to_string());
            Some(Series {
                id: SeriesId(id),
                title,
                external_id,
            })
        })
        .collect())
}
