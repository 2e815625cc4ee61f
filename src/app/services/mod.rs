mod sonarr;
mod tautulli;

pub(crate) use sonarr::SonarrClient;
pub(crate) use tautulli::TautulliClient;

use super::catalog::{EpisodeId, RawEpisode, SeriesId};
use crate::error::SyncResult;

/// One playback session as reported by the activity source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActivitySession {
    pub(crate) session_id: Option<String>,
    pub(crate) media_type: String,
    pub(crate) series_title: String,
    /// TVDB id of the show, when the media server knows it.
    pub(crate) external_id: Option<String>,
    pub(crate) season: u32,
    pub(crate) episode: u32,
    pub(crate) watched_percent: u8,
}

impl ActivitySession {
    pub(crate) fn is_episode(&self) -> bool {
        self.media_type == "episode"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Series {
    pub(crate) id: SeriesId,
    pub(crate) title: String,
    pub(crate) external_id: Option<String>,
}

pub(crate) trait ActivitySource {
    fn current_sessions(&self) -> SyncResult<Vec<ActivitySession>>;
}

pub(crate) trait CatalogService {
    fn lookup_series_by_external_id(&self, external_id: &str) -> SyncResult<Option<Series>>;

    /// Library series whose title loosely matches; the caller picks the exact one.
    fn lookup_series_by_title(&self, title: &str) -> SyncResult<Vec<Series>>;

    fn list_episodes(&self, series_id: SeriesId) -> SyncResult<Vec<RawEpisode>>;

    fn set_episode_monitored(&self, episode_id: EpisodeId, monitored: bool) -> SyncResult<()>;

    fn trigger_search(&self, series_id: SeriesId, episode_ids: &[EpisodeId]) -> SyncResult<()>;
}
