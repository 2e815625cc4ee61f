use std::fmt;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EpisodeId(pub(crate) i64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SeriesId(pub(crate) i64);

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Episode record as the catalog reports it. Every field is optional here so a
/// malformed record can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEpisode {
    pub(crate) id: Option<i64>,
    pub(crate) season_number: Option<u32>,
    pub(crate) episode_number: Option<u32>,
    #[serde(default)]
    pub(crate) has_file: bool,
    #[serde(default)]
    pub(crate) monitored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Episode {
    pub(crate) id: EpisodeId,
    pub(crate) season: u32,
    pub(crate) number: u32,
    pub(crate) has_file: bool,
    pub(crate) monitored: bool,
}

impl Episode {
    pub(crate) fn position(&self) -> (u32, u32) {
        (self.season, self.number)
    }

    /// `2x05` style label used in log lines.
    pub(crate) fn label(&self) -> String {
        format!("{}x{:02}", self.season, self.number)
    }
}

/// Canonical traversal order for a series: specials dropped, sorted by
/// (season, episode). Any record without an id, season or episode number, or
/// two records claiming the same slot, rejects the whole list.
pub(crate) fn normalize(series_id: SeriesId, raw: Vec<RawEpisode>) -> SyncResult<Vec<Episode>> {
    let mut episodes = Vec::with_capacity(raw.len());
    for (index, record) in raw.into_iter().enumerate() {
        let invalid = |what: &str| SyncError::InvalidCatalogData {
            series_id: series_id.0,
            detail: format!("episode record #{index} is missing its {what}"),
        };
        let id = record.id.ok_or_else(|| invalid("id"))?;
        let season = record.season_number.ok_or_else(|| invalid("season number"))?;
        let number = record
            .episode_number
            .ok_or_else(|| invalid("episode number"))?;

        if season == 0 {
            continue;
        }

        episodes.push(Episode {
            id: EpisodeId(id),
            season,
            number,
            has_file: record.has_file,
            monitored: record.monitored,
        });
    }

    episodes.sort_by_key(Episode::position);

    if let Some(pair) = episodes
        .windows(2)
        .find(|pair| pair[0].position() == pair[1].position())
    {
        return Err(SyncError::InvalidCatalogData {
            series_id: series_id.0,
            detail: format!(
                "episodes {} and {} both claim {}",
                pair[0].id,
                pair[1].id,
                pair[0].label()
            ),
        });
    }

    Ok(episodes)
}

pub(crate) fn last_episode_number(episodes: &[Episode], season: u32) -> Option<u32> {
    episodes
        .iter()
        .filter(|episode| episode.season == season)
        .map(|episode| episode.number)
        .max()
}
