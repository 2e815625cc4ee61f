use std::fmt;

use super::catalog::{Episode, SeriesId, last_episode_number};
use super::ledger::LedgerView;

/// Scope of episodes to monitor once a viewer crosses the watched threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PolicyMode {
    EntireSeries,
    NextSeason,
    EntireSeason,
    NextN(usize),
}

impl PolicyMode {
    /// Collapses the config toggles into one mode. When several toggles are
    /// set the broader one wins: series, then next season, then season.
    pub(crate) fn from_toggles(
        entire_series: bool,
        next_season: bool,
        entire_season: bool,
        episodes_to_monitor: usize,
    ) -> Self {
        if entire_series {
            Self::EntireSeries
        } else if next_season {
            Self::NextSeason
        } else if entire_season {
            Self::EntireSeason
        } else {
            Self::NextN(episodes_to_monitor)
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntireSeries => f.write_str("entire series"),
            Self::NextSeason => f.write_str("rest of season and next season"),
            Self::EntireSeason => f.write_str("rest of season"),
            Self::NextN(count) => write!(f, "next {count} episode(s)"),
        }
    }
}

/// Where a viewer currently is in a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaybackPosition {
    pub(crate) series_id: SeriesId,
    pub(crate) season: u32,
    pub(crate) episode: u32,
    pub(crate) watched_percent: u8,
}

impl PlaybackPosition {
    fn is_before(&self, episode: &Episode) -> bool {
        (self.season, self.episode) < episode.position()
    }

    fn is_later_in_season(&self, episode: &Episode) -> bool {
        episode.season == self.season && episode.number > self.episode
    }

    fn is_next_season(&self, episode: &Episode) -> bool {
        self.season.checked_add(1) == Some(episode.season)
    }
}

/// Computes the episodes to newly monitor. `episodes` must be the normalized
/// catalog for `position.series_id`; `ledger` is the selection history of the
/// viewing session. Pure: the caller records the result.
pub(crate) fn select(
    mode: PolicyMode,
    position: &PlaybackPosition,
    episodes: &[Episode],
    ledger: LedgerView<'_>,
) -> Vec<Episode> {
    let is_candidate = |episode: &&Episode| {
        !episode.has_file && !episode.monitored && !ledger.contains(episode.id)
    };

    match mode {
        PolicyMode::EntireSeries => episodes.iter().filter(is_candidate).cloned().collect(),
        PolicyMode::NextSeason => episodes
            .iter()
            .filter(|episode| {
                position.is_later_in_season(episode) || position.is_next_season(episode)
            })
            .filter(is_candidate)
            .cloned()
            .collect(),
        PolicyMode::EntireSeason => {
            let finished_season =
                last_episode_number(episodes, position.season) == Some(position.episode);
            episodes
                .iter()
                .filter(|episode| {
                    position.is_later_in_season(episode)
                        || (finished_season && position.is_next_season(episode))
                })
                .filter(is_candidate)
                .cloned()
                .collect()
        }
        // The window is the next `count` episodes in air order, candidates or not.
        PolicyMode::NextN(count) => episodes
            .iter()
            .filter(|episode| position.is_before(episode))
            .take(count)
            .filter(is_candidate)
            .cloned()
            .collect(),
    }
}
