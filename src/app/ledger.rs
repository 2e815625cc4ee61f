use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Deserialize;

use super::catalog::{EpisodeId, SeriesId};

/// Identifies one viewing session for ledger bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SessionKey {
    SeriesSeason { series_id: SeriesId, season: u32 },
    Session { series_id: SeriesId, session_id: String },
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeriesSeason { series_id, season } => {
                write!(f, "series {series_id} season {season}")
            }
            Self::Session {
                series_id,
                session_id,
            } => write!(f, "series {series_id} session {session_id}"),
        }
    }
}

/// How a [`SessionKey`] is derived. `SeriesSeason` lets concurrent viewers of
/// the same season share one ledger entry; `Session` keeps them apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum SessionKeyStrategy {
    #[default]
    SeriesSeason,
    Session,
}

impl SessionKeyStrategy {
    pub(crate) fn derive(
        self,
        series_id: SeriesId,
        season: u32,
        session_id: Option<&str>,
    ) -> SessionKey {
        match (self, session_id.map(str::trim)) {
            (Self::Session, Some(session_id)) if !session_id.is_empty() => SessionKey::Session {
                series_id,
                session_id: session_id.to_string(),
            },
            _ => SessionKey::SeriesSeason { series_id, season },
        }
    }
}

#[derive(Debug, Default)]
struct LedgerEntry {
    selected: HashSet<EpisodeId>,
    missed_polls: u32,
}

/// Read-only slice of the ledger for one session key, handed to the
/// selection engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LedgerView<'a> {
    selected: Option<&'a HashSet<EpisodeId>>,
}

impl LedgerView<'_> {
    pub(crate) fn contains(&self, episode_id: EpisodeId) -> bool {
        self.selected
            .is_some_and(|selected| selected.contains(&episode_id))
    }

    pub(crate) fn len(&self) -> usize {
        self.selected.map_or(0, HashSet::len)
    }
}

/// In-memory record of the episodes already selected per session. Only ever
/// touched from the poll loop, so there is no locking.
#[derive(Debug, Default)]
pub(crate) struct MonitoringLedger {
    entries: HashMap<SessionKey, LedgerEntry>,
}

impl MonitoringLedger {
    pub(crate) fn already_selected(&self, key: &SessionKey, episode_id: EpisodeId) -> bool {
        self.selected_set(key).contains(episode_id)
    }

    /// Returns `true` when the id was not yet recorded for this key.
    pub(crate) fn record_selected(&mut self, key: &SessionKey, episode_id: EpisodeId) -> bool {
        self.entries
            .entry(key.clone())
            .or_default()
            .selected
            .insert(episode_id)
    }

    pub(crate) fn record_all<I>(&mut self, key: &SessionKey, episode_ids: I) -> usize
    where
        I: IntoIterator<Item = EpisodeId>,
    {
        episode_ids
            .into_iter()
            .filter(|episode_id| self.record_selected(key, *episode_id))
            .count()
    }

    pub(crate) fn selected_set(&self, key: &SessionKey) -> LedgerView<'_> {
        LedgerView {
            selected: self.entries.get(key).map(|entry| &entry.selected),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn tracks(&self, key: &SessionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Closes a completed poll cycle. Keys seen this cycle reset their miss
    /// counter; others count one more miss and are evicted once they reach
    /// `evict_after_missed_polls`. Zero disables eviction.
    pub(crate) fn end_cycle(
        &mut self,
        observed: &HashSet<SessionKey>,
        evict_after_missed_polls: u32,
    ) -> Vec<SessionKey> {
        let mut evicted = Vec::new();
        self.entries.retain(|key, entry| {
            if observed.contains(key) {
                entry.missed_polls = 0;
                return true;
            }
            entry.missed_polls = entry.missed_polls.saturating_add(1);
            if evict_after_missed_polls > 0 && entry.missed_polls >= evict_after_missed_polls {
                evicted.push(key.clone());
                return false;
            }
            true
        });
        evicted
    }
}
