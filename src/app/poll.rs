use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::catalog::{Episode, EpisodeId, SeriesId, normalize};
use super::ledger::{MonitoringLedger, SessionKey, SessionKeyStrategy};
use super::policy::{PlaybackPosition, PolicyMode, select};
use super::services::{ActivitySession, ActivitySource, CatalogService, Series};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollSettings {
    pub(crate) mode: PolicyMode,
    pub(crate) watched_percentage: u8,
    pub(crate) session_keys: SessionKeyStrategy,
    pub(crate) evict_after_missed_polls: u32,
}

/// Tally of one completed poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CycleReport {
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) sessions_seen: usize,
    pub(crate) sessions_processed: usize,
    pub(crate) sessions_skipped: usize,
    pub(crate) sessions_failed: usize,
    pub(crate) episodes_monitored: usize,
    pub(crate) searches_triggered: usize,
    pub(crate) sessions_evicted: usize,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            sessions_seen: 0,
            sessions_processed: 0,
            sessions_skipped: 0,
            sessions_failed: 0,
            episodes_monitored: 0,
            searches_triggered: 0,
            sessions_evicted: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionOutcome {
    NotQualified,
    Dispatched(Dispatch),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Dispatch {
    monitored: Vec<EpisodeId>,
    search_triggered: bool,
}

/// Identity of a session as the activity feed reports it, available before
/// the series is resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FeedKey {
    series: String,
    season: Option<u32>,
    session_id: Option<String>,
}

impl FeedKey {
    fn of(strategy: SessionKeyStrategy, session: &ActivitySession) -> Self {
        let series = match session.external_id.as_deref() {
            Some(external_id) => format!("tvdb:{external_id}"),
            None => session.series_title.to_lowercase(),
        };
        let session_id = match strategy {
            SessionKeyStrategy::Session => session
                .session_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            SessionKeyStrategy::SeriesSeason => None,
        };
        Self {
            series,
            season: session_id.is_none().then_some(session.season),
            session_id,
        }
    }
}

/// Drives poll cycles against the two collaborators and owns the ledger.
/// Cycles run one at a time on the caller's thread.
#[derive(Debug)]
pub(crate) struct PollCycle {
    settings: PollSettings,
    ledger: MonitoringLedger,
    // Ledger key each feed session last resolved to. A session that stays in
    // the feed keeps its entry alive while it is below threshold or failing.
    feed_keys: HashMap<FeedKey, SessionKey>,
    state: PollState,
}

impl PollCycle {
    pub(crate) fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            ledger: MonitoringLedger::default(),
            feed_keys: HashMap::new(),
            state: PollState::Idle,
        }
    }

    pub(crate) fn state(&self) -> PollState {
        self.state
    }

    pub(crate) fn ledger(&self) -> &MonitoringLedger {
        &self.ledger
    }

    /// Runs one full cycle. Only a failed activity fetch aborts the cycle;
    /// per-session failures are logged and counted.
    pub(crate) fn run_cycle(
        &mut self,
        activity: &dyn ActivitySource,
        catalog: &dyn CatalogService,
    ) -> SyncResult<CycleReport> {
        self.state = PollState::Processing;
        let mut report = CycleReport::new(Utc::now());

        info!("Checking current activity...");
        let sessions = match activity.current_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                self.state = PollState::Idle;
                return Err(err);
            }
        };

        report.sessions_seen = sessions.len();
        if sessions.is_empty() {
            info!("No active sessions found");
        } else {
            info!(count = sessions.len(), "Active sessions found");
        }

        let mut observed = HashSet::new();
        for session in &sessions {
            match self.process_session(session, catalog, &mut observed) {
                Ok(SessionOutcome::NotQualified) => {}
                Ok(SessionOutcome::Dispatched(dispatch)) => {
                    report.sessions_processed += 1;
                    report.episodes_monitored += dispatch.monitored.len();
                    if dispatch.search_triggered {
                        report.searches_triggered += 1;
                    }
                }
                Err(err) if err.is_lookup() => {
                    warn!(title = %session.series_title, error = %err, "Skipping session");
                    report.sessions_skipped += 1;
                }
                Err(err) => {
                    error!(
                        title = %session.series_title,
                        error = %err,
                        "Failed to process session"
                    );
                    report.sessions_failed += 1;
                }
            }

            if session.is_episode()
                && let Some(key) = self
                    .feed_keys
                    .get(&FeedKey::of(self.settings.session_keys, session))
            {
                observed.insert(key.clone());
            }
        }

        let evicted = self
            .ledger
            .end_cycle(&observed, self.settings.evict_after_missed_polls);
        for key in &evicted {
            info!(session = %key, "Evicted idle session from ledger");
        }
        report.sessions_evicted = evicted.len();
        let ledger = &self.ledger;
        self.feed_keys.retain(|_, key| ledger.tracks(key));

        self.state = PollState::Idle;
        Ok(report)
    }

    fn process_session(
        &mut self,
        session: &ActivitySession,
        catalog: &dyn CatalogService,
        observed: &mut HashSet<SessionKey>,
    ) -> SyncResult<SessionOutcome> {
        if !session.is_episode() {
            debug!(media_type = %session.media_type, "Ignoring non-episode session");
            return Ok(SessionOutcome::NotQualified);
        }
        if session.watched_percent < self.settings.watched_percentage {
            debug!(
                title = %session.series_title,
                progress = session.watched_percent,
                threshold = self.settings.watched_percentage,
                "Session below watched threshold"
            );
            return Ok(SessionOutcome::NotQualified);
        }

        info!(
            "Processing: {}, S{}E{} ({}% watched)",
            session.series_title, session.season, session.episode, session.watched_percent
        );

        let series = resolve_series(session, catalog)?;
        let episodes = normalize(series.id, catalog.list_episodes(series.id)?)?;

        let key = self.settings.session_keys.derive(
            series.id,
            session.season,
            session.session_id.as_deref(),
        );
        observed.insert(key.clone());
        self.feed_keys.insert(
            FeedKey::of(self.settings.session_keys, session),
            key.clone(),
        );

        let position = PlaybackPosition {
            series_id: series.id,
            season: session.season,
            episode: session.episode,
            watched_percent: session.watched_percent,
        };
        let ledger_view = self.ledger.selected_set(&key);
        debug!(
            session = %key,
            mode = %self.settings.mode,
            progress = position.watched_percent,
            already_selected = ledger_view.len(),
            "Selecting episodes"
        );
        let selected = select(self.settings.mode, &position, &episodes, ledger_view);
        debug_assert!(
            selected
                .iter()
                .all(|episode| !self.ledger.already_selected(&key, episode.id))
        );

        if selected.is_empty() {
            info!(
                series_id = %position.series_id,
                "Nothing new to monitor for {}",
                series.title
            );
            return Ok(SessionOutcome::Dispatched(Dispatch::default()));
        }

        info!("Monitoring {} of {}", self.settings.mode, series.title);
        // Record before dispatch so a failed or repeated request is never re-sent.
        self.ledger
            .record_all(&key, selected.iter().map(|episode| episode.id));

        Ok(SessionOutcome::Dispatched(dispatch(
            catalog,
            series.id,
            &selected,
        )))
    }
}

/// Exact external id first, then a case-insensitive exact title match.
pub(crate) fn resolve_series(
    session: &ActivitySession,
    catalog: &dyn CatalogService,
) -> SyncResult<Series> {
    if let Some(external_id) = session.external_id.as_deref() {
        if let Some(series) = catalog.lookup_series_by_external_id(external_id)? {
            return Ok(series);
        }
        debug!(
            external_id,
            title = %session.series_title,
            "No series for external id, trying title"
        );
    }

    let target = session.series_title.to_lowercase();
    let mut matches = catalog
        .lookup_series_by_title(&session.series_title)?
        .into_iter()
        .filter(|series| series.title.to_lowercase() == target)
        .collect::<Vec<_>>();
    matches.sort_by_key(|series| series.id);
    matches.dedup_by_key(|series| series.id);

    match matches.len() {
        0 => Err(SyncError::LookupNotFound {
            title: session.series_title.clone(),
            reason: match &session.external_id {
                Some(external_id) => {
                    format!("no series with TVDB id {external_id} or an exact title match")
                }
                None => "no TVDB id and no exact title match".to_string(),
            },
        }),
        1 => Ok(matches.remove(0)),
        candidates => Err(SyncError::LookupAmbiguous {
            title: session.series_title.clone(),
            candidates,
        }),
    }
}

/// Marks each episode monitored, then asks for one search covering the ones
/// that succeeded. A failed update only drops that episode from the search.
fn dispatch(catalog: &dyn CatalogService, series_id: SeriesId, selected: &[Episode]) -> Dispatch {
    let mut monitored = Vec::with_capacity(selected.len());
    let mut labels = Vec::with_capacity(selected.len());
    for episode in selected {
        match catalog.set_episode_monitored(episode.id, true) {
            Ok(()) => {
                monitored.push(episode.id);
                labels.push(episode.label());
            }
            Err(err) => {
                error!(
                    episode = %episode.label(),
                    episode_id = %episode.id,
                    error = %err,
                    "Failed to enable monitoring"
                );
            }
        }
    }

    if monitored.is_empty() {
        return Dispatch::default();
    }
    info!("Episodes marked for monitoring: {}", labels.join(", "));

    let search_triggered = match catalog.trigger_search(series_id, &monitored) {
        Ok(()) => {
            info!(count = monitored.len(), "Search triggered for monitored episodes");
            true
        }
        Err(err) => {
            error!(series_id = %series_id, error = %err, "Error triggering search for episodes");
            false
        }
    };

    Dispatch {
        monitored,
        search_triggered,
    }
}
