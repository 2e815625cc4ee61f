mod catalog;
mod config;
mod ledger;
mod policy;
mod poll;
mod services;


use std::thread;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use crate::cli::Cli;

use self::config::Config;
use self::poll::{PollCycle, PollSettings, PollState};
use self::services::{ActivitySource, CatalogService, SonarrClient, TautulliClient};

pub fn run(cli: Cli) -> Result<()> {
    let config = config::load(&cli)?;
    let activity = TautulliClient::new(
        &config.tautulli.url,
        &config.tautulli.api_key,
        config.request_timeout,
    );
    let catalog = SonarrClient::new(
        &config.sonarr.url,
        &config.sonarr.api_key,
        config.request_timeout,
    );

    info!(
        mode = %config.mode,
        watched_percentage = config.watched_percentage,
        interval_secs = config.interval.as_secs(),
        session_keys = ?config.session_keys,
        "Chronicle started"
    );

    let mut poller = PollCycle::new(poll_settings(&config));
    loop {
        run_cycle(&mut poller, &activity, &catalog);
        if cli.run_once() {
            return Ok(());
        }

        info!("Sleeping for {} seconds...", config.interval.as_secs());
        thread::sleep(config.interval);
    }
}

fn poll_settings(config: &Config) -> PollSettings {
    PollSettings {
        mode: config.mode,
        watched_percentage: config.watched_percentage,
        session_keys: config.session_keys,
        evict_after_missed_polls: config.evict_after_missed_polls,
    }
}

fn run_cycle(poller: &mut PollCycle, activity: &dyn ActivitySource, catalog: &dyn CatalogService) {
    match poller.run_cycle(activity, catalog) {
        Ok(report) => {
            let elapsed_ms = (Utc::now() - report.started_at).num_milliseconds();
            info!(
                sessions = report.sessions_seen,
                processed = report.sessions_processed,
                skipped = report.sessions_skipped,
                failed = report.sessions_failed,
                monitored = report.episodes_monitored,
                searches = report.searches_triggered,
                evicted = report.sessions_evicted,
                ledger_sessions = poller.ledger().len(),
                elapsed_ms,
                "Poll cycle finished"
            );
        }
        Err(err) => error!(error = %err, "Error fetching activity; skipping this poll"),
    }
    debug_assert_eq!(poller.state(), PollState::Idle);
}
