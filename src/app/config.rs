use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::ledger::SessionKeyStrategy;
use super::policy::PolicyMode;
use crate::cli::Cli;
use crate::paths::config_file_path;

const DEFAULT_TAUTULLI_URL: &str = "http://localhost:8181/api/v2";
const DEFAULT_SONARR_URL: &str = "http://localhost:8989/api/v3";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    tautulli: TautulliSection,
    sonarr: SonarrSection,
    policy: PolicySection,
    poll: PollSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TautulliSection {
    url: String,
    api_key: String,
}

impl Default for TautulliSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_TAUTULLI_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SonarrSection {
    url: String,
    api_key: String,
}

impl Default for SonarrSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_SONARR_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicySection {
    monitor_entire_series: bool,
    monitor_next_season: bool,
    monitor_entire_season: bool,
    episodes_to_monitor: usize,
    watched_percentage: u8,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            monitor_entire_series: false,
            monitor_next_season: false,
            monitor_entire_season: false,
            episodes_to_monitor: 5,
            watched_percentage: 70,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PollSection {
    interval_secs: u64,
    request_timeout_secs: u64,
    session_key: SessionKeyStrategy,
    evict_after_missed_polls: u32,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            request_timeout_secs: 10,
            session_key: SessionKeyStrategy::default(),
            evict_after_missed_polls: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceEndpoint {
    pub(crate) url: String,
    pub(crate) api_key: String,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) tautulli: ServiceEndpoint,
    pub(crate) sonarr: ServiceEndpoint,
    pub(crate) mode: PolicyMode,
    pub(crate) watched_percentage: u8,
    pub(crate) interval: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) session_keys: SessionKeyStrategy,
    pub(crate) evict_after_missed_polls: u32,
}

pub(crate) fn load(cli: &Cli) -> Result<Config> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (config_file_path()?, false),
    };
    let file = read_file_config(&path, explicit)?;
    resolve(file, cli).with_context(|| format!("invalid configuration ({})", path.display()))
}

fn read_file_config(path: &Path, explicit: bool) -> Result<FileConfig> {
    if !path.exists() {
        if explicit {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(FileConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_file_config(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn parse_file_config(raw: &str) -> Result<FileConfig> {
    Ok(toml::from_str::<FileConfig>(raw)?)
}

fn resolve(mut file: FileConfig, cli: &Cli) -> Result<Config> {
    override_with(&mut file.tautulli.url, &cli.tautulli_url);
    override_with(&mut file.tautulli.api_key, &cli.tautulli_api_key);
    override_with(&mut file.sonarr.url, &cli.sonarr_url);
    override_with(&mut file.sonarr.api_key, &cli.sonarr_api_key);
    if let Some(secs) = cli.interval_secs {
        file.poll.interval_secs = secs;
    }
    if let Some(percent) = cli.watched_percentage {
        file.policy.watched_percentage = percent;
    }

    if file.tautulli.url.trim().is_empty() {
        bail!("tautulli.url must not be empty");
    }
    if file.sonarr.url.trim().is_empty() {
        bail!("sonarr.url must not be empty");
    }
    if file.policy.watched_percentage > 100 {
        bail!(
            "policy.watched_percentage must be between 0 and 100, got {}",
            file.policy.watched_percentage
        );
    }
    if file.poll.interval_secs == 0 {
        bail!("poll.interval_secs must be at least 1");
    }
    if file.poll.request_timeout_secs == 0 {
        bail!("poll.request_timeout_secs must be at least 1");
    }

    let policy = &file.policy;
    Ok(Config {
        mode: PolicyMode::from_toggles(
            policy.monitor_entire_series,
            policy.monitor_next_season,
            policy.monitor_entire_season,
            policy.episodes_to_monitor,
        ),
        watched_percentage: policy.watched_percentage,
        interval: Duration::from_secs(file.poll.interval_secs),
        request_timeout: Duration::from_secs(file.poll.request_timeout_secs),
        session_keys: file.poll.session_key,
        evict_after_missed_polls: file.poll.evict_after_missed_polls,
        tautulli: ServiceEndpoint {
            url: file.tautulli.url,
            api_key: file.tautulli.api_key,
        },
        sonarr: ServiceEndpoint {
            url: file.sonarr.url,
            api_key: file.sonarr.api_key,
        },
    })
}

fn override_with(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}
