//! Startup configuration, read once from the environment.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::slack::is_namespaced_project;

pub const GITLAB_URL_VAR: &str = "GITLAB_URL";
pub const GITLAB_TIMEOUT_VAR: &str = "GITLAB_TIMEOUT_MS";
pub const CHANNEL_PROJECTS_VAR: &str = "SLACK_CHANNEL_PROJECTS";

/// Slack gives slash commands 3 seconds; GitLab has to answer well inside it.
pub const DEFAULT_GITLAB_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the GitLab instance, without trailing slash.
    pub gitlab_url: String,
    /// Upper bound for one trigger call, connect included.
    pub gitlab_timeout: Duration,
    /// Channel name to namespaced project.
    pub channel_projects: HashMap<String, String>,
}

impl Config {
    pub fn new(gitlab_url: &str) -> Result<Self, ConfigError> {
        let trimmed = gitlab_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::MissingGitlabUrl(GITLAB_URL_VAR));
        }
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidGitlabUrl {
            url: gitlab_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidGitlabUrl {
                url: gitlab_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        Ok(Self {
            gitlab_url: trimmed.to_string(),
            gitlab_timeout: DEFAULT_GITLAB_TIMEOUT,
            channel_projects: HashMap::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.gitlab_timeout = timeout;
        self
    }

    pub fn with_channel_projects(mut self, channel_projects: HashMap<String, String>) -> Self {
        self.channel_projects = channel_projects;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gitlab_url = lookup(GITLAB_URL_VAR).unwrap_or_default();
        let mut config = Self::new(&gitlab_url)?;

        if let Some(raw) = lookup(GITLAB_TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            config = config.with_timeout(parse_timeout(&raw)?);
        }

        if let Some(raw) = lookup(CHANNEL_PROJECTS_VAR) {
            config = config.with_channel_projects(parse_channel_projects(&raw)?);
        }

        debug!(
            gitlab_url = %config.gitlab_url,
            timeout_ms = config.gitlab_timeout.as_millis() as u64,
            linked_channels = config.channel_projects.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidTimeout {
            var: GITLAB_TIMEOUT_VAR,
            value: raw.to_string(),
        }),
    }
}

/// Parses `general=group/proj, ops=infra/deploy`.
fn parse_channel_projects(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut mapping = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (channel, project) = entry
            .split_once('=')
            .map(|(c, p)| (c.trim(), p.trim()))
            .ok_or_else(|| ConfigError::InvalidChannelMapping(entry.to_string()))?;
        if channel.is_empty() || !is_namespaced_project(project) {
            return Err(ConfigError::InvalidChannelMapping(entry.to_string()));
        }
        if let Some(previous) = mapping.insert(channel.to_string(), project.to_string()) {
            warn!(channel, previous = %previous, project, "Channel mapped twice, keeping the last project");
        }
    }
    Ok(mapping)
}
