//! Error types for the multiplexer.
//!
//! None of these reach Slack as text: configuration errors abort startup and
//! forwarding errors are logged and answered with a canned reply.

use thiserror::Error;

/// Startup configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GitLab URL configuration missing: set {0}")]
    MissingGitlabUrl(&'static str),

    #[error("Invalid GitLab URL {url:?}: {reason}")]
    InvalidGitlabUrl { url: String, reason: String },

    #[error("Invalid timeout {value:?} in {var}: expected a positive number of milliseconds")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("Invalid channel mapping entry {0:?}: expected channel=group/project")]
    InvalidChannelMapping(String),
}

/// Failures talking to GitLab that never produced a status code.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("GitLab request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Connection to GitLab failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("GitLab request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Could not read GitLab response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout(err)
        } else if err.is_connect() {
            ForwardError::Connect(err)
        } else if err.is_body() || err.is_decode() {
            ForwardError::Body(err)
        } else {
            ForwardError::Network(err)
        }
    }
}
