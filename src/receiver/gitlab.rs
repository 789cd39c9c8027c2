use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::ForwardError;
use crate::types::{ForwardOutcome, SlackCommand};

/// Calls GitLab's Slack slash command trigger for a project.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    base_url: String,
}

impl GitLabClient {
    /// `timeout` bounds each call as a whole, connect and body included.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn trigger_url(&self, project: &str) -> String {
        format!(
            "{}/api/v4/projects/{}/services/slack_slash_commands/trigger",
            self.base_url,
            urlencoding::encode(project)
        )
    }

    /// Posts the command form to the project's trigger, one attempt only.
    pub async fn forward(
        &self,
        project: &str,
        command: &SlackCommand,
    ) -> Result<ForwardOutcome, ForwardError> {
        let url = self.trigger_url(project);
        debug!(project, %url, "Forwarding slash command to GitLab");

        let response = self
            .client
            .post(&url)
            .form(command.fields())
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                debug!(project, bytes = body.len(), "GitLab handled slash command");
                Ok(ForwardOutcome::PassThrough(body.to_vec()))
            }
            StatusCode::NOT_FOUND => {
                debug!(project, "GitLab project has no slash command integration");
                Ok(ForwardOutcome::NotFound)
            }
            _ => {
                warn!(project, status = status.as_u16(), "Unexpected GitLab response status");
                Ok(ForwardOutcome::UpstreamError)
            }
        }
    }
}
