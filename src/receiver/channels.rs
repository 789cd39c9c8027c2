use std::collections::HashMap;

use tracing::debug;

/// Looks up the project a Slack channel has been linked to.
#[async_trait::async_trait]
pub trait ChannelResolver: Send + Sync {
    /// `None` when the channel is not linked to a project.
    async fn resolve(&self, channel_name: &str) -> Option<String>;
}

/// Resolver for deployments without channel links.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlinkedChannels;

#[async_trait::async_trait]
impl ChannelResolver for UnlinkedChannels {
    async fn resolve(&self, _channel_name: &str) -> Option<String> {
        None
    }
}

/// Fixed channel links loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticChannelMap {
    projects: HashMap<String, String>,
}

impl StaticChannelMap {
    pub fn new(projects: HashMap<String, String>) -> Self {
        Self { projects }
    }
}

#[async_trait::async_trait]
impl ChannelResolver for StaticChannelMap {
    async fn resolve(&self, channel_name: &str) -> Option<String> {
        let project = self
            .projects
            .get(channel_name)
            .filter(|project| !project.is_empty())
            .cloned();
        debug!(channel_name, linked = project.is_some(), "Resolved channel");
        project
    }
}
