use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channels::ChannelResolver;
use crate::gitlab::GitLabClient;
use crate::slack::{self, DIRECT_MESSAGE_CHANNEL, PRIVATE_GROUP_CHANNEL};
use crate::types::{ForwardOutcome, SlackCommand};

/// What the invoking user gets back. Every variant is sent with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    DirectMessageUnsupported,
    PrivateGroupUnsupported,
    NotLinked,
    ProjectNotFound,
    UpstreamError,
    /// GitLab's own answer, relayed byte for byte.
    PassThrough(Vec<u8>),
}

impl CommandReply {
    pub fn into_body(self) -> Vec<u8> {
        let text = match self {
            CommandReply::PassThrough(body) => return body,
            CommandReply::DirectMessageUnsupported => slack::DIRECT_MESSAGE,
            CommandReply::PrivateGroupUnsupported => slack::PRIVATE_GROUP,
            CommandReply::NotLinked => slack::CHANNEL_NOT_LINKED,
            CommandReply::ProjectNotFound => slack::PROJECT_NOT_FOUND,
            CommandReply::UpstreamError => slack::UNKNOWN_ERROR,
        };
        slack::ephemeral_response(text).into_bytes()
    }
}

impl From<ForwardOutcome> for CommandReply {
    fn from(outcome: ForwardOutcome) -> Self {
        match outcome {
            ForwardOutcome::PassThrough(body) => CommandReply::PassThrough(body),
            ForwardOutcome::NotFound => CommandReply::ProjectNotFound,
            ForwardOutcome::UpstreamError => CommandReply::UpstreamError,
        }
    }
}

/// Picks the target project for a slash command and relays it to GitLab.
#[derive(Clone)]
pub struct Dispatcher {
    gitlab: GitLabClient,
    channels: Arc<dyn ChannelResolver>,
}

impl Dispatcher {
    pub fn new(gitlab: GitLabClient, channels: Arc<dyn ChannelResolver>) -> Self {
        Self { gitlab, channels }
    }

    pub async fn dispatch(&self, mut command: SlackCommand) -> CommandReply {
        let project = match slack::parse_command_text(command.text()) {
            Some(target) => {
                command.set("text", target.remainder);
                target.project
            }
            None => match command.channel_name() {
                DIRECT_MESSAGE_CHANNEL => return CommandReply::DirectMessageUnsupported,
                PRIVATE_GROUP_CHANNEL => return CommandReply::PrivateGroupUnsupported,
                channel => match self.channels.resolve(channel).await {
                    Some(project) if !project.is_empty() => {
                        debug!(channel, %project, "Using project linked to channel");
                        project
                    }
                    _ => return CommandReply::NotLinked,
                },
            },
        };

        match self.gitlab.forward(&project, &command).await {
            Ok(outcome) => {
                info!(%project, outcome = outcome_kind(&outcome), "Forwarded slash command");
                outcome.into()
            }
            Err(err) => {
                error!(%project, error = ?err, "Forwarding slash command failed");
                CommandReply::UpstreamError
            }
        }
    }
}

fn outcome_kind(outcome: &ForwardOutcome) -> &'static str {
    match outcome {
        ForwardOutcome::PassThrough(_) => "pass_through",
        ForwardOutcome::NotFound => "not_found",
        ForwardOutcome::UpstreamError => "upstream_error",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::channels::{StaticChannelMap, UnlinkedChannels};

    fn trigger_path(escaped_project: &str) -> String {
        format!("/api/v4/projects/{escaped_project}/services/slack_slash_commands/trigger")
    }

    fn dispatcher(uri: &str, channels: Arc<dyn ChannelResolver>) -> Dispatcher {
        let gitlab = GitLabClient::new(uri, Duration::from_millis(300)).unwrap();
        Dispatcher::new(gitlab, channels)
    }

    fn linked(channel: &str, project: &str) -> Arc<dyn ChannelResolver> {
        Arc::new(StaticChannelMap::new(HashMap::from([(
            channel.to_string(),
            project.to_string(),
        )])))
    }

    fn command(channel_name: &str, text: &str) -> SlackCommand {
        [
            ("token", "tok"),
            ("team_id", "T1"),
            ("channel_name", channel_name),
            ("user_id", "U1"),
            ("text", text),
        ]
        .into_iter()
        .collect()
    }

    /// Serves one connection: reads the request, writes `reply` verbatim, closes.
    fn raw_reply_server(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 8192];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(reply);
                let _ = stream.flush();
            }
        });
        format!("http://{addr}")
    }

    /// A server that fails the test if it is ever called.
    async fn silent_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_parsed_project_is_forwarded_with_remainder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(trigger_path("group%2Fsub")))
            .and(body_string(
                "token=tok&team_id=T1&channel_name=general&user_id=U1&text=rest+of+cmd",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"text\":\"ok\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let reply = dispatcher(&server.uri(), Arc::new(UnlinkedChannels))
            .dispatch(command("general", "  group/sub  rest of cmd"))
            .await;
        assert_eq!(reply, CommandReply::PassThrough(b"{\"text\":\"ok\"}".to_vec()));
    }

    #[tokio::test]
    async fn test_parsed_project_wins_over_special_channels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(trigger_path("group%2Fproj")))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let dispatcher = dispatcher(&server.uri(), Arc::new(UnlinkedChannels));
        for channel in [DIRECT_MESSAGE_CHANNEL, PRIVATE_GROUP_CHANNEL] {
            let reply = dispatcher.dispatch(command(channel, "group/proj help")).await;
            assert_eq!(reply, CommandReply::ProjectNotFound);
        }
    }

    #[tokio::test]
    async fn test_direct_message_without_project() {
        let server = silent_server().await;
        let dispatcher = dispatcher(&server.uri(), linked(DIRECT_MESSAGE_CHANNEL, "group/proj"));
        for text in ["", "deploy", "help me"] {
            let reply = dispatcher.dispatch(command(DIRECT_MESSAGE_CHANNEL, text)).await;
            assert_eq!(reply, CommandReply::DirectMessageUnsupported);
        }
    }

    #[tokio::test]
    async fn test_private_group_without_project() {
        let server = silent_server().await;
        let reply = dispatcher(&server.uri(), linked(PRIVATE_GROUP_CHANNEL, "group/proj"))
            .dispatch(command(PRIVATE_GROUP_CHANNEL, "deploy"))
            .await;
        assert_eq!(reply, CommandReply::PrivateGroupUnsupported);
    }

    #[tokio::test]
    async fn test_unlinked_channel() {
        let server = silent_server().await;
        let reply = dispatcher(&server.uri(), linked("ops", "infra/deploy"))
            .dispatch(command("general", "deploy production"))
            .await;
        assert_eq!(reply, CommandReply::NotLinked);
    }

    #[tokio::test]
    async fn test_linked_channel_keeps_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(trigger_path("infra%2Fdeploy")))
            .and(body_string(
                "token=tok&team_id=T1&channel_name=ops&user_id=U1&text=deploy+production",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .expect(1)
            .mount(&server)
            .await;

        let reply = dispatcher(&server.uri(), linked("ops", "infra/deploy"))
            .dispatch(command("ops", "deploy production"))
            .await;
        assert_eq!(reply, CommandReply::PassThrough(b"done".to_vec()));
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let reply = dispatcher(&server.uri(), Arc::new(UnlinkedChannels))
            .dispatch(command("general", "group/proj deploy"))
            .await;
        assert_eq!(reply, CommandReply::UpstreamError);
    }

    #[tokio::test]
    async fn test_slow_gitlab_maps_to_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let reply = dispatcher(&server.uri(), Arc::new(UnlinkedChannels))
            .dispatch(command("general", "group/proj deploy"))
            .await;
        assert_eq!(reply, CommandReply::UpstreamError);
    }

    #[tokio::test]
    async fn test_malformed_gitlab_reply_maps_to_upstream_error() {
        let replies: [&'static [u8]; 2] = [
            b"NOT HTTP\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort",
        ];
        for reply in replies {
            let uri = raw_reply_server(reply);
            let outcome = dispatcher(&uri, Arc::new(UnlinkedChannels))
                .dispatch(command("general", "group/proj deploy"))
                .await;
            assert_eq!(
                outcome,
                CommandReply::UpstreamError,
                "{}",
                String::from_utf8_lossy(reply)
            );
        }
    }

    #[test]
    fn test_reply_bodies() {
        assert_eq!(
            CommandReply::NotLinked.into_body(),
            slack::ephemeral_response(slack::CHANNEL_NOT_LINKED).into_bytes()
        );
        assert_eq!(
            CommandReply::UpstreamError.into_body(),
            slack::ephemeral_response(slack::UNKNOWN_ERROR).into_bytes()
        );
        assert_eq!(
            CommandReply::PassThrough(b"raw bytes".to_vec()).into_body(),
            b"raw bytes".to_vec()
        );
    }
}
