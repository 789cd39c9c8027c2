use serde::{Deserialize, Serialize};

/// Slash command form as posted by Slack.
///
/// Kept as ordered pairs so fields we do not know about (`token`, `team_id`,
/// `response_url`, ...) reach GitLab unchanged and in their original order.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SlackCommand {
    fields: Vec<(String, String)>,
}

impl SlackCommand {
    pub fn from_urlencoded(body: &[u8]) -> Result<Self, serde_urlencoded::de::Error> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
        Ok(Self { fields })
    }

    /// First value for `name`, or an empty string when the field is absent.
    pub fn get(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// Replaces every value of `name` with a single one, appending the field
    /// when it was missing.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter().position(|(key, _)| key == name) {
            Some(index) => {
                self.fields[index].1 = value;
                let mut seen = 0;
                self.fields.retain(|(key, _)| {
                    if key != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn channel_name(&self) -> &str {
        self.get("channel_name")
    }

    pub fn text(&self) -> &str {
        self.get("text")
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SlackCommand {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Project token split off the front of the command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    pub project: String,
    pub remainder: String,
}

/// What GitLab answered for a forwarded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 200: the body is already a Slack payload and is relayed untouched.
    PassThrough(Vec<u8>),
    NotFound,
    UpstreamError,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SlackResponse {
    pub response_type: ResponseType,
    pub text: String,
}

impl SlackResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: text.into(),
        }
    }
}
