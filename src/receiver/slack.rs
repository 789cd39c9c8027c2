use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ParsedTarget, SlackResponse};

pub const CHANNEL_NOT_LINKED: &str =
    "Please specify a namespaced project as first parameter! This channel isn't linked to a project.";
pub const DIRECT_MESSAGE: &str = "Please specify a namespaced project as first parameter!";
pub const PRIVATE_GROUP: &str = "Please specify a namespaced project as first parameter! Private channels don't yet support project binding.";
pub const PROJECT_NOT_FOUND: &str = "Ops! Looks like you're trying to access a project which hasn't been setup yet with a slack integration.";
pub const UNKNOWN_ERROR: &str = "Ops! Looks like something went wrong talking to GitLab!";

/// Channel names Slack reports for conversations that cannot be linked.
pub const DIRECT_MESSAGE_CHANNEL: &str = "directmessage";
pub const PRIVATE_GROUP_CHANNEL: &str = "privategroup";

/// One path segment of a namespaced project.
const SEGMENT: &str = r"[-A-Za-z0-9_]+";

/// ASCII whitespace only; a leading no-break space is not skipped.
const SPACE: &str = r"[\t\n\x0C\r ]";

/// `<ws>* segment(/segment)+ <ws>* remainder`, remainder may span lines.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s)\A{SPACE}*({SEGMENT}(?:/{SEGMENT})+){SPACE}*(.*)\z"))
        .expect("Invalid command regex")
});

static PROJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A{SEGMENT}(?:/{SEGMENT})+\z")).expect("Invalid project regex")
});

/// Splits a leading `group/project` token off the command text.
///
/// Returns `None` when the text does not start with a namespaced project,
/// a single segment such as `deploy` included.
pub fn parse_command_text(text: &str) -> Option<ParsedTarget> {
    let captures = COMMAND_RE.captures(text)?;
    Some(ParsedTarget {
        project: captures[1].to_string(),
        remainder: captures[2].trim_end_matches(is_space).to_string(),
    })
}

fn is_space(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' ')
}

/// Whether `value` is a namespaced project on its own, without remainder.
pub fn is_namespaced_project(value: &str) -> bool {
    PROJECT_RE.is_match(value)
}

/// Serialized `{"response_type":"ephemeral","text":...}` body.
pub fn ephemeral_response(text: &str) -> String {
    // A two-field struct of strings always serializes.
    serde_json::to_string(&SlackResponse::ephemeral(text)).unwrap_or_default()
}
