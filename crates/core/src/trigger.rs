use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of credential used when the response has to open or post into
/// a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationAs {
    #[default]
    User,
    Bot,
}

/// The invocation envelope. One is built per inbound webhook (or
/// programmatic emit) and never mutated afterwards; everything the
/// lifecycle needs to know about "what happened" lives here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trigger {
    /// Invoked command name, without the leading slash.
    pub command: String,
    /// Slack id of the invoking user.
    pub user: String,
    /// Workspace (tenant) id, when known.
    pub team: Option<String>,
    /// Free text accompanying a plain slash invocation.
    pub text: Option<String>,
    /// Action name for interactive callbacks; `None` for plain invocations.
    pub action: Option<String>,
    /// Arguments attached to the action.
    pub args: Option<Value>,
    /// Users the conversation spans, besides the inviter. Non-empty makes
    /// this a multi-party session.
    pub conversation_with: Vec<String>,
    pub conversation_as: ConversationAs,
    /// Explicit session id, recovered from a callback reference.
    pub session_id: Option<String>,
    /// User who originally started a multi-party session.
    pub originator: Option<String>,
    /// Channel the command was invoked from, when the platform told us.
    pub channel: Option<String>,
    /// View switch requested by a `view:` interactive action.
    pub view: Option<String>,
}

impl Trigger {
    /// The accompanying text split on single spaces.
    pub fn text_args(&self) -> Vec<&str> {
        self.text.as_deref().map(|text| text.split(' ').collect()).unwrap_or_default()
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.text_args().first().copied()
    }
}
