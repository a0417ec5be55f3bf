//! Inbound webhook payload decoding.
//!
//! Two shapes arrive from Slack: the urlencoded slash-command form and the
//! JSON `payload` body of interactive callbacks. Both normalize into an
//! [`Invocation`].
//!
//! Interactive callbacks carry the session key as their `callback_id`, so
//! decoding recovers the command, the originator and the conversation
//! partners from the key itself: `poll` for a single-user session,
//! `poll-U1-U2-U3` for a multi-party one.

use serde::Deserialize;
use serde_json::Value;

use slashkit_core::dispatch::Invocation;
use slashkit_core::session::KEY_SEPARATOR;
use slashkit_core::trigger::Trigger;

/// The form Slack posts for a slash command.
#[derive(Clone, Debug, Deserialize)]
pub struct SlashForm {
    #[serde(default)]
    pub token: Option<String>,
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
}

impl SlashForm {
    pub fn into_invocation(self) -> Invocation {
        let text = self.text.trim();
        let trigger = Trigger {
            command: self.command.trim_start_matches('/').to_owned(),
            user: self.user_id,
            team: self.team_id,
            text: (!text.is_empty()).then(|| text.to_owned()),
            channel: self.channel_id,
            ..Trigger::default()
        };
        Invocation { trigger, response_url: self.response_url, trigger_id: self.trigger_id }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserRef {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TeamRef {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAction {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// An attachment-button callback.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageCallback {
    #[serde(default)]
    pub token: Option<String>,
    pub callback_id: String,
    pub user: UserRef,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
}

/// A modal dialog submission. `state` names the action to run and
/// `submission` carries the form fields as its arguments.
#[derive(Clone, Debug, Deserialize)]
pub struct DialogCallback {
    #[serde(default)]
    pub token: Option<String>,
    pub callback_id: String,
    pub user: UserRef,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub submission: Value,
    #[serde(default)]
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractivePayload {
    InteractiveMessage(MessageCallback),
    DialogSubmission(DialogCallback),
}

impl InteractivePayload {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::InteractiveMessage(callback) => callback.token.as_deref(),
            Self::DialogSubmission(callback) => callback.token.as_deref(),
        }
    }

    pub fn into_invocation(self) -> Invocation {
        match self {
            Self::InteractiveMessage(callback) => {
                let mut trigger = trigger_from_callback_id(&callback.callback_id);
                trigger.user = callback.user.id;
                trigger.team = callback.team.map(|team| team.id);
                trigger.channel = callback.channel.map(|channel| channel.id);
                if let Some(action) = callback.actions.into_iter().next() {
                    apply_action_value(&mut trigger, &action);
                }
                Invocation {
                    trigger,
                    response_url: callback.response_url,
                    trigger_id: callback.trigger_id,
                }
            }
            Self::DialogSubmission(callback) => {
                let mut trigger = trigger_from_callback_id(&callback.callback_id);
                trigger.user = callback.user.id;
                trigger.team = callback.team.map(|team| team.id);
                trigger.channel = callback.channel.map(|channel| channel.id);
                trigger.action = callback.state;
                trigger.args = Some(callback.submission);
                Invocation { trigger, response_url: callback.response_url, trigger_id: None }
            }
        }
    }
}

/// Recovers the session shape from a stamped callback id.
fn trigger_from_callback_id(callback_id: &str) -> Trigger {
    let segments: Vec<&str> = callback_id.split(KEY_SEPARATOR).collect();
    let mut trigger = Trigger { command: segments[0].to_owned(), ..Trigger::default() };
    if segments.len() >= 2 {
        trigger.originator = Some(segments[1].to_owned());
        trigger.session_id = Some(callback_id.to_owned());
        trigger.conversation_with =
            segments[2..].iter().map(|segment| (*segment).to_owned()).collect();
    }
    trigger
}

/// Applies an interactive element's value using the button grammar:
/// `view:<name>` switches views, `action:<name>:<args>` invokes an action,
/// and anything else invokes the element's own name with the raw value.
fn apply_action_value(trigger: &mut Trigger, action: &RawAction) {
    let value = action.value.as_deref().unwrap_or("");
    if let Some(view) = value.strip_prefix("view:") {
        trigger.view = Some(view.to_owned());
        return;
    }
    if let Some(rest) = value.strip_prefix("action:") {
        let (name, args) = rest.split_once(':').unwrap_or((rest, ""));
        trigger.action = Some(name.to_owned());
        if !args.is_empty() {
            trigger.args = Some(
                serde_json::from_str(args).unwrap_or_else(|_| Value::String(args.to_owned())),
            );
        }
        return;
    }
    trigger.action = Some(action.name.clone());
    if !value.is_empty() {
        trigger.args =
            Some(serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned())));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{InteractivePayload, SlashForm};

    fn slash_form(command: &str, text: &str) -> SlashForm {
        SlashForm {
            token: Some("tok".to_owned()),
            command: command.to_owned(),
            text: text.to_owned(),
            user_id: "U1".to_owned(),
            team_id: Some("T1".to_owned()),
            channel_id: Some("C1".to_owned()),
            response_url: Some("https://hooks.example/1".to_owned()),
            trigger_id: Some("trig-1".to_owned()),
        }
    }

    #[test]
    fn slash_form_strips_the_slash_and_blank_text() {
        let invocation = slash_form("/todo", "  ").into_invocation();
        assert_eq!(invocation.trigger.command, "todo");
        assert_eq!(invocation.trigger.text, None);
        assert_eq!(invocation.trigger.team.as_deref(), Some("T1"));
        assert_eq!(invocation.trigger.channel.as_deref(), Some("C1"));
        assert_eq!(invocation.response_url.as_deref(), Some("https://hooks.example/1"));
        assert_eq!(invocation.trigger_id.as_deref(), Some("trig-1"));
    }

    #[test]
    fn slash_form_keeps_non_empty_text() {
        let invocation = slash_form("/todo", "add milk").into_invocation();
        assert_eq!(invocation.trigger.text.as_deref(), Some("add milk"));
    }

    fn decode(payload: serde_json::Value) -> InteractivePayload {
        serde_json::from_value(payload).expect("payload decodes")
    }

    #[test]
    fn single_session_callback_invokes_an_action() {
        let invocation = decode(json!({
            "type": "interactive_message",
            "token": "tok",
            "callback_id": "todo",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "channel": { "id": "C1" },
            "actions": [ { "name": "done", "value": "action:complete:{\"idx\":2}" } ],
            "response_url": "https://hooks.example/2"
        }))
        .into_invocation();

        let trigger = &invocation.trigger;
        assert_eq!(trigger.command, "todo");
        assert_eq!(trigger.session_id, None);
        assert_eq!(trigger.action.as_deref(), Some("complete"));
        assert_eq!(trigger.args, Some(json!({"idx": 2})));
        assert_eq!(trigger.team.as_deref(), Some("T1"));
    }

    #[test]
    fn multi_party_callback_recovers_the_session_shape() {
        let invocation = decode(json!({
            "type": "interactive_message",
            "callback_id": "poll-U1-U2-U3",
            "user": { "id": "U2" },
            "actions": [ { "name": "vote", "value": "action:vote" } ]
        }))
        .into_invocation();

        let trigger = &invocation.trigger;
        assert_eq!(trigger.command, "poll");
        assert_eq!(trigger.session_id.as_deref(), Some("poll-U1-U2-U3"));
        assert_eq!(trigger.originator.as_deref(), Some("U1"));
        assert_eq!(trigger.conversation_with, vec!["U2", "U3"]);
        assert_eq!(trigger.action.as_deref(), Some("vote"));
        assert_eq!(trigger.args, None);
    }

    #[test]
    fn view_values_switch_views_instead_of_running_actions() {
        let invocation = decode(json!({
            "type": "interactive_message",
            "callback_id": "poll-U1-U2",
            "user": { "id": "U1" },
            "actions": [ { "name": "nav", "value": "view:results" } ]
        }))
        .into_invocation();

        assert_eq!(invocation.trigger.view.as_deref(), Some("results"));
        assert_eq!(invocation.trigger.action, None);
    }

    #[test]
    fn bare_values_fall_back_to_the_element_name() {
        let invocation = decode(json!({
            "type": "interactive_message",
            "callback_id": "todo",
            "user": { "id": "U1" },
            "actions": [ { "name": "pick", "value": "milk" } ]
        }))
        .into_invocation();

        assert_eq!(invocation.trigger.action.as_deref(), Some("pick"));
        assert_eq!(invocation.trigger.args, Some(json!("milk")));
    }

    #[test]
    fn dialog_submissions_carry_the_form_fields_as_args() {
        let invocation = decode(json!({
            "type": "dialog_submission",
            "callback_id": "todo",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "state": "save",
            "submission": { "title": "milk", "qty": "2" }
        }))
        .into_invocation();

        let trigger = &invocation.trigger;
        assert_eq!(trigger.action.as_deref(), Some("save"));
        assert_eq!(trigger.args, Some(json!({"title": "milk", "qty": "2"})));
        assert_eq!(invocation.trigger_id, None);
    }
}
