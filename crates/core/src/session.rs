//! Session identity resolution.
//!
//! A session key is the command name alone for single-party commands, or
//! `command-inviter-partner…` for multi-party conversations. The multi-party
//! form is deterministic but order-sensitive: the same participants listed
//! in a different order produce a different key. That matches the recorded
//! behavior of existing installs and is deliberately not canonicalized.

use crate::trigger::Trigger;

pub const KEY_SEPARATOR: &str = "-";

/// True iff the trigger spans a multi-party conversation.
pub fn is_multi_conversation(trigger: &Trigger) -> bool {
    !trigger.conversation_with.is_empty()
}

/// True for single-party sessions; for multi-party sessions, true iff the
/// invoking user started the session.
pub fn is_originator(trigger: &Trigger) -> bool {
    if !is_multi_conversation(trigger) {
        return true;
    }
    trigger.originator.as_deref() == Some(trigger.user.as_str())
}

/// Computes the canonical session key for a trigger.
///
/// An explicit session id from a platform callback wins verbatim for
/// multi-party triggers; otherwise the key is synthesized from the command,
/// the inviter and the partners in trigger order.
pub fn session_key(trigger: &Trigger) -> String {
    if !is_multi_conversation(trigger) {
        return trigger.command.clone();
    }
    if let Some(session_id) = &trigger.session_id {
        return session_id.clone();
    }
    let mut parts = Vec::with_capacity(trigger.conversation_with.len() + 2);
    parts.push(trigger.command.as_str());
    parts.push(trigger.user.as_str());
    parts.extend(trigger.conversation_with.iter().map(String::as_str));
    parts.join(KEY_SEPARATOR)
}

/// The full lookup discipline for a session: multi-party sessions are
/// addressed by key alone, single-party ones by key + user (+ tenant).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionScope {
    pub session_id: String,
    pub user: String,
    pub team: Option<String>,
    pub multi: bool,
}

impl SessionScope {
    pub fn of(trigger: &Trigger) -> Self {
        Self {
            session_id: session_key(trigger),
            user: trigger.user.clone(),
            team: trigger.team.clone(),
            multi: is_multi_conversation(trigger),
        }
    }

    /// Tenant compatibility: a record without a recorded tenant predates
    /// multi-tenant support and matches any tenant-scoped lookup.
    pub fn team_matches(&self, record_team: Option<&str>) -> bool {
        match record_team {
            None => true,
            Some(team) => self.team.as_deref() == Some(team),
        }
    }
}
