use thiserror::Error;

use crate::platform::PlatformError;
use crate::storage::StorageError;

/// Failure raised by a user-defined hook or action body.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(String);

impl HookError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<StorageError> for HookError {
    fn from(err: StorageError) -> Self {
        Self(err.to_string())
    }
}

impl From<PlatformError> for HookError {
    fn from(err: PlatformError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("invalid action arguments: {err}"))
    }
}

/// Transport preconditions, raised at the point of violation. They abort
/// only the transport step; state persisted beforehand stays persisted.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open a modal without a trigger id")]
    MissingTriggerId,
    #[error("cannot open a conversation as bot without a bot credential")]
    MissingBotCredential,
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Everything that can end a dispatch early.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command `{0}` is not configured on this server")]
    CommandNotConfigured(String),
    #[error("action `{action}` is not configured on the command `{command}`")]
    ActionNotConfigured { command: String, action: String },
    #[error("view `{0}` is not registered")]
    ViewNotRegistered(String),
    #[error("handler hook `{hook}` failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: HookError,
    },
    #[error("render failed for view `{view}`: {detail}")]
    Render { view: String, detail: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Configuration errors abort before any state mutation and map to a
    /// 404-equivalent signal at the webhook boundary.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CommandNotConfigured(_)
                | Self::ActionNotConfigured { .. }
                | Self::ViewNotRegistered(_)
        )
    }

    pub(crate) fn hook(hook: &'static str, source: HookError) -> Self {
        Self::Hook { hook, source }
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchError, HookError, TransportError};

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(DispatchError::CommandNotConfigured("poll".to_owned()).is_configuration());
        assert!(DispatchError::ActionNotConfigured {
            command: "poll".to_owned(),
            action: "vote".to_owned(),
        }
        .is_configuration());
        assert!(!DispatchError::from(TransportError::MissingTriggerId).is_configuration());
        assert!(!DispatchError::hook("init", HookError::msg("boom")).is_configuration());
    }
}
