//! The messaging platform client, specified at its interface boundary.
//!
//! `slashkit-slack` implements this against the Slack Web API; core tests
//! run against recording stubs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::views::Message;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub image_48: Option<String>,
}

/// The invoking user, optionally enriched with their platform profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedUser {
    pub slack_id: String,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform call `{method}` failed: {detail}")]
    Api { method: String, detail: String },
    #[error("platform transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Opens (or resumes) a one-to-one conversation, returning the channel id.
    async fn open_im(&self, user: &str) -> Result<String, PlatformError>;

    /// Opens a group conversation spanning `users`, returning the channel id.
    async fn open_mpim(&self, users: &[String], as_bot: bool) -> Result<String, PlatformError>;

    async fn post_message(
        &self,
        channel: &str,
        message: &Message,
        as_bot: bool,
    ) -> Result<(), PlatformError>;

    /// Posts a message visible only to `user` in `channel`.
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &Message,
        as_bot: bool,
    ) -> Result<(), PlatformError>;

    /// Opens a modal dialog keyed to an interaction trigger id.
    async fn open_modal(&self, trigger_id: &str, message: &Message) -> Result<(), PlatformError>;

    /// Lowest-latency reply path: POST straight back to the webhook's
    /// response URL.
    async fn post_response_url(&self, url: &str, message: &Message)
        -> Result<(), PlatformError>;

    async fn get_profile(&self, user: &str) -> Result<UserProfile, PlatformError>;

    /// Whether this client can send as the bot identity.
    fn has_bot_credential(&self) -> bool;
}

/// Per-tenant client lookup. Multi-tenant deployments resolve a workspace
/// credential by team id; everything else falls back to the app client.
pub trait TenantClients: Send + Sync {
    fn client_for(&self, team: Option<&str>) -> Arc<dyn PlatformClient>;
}

/// Single-workspace wiring: every trigger uses the same client.
pub struct SingleTenant {
    client: Arc<dyn PlatformClient>,
}

impl SingleTenant {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }
}

impl TenantClients for SingleTenant {
    fn client_for(&self, _team: Option<&str>) -> Arc<dyn PlatformClient> {
        Arc::clone(&self.client)
    }
}
