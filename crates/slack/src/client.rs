//! Slack Web API client.
//!
//! One client per workspace credential. `SlackClients` adds the per-team
//! routing layer for multi-tenant installs: every workspace that completed
//! the OAuth install gets its own client keyed by team id, and anything
//! without a match falls back to the app-level client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use slashkit_core::platform::{PlatformClient, PlatformError, TenantClients, UserProfile};
use slashkit_core::views::Message;

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    app_token: SecretString,
    bot_token: Option<SecretString>,
}

pub struct SlackClientBuilder {
    base_url: String,
    app_token: SecretString,
    bot_token: Option<SecretString>,
}

impl SlackClientBuilder {
    pub fn new(app_token: SecretString) -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_owned(), app_token, bot_token: None }
    }

    pub fn bot_token(mut self, token: SecretString) -> Self {
        self.bot_token = Some(token);
        self
    }

    /// Points the client somewhere other than slack.com. Used by tests.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> SlackClient {
        SlackClient {
            http: reqwest::Client::new(),
            base_url: self.base_url,
            app_token: self.app_token,
            bot_token: self.bot_token,
        }
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<ChannelRef>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Deserialize)]
struct ChannelRef {
    id: String,
}

impl SlackClient {
    pub fn builder(app_token: SecretString) -> SlackClientBuilder {
        SlackClientBuilder::new(app_token)
    }

    fn token(&self, as_bot: bool) -> &SecretString {
        if as_bot {
            self.bot_token.as_ref().unwrap_or(&self.app_token)
        } else {
            &self.app_token
        }
    }

    async fn call(
        &self,
        method: &str,
        as_bot: bool,
        body: Value,
    ) -> Result<ApiEnvelope, PlatformError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token(as_bot).expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        if !envelope.ok {
            let detail = envelope.error.unwrap_or_else(|| "unknown error".to_owned());
            tracing::warn!(method, %detail, "slack api call failed");
            return Err(PlatformError::Api { method: method.to_owned(), detail });
        }
        Ok(envelope)
    }

    async fn open_conversation(&self, users: &str, as_bot: bool) -> Result<String, PlatformError> {
        let envelope =
            self.call("conversations.open", as_bot, json!({ "users": users })).await?;
        envelope.channel.map(|channel| channel.id).ok_or_else(|| PlatformError::Api {
            method: "conversations.open".to_owned(),
            detail: "response carried no channel".to_owned(),
        })
    }

    fn message_payload(channel: &str, message: &Message) -> Value {
        json!({
            "channel": channel,
            "text": message.text,
            "attachments": message.attachments,
        })
    }
}

#[async_trait]
impl PlatformClient for SlackClient {
    async fn open_im(&self, user: &str) -> Result<String, PlatformError> {
        self.open_conversation(user, false).await
    }

    async fn open_mpim(&self, users: &[String], as_bot: bool) -> Result<String, PlatformError> {
        self.open_conversation(&users.join(","), as_bot).await
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &Message,
        as_bot: bool,
    ) -> Result<(), PlatformError> {
        self.call("chat.postMessage", as_bot, Self::message_payload(channel, message)).await?;
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &Message,
        as_bot: bool,
    ) -> Result<(), PlatformError> {
        let mut payload = Self::message_payload(channel, message);
        payload["user"] = json!(user);
        self.call("chat.postEphemeral", as_bot, payload).await?;
        Ok(())
    }

    async fn open_modal(&self, trigger_id: &str, message: &Message) -> Result<(), PlatformError> {
        let dialog = message
            .modal
            .clone()
            .unwrap_or_else(|| json!({ "title": message.text, "callback_id": message.callback_id }));
        self.call("dialog.open", false, json!({ "trigger_id": trigger_id, "dialog": dialog }))
            .await?;
        Ok(())
    }

    async fn post_response_url(
        &self,
        url: &str,
        message: &Message,
    ) -> Result<(), PlatformError> {
        let response = self
            .http
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PlatformError::Api {
                method: "response_url".to_owned(),
                detail: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    async fn get_profile(&self, user: &str) -> Result<UserProfile, PlatformError> {
        let envelope =
            self.call("users.profile.get", false, json!({ "user": user })).await?;
        envelope.profile.ok_or_else(|| PlatformError::Api {
            method: "users.profile.get".to_owned(),
            detail: "response carried no profile".to_owned(),
        })
    }

    fn has_bot_credential(&self) -> bool {
        self.bot_token.is_some()
    }
}

/// Team-id keyed client routing for multi-tenant installs.
pub struct SlackClients {
    default: Arc<SlackClient>,
    per_team: Mutex<HashMap<String, Arc<SlackClient>>>,
}

impl SlackClients {
    pub fn new(default: Arc<SlackClient>) -> Self {
        Self { default, per_team: Mutex::new(HashMap::new()) }
    }

    /// Registers a workspace credential. The per-team client shares the
    /// default client's app token and endpoint and swaps in the workspace's
    /// bot token.
    pub fn register_team(&self, team: impl Into<String>, bot_token: SecretString) {
        let client = SlackClientBuilder::new(self.default.app_token.clone())
            .base_url(self.default.base_url.clone())
            .bot_token(bot_token)
            .build();
        self.register_team_client(team, Arc::new(client));
    }

    pub fn register_team_client(&self, team: impl Into<String>, client: Arc<SlackClient>) {
        let mut per_team = self.per_team.lock().unwrap_or_else(|poison| poison.into_inner());
        per_team.insert(team.into(), client);
    }

    pub fn team_count(&self) -> usize {
        self.per_team.lock().unwrap_or_else(|poison| poison.into_inner()).len()
    }
}

impl TenantClients for SlackClients {
    fn client_for(&self, team: Option<&str>) -> Arc<dyn PlatformClient> {
        let per_team = self.per_team.lock().unwrap_or_else(|poison| poison.into_inner());
        team.and_then(|team| per_team.get(team).cloned())
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;

    use slashkit_core::platform::{PlatformClient, TenantClients};
    use slashkit_core::views::Message;

    use super::{SlackClient, SlackClientBuilder, SlackClients};

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    fn app_client() -> SlackClient {
        SlackClientBuilder::new(secret("xapp-1")).build()
    }

    fn bot_client(token: &str) -> SlackClient {
        SlackClientBuilder::new(secret("xapp-1")).bot_token(secret(token)).build()
    }

    #[test]
    fn bot_credential_tracks_the_optional_token() {
        assert!(!app_client().has_bot_credential());
        assert!(bot_client("xoxb-1").has_bot_credential());
    }

    #[test]
    fn token_selection_prefers_the_bot_token_only_when_asked() {
        let client = bot_client("xoxb-1");
        assert_eq!(client.token(false).expose_secret(), "xapp-1");
        assert_eq!(client.token(true).expose_secret(), "xoxb-1");

        // Without a bot token the app token is all there is.
        assert_eq!(app_client().token(true).expose_secret(), "xapp-1");
    }

    #[test]
    fn message_payload_carries_text_and_attachments() {
        let payload =
            SlackClient::message_payload("C1", &Message::from_text("two options"));
        assert_eq!(payload["channel"], json!("C1"));
        assert_eq!(payload["text"], json!("two options"));
        assert_eq!(payload["attachments"][0]["text"], json!("two options"));
    }

    #[test]
    fn tenant_routing_prefers_the_registered_workspace() {
        let default = Arc::new(app_client());
        let clients = SlackClients::new(Arc::clone(&default));
        clients.register_team("T1", secret("xoxb-t1"));

        assert!(clients.client_for(Some("T1")).has_bot_credential());
        assert!(!clients.client_for(Some("T9")).has_bot_credential());
        assert!(!clients.client_for(None).has_bot_credential());
        assert_eq!(clients.team_count(), 1);
    }
}
