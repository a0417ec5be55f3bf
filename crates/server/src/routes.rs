//! The webhook surface.
//!
//! Slack posts slash commands as urlencoded forms to `/slash` and
//! interactive callbacks (with a JSON `payload` field) to `/action`. Both
//! verify the shared webhook token, hand the invocation to the dispatcher
//! and acknowledge with an empty body; only configuration mistakes (an
//! unregistered command, action or view) surface as an error status.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use slashkit_core::Dispatcher;
use slashkit_slack::payload::{InteractivePayload, SlashForm};

#[derive(Clone)]
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub verification_token: Option<SecretString>,
}

impl ServerState {
    fn token_ok(&self, provided: Option<&str>) -> bool {
        match &self.verification_token {
            None => true,
            Some(expected) => provided == Some(expected.expose_secret()),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/slash", post(slash))
        .route("/action", post(action))
        .with_state(state)
}

async fn ping() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn slash(State(state): State<ServerState>, Form(form): Form<SlashForm>) -> StatusCode {
    if !state.token_ok(form.token.as_deref()) {
        tracing::warn!(command = %form.command, "slash webhook token mismatch");
        return StatusCode::UNAUTHORIZED;
    }
    acknowledge(&state, form.into_invocation()).await
}

/// Interactive webhooks wrap their JSON in a `payload` form field.
#[derive(Debug, Deserialize)]
struct ActionForm {
    payload: String,
}

async fn action(State(state): State<ServerState>, Form(form): Form<ActionForm>) -> StatusCode {
    let payload: InteractivePayload = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "undecodable interactive payload");
            return StatusCode::BAD_REQUEST;
        }
    };
    if !state.token_ok(payload.token()) {
        tracing::warn!("interactive webhook token mismatch");
        return StatusCode::UNAUTHORIZED;
    }
    acknowledge(&state, payload.into_invocation()).await
}

async fn acknowledge(
    state: &ServerState,
    invocation: slashkit_core::Invocation,
) -> StatusCode {
    match state.dispatcher.dispatch_logged(invocation).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "webhook named unconfigured command, action or view");
            StatusCode::NOT_FOUND
        }
    }
}
