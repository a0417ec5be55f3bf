//! Slack transport for slashkit.
//!
//! This crate owns the two directions of the Slack integration:
//! - **Client** (`client`) - Web API calls (conversations.open, chat.postMessage,
//!   dialog.open, users.profile.get) plus response_url delivery
//! - **Payloads** (`payload`) - decoding slash-command form posts and
//!   interactive-message callbacks into command invocations

pub mod client;
pub mod payload;

pub use client::{SlackClient, SlackClientBuilder, SlackClients};
pub use payload::{InteractivePayload, SlashForm};
