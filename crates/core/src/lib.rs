//! Slash command dispatch core
//!
//! This crate contains the session and dispatch machinery of slashkit:
//! - **Trigger** (`trigger`) - the immutable invocation envelope
//! - **Session identity** (`session`) - session keys for single- and
//!   multi-party conversations
//! - **Session store** (`store`) - two-tier cache (process memory, then
//!   durable storage) with shared state containers
//! - **Handlers** (`handler`) - the `Slash` trait, per-type action tables
//!   and the per-invocation `SlashContext`
//! - **Lifecycle** (`dispatch`) - construct → init → resolve → body →
//!   persist → render → transport
//! - **Transport** (`transport`) - modal / response URL / ephemeral /
//!   channel post selection
//!
//! The HTTP surface, the Slack API client and the SQL storage live in
//! sibling crates; this crate only consumes their interfaces (`platform`,
//! `storage`, `views::Renderer`).
//!
//! # Key Types
//!
//! - `Trigger` - what came in over the webhook (or a programmatic emit)
//! - `Slash` - implemented by user commands; hooks are all optional
//! - `SessionStore` - owns the memory cache and the durable tier
//! - `Dispatcher` - the single entry point walking the lifecycle

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod handler;
pub mod platform;
pub mod plugin;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod transport;
pub mod trigger;
pub mod views;

pub use dispatch::{Dispatcher, Environment, Invocation};
pub use errors::{DispatchError, HookError, TransportError};
pub use handler::{Actions, CommandRegistry, Slash, SlashContext};
pub use plugin::Plugin;
pub use session::{is_multi_conversation, is_originator, session_key, SessionScope};
pub use state::{SharedState, StateMap};
pub use store::{MemoryCache, SessionStore};
pub use trigger::{ConversationAs, Trigger};
