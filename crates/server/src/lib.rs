//! HTTP server and application wiring for slashkit.
//!
//! - **App** (`app`) - builder tying commands, views, storage and Slack
//!   credentials into a running dispatcher, plus programmatic emits
//! - **Routes** (`routes`) - the webhook surface: `/slash`, `/action`, `/ping`
//! - **Render** (`render`) - tera-backed view rendering

pub mod app;
pub mod render;
pub mod routes;

pub use app::{init_logging, App, AppBuilder, EmitOptions};
pub use render::TeraRenderer;
