use anyhow::Result;

use async_trait::async_trait;
use slashkit_core::config::{AppOptions, LoadOptions};
use slashkit_core::errors::HookError;
use slashkit_core::handler::{Slash, SlashContext};
use slashkit_core::views::View;
use slashkit_server::{init_logging, AppBuilder};

/// Built-in smoke-test command: `/echo <text>` stores and repeats the last
/// thing each user said.
struct Echo;

#[async_trait]
impl Slash for Echo {
    async fn handle_text(&mut self, ctx: &mut SlashContext, text: &str) -> Result<(), HookError> {
        ctx.state().insert("last", serde_json::Value::String(text.to_owned()));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = AppOptions::load(LoadOptions::default())?;
    init_logging(&options);

    let app = AppBuilder::new(options)
        .command("echo", || Echo)
        .view(View::new(
            "echo",
            "you said: {{ state.last | default(value=\"nothing yet\") }}",
            false,
        ))
        .build()
        .await?;

    tracing::info!("slashkit-server started");
    app.serve().await
}
