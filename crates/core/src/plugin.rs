//! App-level plugins.
//!
//! A plugin extends every registered command at once: it can provision its
//! own durable tables at startup and decorate each invocation context
//! before the command's own hooks run. Shared helpers are ordinary Rust
//! items exported by the plugin's crate; `decorate` is where a plugin wires
//! per-invocation data into the context.

use async_trait::async_trait;

use crate::errors::HookError;
use crate::handler::SlashContext;
use crate::storage::{SchemaExt, StorageError};

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provisions plugin-owned tables. Runs once at application startup,
    /// before any dispatch.
    async fn extend_db(&self, _schema: &dyn SchemaExt) -> Result<(), StorageError> {
        Ok(())
    }

    /// Runs against every invocation context after construction and before
    /// any command hook. The session state is not bound yet; decoration
    /// targets the trigger, privacy, statefulness and view selection.
    async fn decorate(&self, _ctx: &mut SlashContext) -> Result<(), HookError> {
        Ok(())
    }
}
