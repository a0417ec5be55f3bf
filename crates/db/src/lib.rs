//! SQLite persistence for slashkit sessions and workspace credentials.

pub mod connection;
pub mod schema;
pub mod session;
pub mod workspace;

pub use connection::{connect, connect_with_settings, DbPool, PoolSettings};
pub use schema::SqlSchema;
pub use session::SqlSessionRepository;
pub use workspace::{SqlWorkspaceRepository, WorkspaceRecord, WorkspaceRepository};
