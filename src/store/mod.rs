//! Storage backends implementing the session and student repository traits.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Liveness check used by `/health`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}
