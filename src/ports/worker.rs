use async_trait::async_trait;
use eyre::Result;

use crate::utils::graceful_shutdown::ShutdownToken;

/// A long-running background service started and stopped by the [`Host`](crate::core::Host).
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Name used in lifecycle logs
    fn name(&self) -> &str;

    /// Run until `shutdown` fires. Returning an error stops the whole host.
    async fn run(&self, shutdown: ShutdownToken) -> Result<()>;
}
