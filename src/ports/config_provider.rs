use async_trait::async_trait;
use eyre::Result;
use tokio::sync::mpsc;

use crate::config::models::Settings;

/// Trait for configuration providers that can load and watch for configuration changes.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the current settings.
    async fn load_settings(&self) -> Result<Settings>;

    /// Return a channel that signals when the underlying sources have changed.
    /// The receiver should trigger a reload by calling `load_settings`.
    fn watch(&self) -> Result<mpsc::Receiver<()>>;
}
