//! Base channel trait

use crate::error::Result;
use async_trait::async_trait;

/// A messaging platform the engine can live on
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the name of this channel
    fn name(&self) -> &str;

    /// Start the channel (begin receiving messages)
    async fn start(&self) -> Result<()>;

    /// Stop the channel
    async fn stop(&self) -> Result<()>;

    /// Check if the channel is enabled
    fn is_enabled(&self) -> bool;
}
