use anyhow::Result;
use async_trait::async_trait;

use super::window::AttentionWindow;
use crate::models::AttentionBatch;

/// Collaborator that owns raw attention capture. The engine only ever
/// pulls one window's worth of events per cycle.
#[async_trait]
pub trait AttentionSource: Send + Sync {
    async fn fetch(&self, user_id: &str, window: &AttentionWindow) -> Result<AttentionBatch>;
}
