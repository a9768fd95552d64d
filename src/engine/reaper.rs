use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::db::Database;
use crate::events::{FocusChangeType, FocusChanged, FocusEventPublisher};
use crate::models::Focus;

/// Auto-ends focuses that have seen no activity within the inactivity
/// threshold. Runs at the start of every cycle, before window selection,
/// because whether any focus remains active decides the window branch.
pub struct InactivityReaper {
    db: Database,
    publisher: Arc<dyn FocusEventPublisher>,
}

impl InactivityReaper {
    pub fn new(db: Database, publisher: Arc<dyn FocusEventPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Bulk-end stale focuses and publish one "ended" event per focus,
    /// strictly after the write commits.
    pub async fn check_and_end_inactive_focuses(
        &self,
        user_id: &str,
        threshold_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Focus>> {
        let cutoff = now - Duration::milliseconds(threshold_ms as i64);
        let ended = self.db.end_inactive_focuses(user_id, cutoff, now).await?;

        if !ended.is_empty() {
            info!(
                "Reaper ended {} inactive focus(es) for user {user_id}",
                ended.len()
            );
        }

        for focus in &ended {
            self.publisher.publish(FocusChanged {
                user_id: user_id.to_string(),
                focus: Some(focus.clone()),
                change_type: FocusChangeType::Ended,
            });
        }

        Ok(ended)
    }
}
