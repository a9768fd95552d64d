//! Thin outer loop the external scheduler calls on its recurring tick.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::dedup::DedupCache;
use super::orchestrator::{CycleOutcome, FocusLifecycleOrchestrator};
use crate::db::Database;
use crate::models::UserSettings;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchTickSummary {
    pub processed: u32,
    pub completed: u32,
    pub skipped: u32,
    pub failed: u32,
}

pub struct FocusBatchDriver {
    db: Database,
    dedup: Arc<DedupCache>,
    orchestrator: Arc<FocusLifecycleOrchestrator>,
}

fn is_due(settings: &UserSettings, now: DateTime<Utc>) -> bool {
    match settings.last_focus_calculated_at {
        None => true,
        Some(last) => {
            now - last >= Duration::milliseconds(settings.focus_calculation_interval_ms as i64)
        }
    }
}

impl FocusBatchDriver {
    pub fn new(
        db: Database,
        dedup: Arc<DedupCache>,
        orchestrator: Arc<FocusLifecycleOrchestrator>,
    ) -> Self {
        Self {
            db,
            dedup,
            orchestrator,
        }
    }

    /// Run one scheduler tick: process every enabled user whose interval
    /// has elapsed. Per-user failures are counted and never abort the
    /// rest of the batch.
    pub async fn run_tick(&self) -> Result<BatchTickSummary> {
        let now = Utc::now();
        self.dedup.sweep(now);

        let settings = self.db.list_enabled_settings().await?;
        let mut summary = BatchTickSummary::default();

        for user_settings in settings {
            if !is_due(&user_settings, now) {
                continue;
            }

            summary.processed += 1;
            match self
                .orchestrator
                .process_user_focus(&user_settings.user_id, false)
                .await
            {
                Ok(CycleOutcome::Completed(_)) => summary.completed += 1,
                Ok(CycleOutcome::Skipped(_)) => summary.skipped += 1,
                Err(err) => {
                    error!(
                        "Focus cycle failed for user {}: {err:#}",
                        user_settings.user_id
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.processed > 0 {
            info!(
                "Focus batch tick: {} processed, {} completed, {} skipped, {} failed",
                summary.processed, summary.completed, summary.skipped, summary.failed
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::config::EngineConfig;
    use crate::engine::guard::ProcessingGuard;
    use crate::engine::policy::{ClusteringContext, ClusteringDecisionPolicy};
    use crate::engine::source::AttentionSource;
    use crate::engine::window::AttentionWindow;
    use crate::events::RecordingPublisher;
    use crate::models::{AttentionBatch, DecisionAction, VisitEvent};

    struct EmptyPolicy;

    #[async_trait]
    impl ClusteringDecisionPolicy for EmptyPolicy {
        async fn propose(&self, _ctx: &ClusteringContext) -> Result<Vec<DecisionAction>> {
            Ok(vec![])
        }
    }

    /// Fails fetches for the configured user, succeeds for everyone else.
    struct FlakySource {
        failing_user: String,
        fetches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AttentionSource for FlakySource {
        async fn fetch(
            &self,
            user_id: &str,
            _window: &AttentionWindow,
        ) -> Result<AttentionBatch> {
            self.fetches.lock().unwrap().push(user_id.to_string());
            if user_id == self.failing_user {
                anyhow::bail!("capture backend unreachable");
            }
            Ok(AttentionBatch {
                visits: vec![
                    titled_visit(user_id, "https://github.com", "GitHub"),
                    titled_visit(user_id, "https://docs.rs", "Docs.rs"),
                ],
                ..Default::default()
            })
        }
    }

    fn titled_visit(user_id: &str, url: &str, title: &str) -> VisitEvent {
        VisitEvent {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            url: url.to_string(),
            title: Some(title.to_string()),
            active_ms: 8000,
            occurred_at: Utc::now(),
        }
    }

    fn driver_with_source(db: Database, source: Arc<dyn AttentionSource>) -> FocusBatchDriver {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = EngineConfig::default();
        let dedup = Arc::new(DedupCache::new(config.dedup_ttl_ms));
        let orchestrator = Arc::new(FocusLifecycleOrchestrator::new(
            db.clone(),
            ProcessingGuard::new(),
            Arc::clone(&dedup),
            Arc::new(RecordingPublisher::new()),
            Arc::new(EmptyPolicy),
            source,
            config,
        ));
        FocusBatchDriver::new(db, dedup, orchestrator)
    }

    #[tokio::test]
    async fn one_failing_user_does_not_abort_the_tick() {
        let db = Database::in_memory().unwrap();
        for user in ["u1", "u2", "u3"] {
            db.get_or_create_user_settings(user).await.unwrap();
        }

        let source = Arc::new(FlakySource {
            failing_user: "u2".to_string(),
            fetches: Mutex::new(vec![]),
        });
        let driver = driver_with_source(db, source.clone());

        let summary = driver.run_tick().await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 2);

        // The failing user did not stop the others from being fetched
        assert_eq!(source.fetches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn users_inside_their_interval_are_not_reprocessed() {
        let db = Database::in_memory().unwrap();
        db.get_or_create_user_settings("u1").await.unwrap();

        let source = Arc::new(FlakySource {
            failing_user: "nobody".to_string(),
            fetches: Mutex::new(vec![]),
        });
        let driver = driver_with_source(db, source.clone());

        let first = driver.run_tick().await.unwrap();
        assert_eq!(first.processed, 1);

        // Marker was just advanced; the default interval has not elapsed
        let second = driver.run_tick().await.unwrap();
        assert_eq!(second.processed, 0);
    }

    #[test]
    fn due_check_honors_the_interval() {
        let mut settings = crate::models::UserSettings::defaults_for("u1");
        let now = Utc::now();

        assert!(is_due(&settings, now));

        settings.last_focus_calculated_at = Some(now - Duration::minutes(1));
        assert!(!is_due(&settings, now));

        settings.last_focus_calculated_at = Some(now - Duration::minutes(6));
        assert!(is_due(&settings, now));
    }
}
