//! Validated operations over durable focus state. This layer is the
//! source of truth for lifecycle invariants: the decision policy only
//! proposes, every proposal is re-checked here before anything is written.
//!
//! Validation failures come back as `MutationError` values rather than
//! panics or opaque anyhow chains, so the orchestrator can log one failed
//! action and keep applying the rest.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::MutationError;
use crate::events::{FocusChangeType, FocusChanged, FocusEventPublisher};
use crate::models::{merge_keywords, AttentionBatch, Focus};

/// Reference timestamps for one processing cycle. Mutations stamp rows
/// with batch-derived times (not wall clock) so durations stay faithful
/// when a historical batch is processed; `now` is only used for the
/// resume-window check, which is about the present.
#[derive(Debug, Clone, Copy)]
pub struct BatchClock {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl BatchClock {
    pub fn from_batch(batch: &AttentionBatch, now: DateTime<Utc>) -> Self {
        Self {
            earliest: batch.earliest_at().unwrap_or(now),
            latest: batch.latest_at().unwrap_or(now),
            now,
        }
    }
}

pub struct FocusMutationEngine {
    db: Database,
    publisher: Arc<dyn FocusEventPublisher>,
    config: EngineConfig,
}

impl FocusMutationEngine {
    pub fn new(
        db: Database,
        publisher: Arc<dyn FocusEventPublisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            publisher,
            config,
        }
    }

    /// Active focuses, most recent activity first.
    pub async fn get_active_focuses(&self, user_id: &str) -> Result<Vec<Focus>> {
        self.db.get_active_focuses(user_id).await
    }

    /// Focuses ended within the resume window, most recently ended first,
    /// capped at the configured maximum.
    pub async fn get_resumable_focuses(
        &self,
        user_id: &str,
        threshold_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Focus>> {
        let cutoff = now - Duration::milliseconds(threshold_ms as i64);
        self.db
            .get_resumable_focuses(user_id, cutoff, self.config.max_resumable_focuses)
            .await
    }

    /// Start tracking a new focus. Always permitted; timestamps come from
    /// the batch, not the wall clock.
    pub async fn create(
        &self,
        user_id: &str,
        item: &str,
        keywords: &[String],
        clock: BatchClock,
    ) -> Result<Focus, MutationError> {
        let focus = Focus {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            item: item.to_string(),
            keywords: merge_keywords(&[], keywords, self.config.max_keywords),
            is_active: true,
            started_at: clock.earliest,
            ended_at: None,
            last_activity_at: clock.latest,
            last_calculated_at: clock.latest,
        };

        self.db.insert_focus(&focus).await?;
        self.publish(user_id, &focus, FocusChangeType::Created);
        Ok(focus)
    }

    /// Fold new keywords (and optionally a new label) into an active focus.
    pub async fn update(
        &self,
        user_id: &str,
        focus_id: &str,
        new_keywords: &[String],
        new_item: Option<&str>,
        clock: BatchClock,
    ) -> Result<Focus, MutationError> {
        let mut focus = self.load_active(user_id, focus_id).await?;

        focus.keywords = merge_keywords(&focus.keywords, new_keywords, self.config.max_keywords);
        if let Some(item) = new_item {
            focus.item = item.to_string();
        }
        focus.last_activity_at = clock.latest;
        focus.last_calculated_at = clock.latest;

        self.db.update_focus(&focus).await?;
        self.publish(user_id, &focus, FocusChangeType::Updated);
        Ok(focus)
    }

    /// Fold the secondary focus into the primary. The primary absorbs the
    /// keyword union and the merged label; the secondary is ended. Both
    /// rows are written in one transaction, and the events go out
    /// updated-then-ended so consumers never transiently see zero active
    /// focuses.
    pub async fn merge(
        &self,
        user_id: &str,
        primary_id: &str,
        secondary_id: &str,
        merged_item: &str,
        clock: BatchClock,
    ) -> Result<Focus, MutationError> {
        if primary_id == secondary_id {
            return Err(MutationError::MergeSelf);
        }

        let mut primary = self.load_active(user_id, primary_id).await?;
        let mut secondary = self.load_active(user_id, secondary_id).await?;

        primary.keywords = merge_keywords(
            &primary.keywords,
            &secondary.keywords,
            self.config.max_keywords,
        );
        primary.item = merged_item.to_string();
        primary.last_activity_at = clock.latest;
        primary.last_calculated_at = clock.latest;

        secondary.is_active = false;
        secondary.ended_at = Some(clock.latest);
        secondary.last_calculated_at = clock.latest;

        self.db
            .update_focuses_atomic(vec![primary.clone(), secondary.clone()])
            .await?;

        self.publish(user_id, &primary, FocusChangeType::Updated);
        self.publish(user_id, &secondary, FocusChangeType::Ended);
        Ok(primary)
    }

    /// End an active focus.
    pub async fn end(
        &self,
        user_id: &str,
        focus_id: &str,
        reason: Option<&str>,
        clock: BatchClock,
    ) -> Result<Focus, MutationError> {
        let mut focus = self.load_active(user_id, focus_id).await?;

        focus.is_active = false;
        focus.ended_at = Some(clock.latest);
        focus.last_calculated_at = clock.latest;

        self.db.update_focus(&focus).await?;

        if let Some(reason) = reason {
            info!("Ended focus {focus_id} for user {user_id}: {reason}");
        }

        self.publish(user_id, &focus, FocusChangeType::Ended);
        Ok(focus)
    }

    /// Reactivate an ended focus within the resume window, keeping its id
    /// and accumulated keywords. Exactly-at-threshold still succeeds.
    /// Publishes "updated", not "created": identity is preserved across
    /// the gap.
    pub async fn resume(
        &self,
        user_id: &str,
        focus_id: &str,
        new_keywords: Option<&[String]>,
        threshold_ms: u64,
        clock: BatchClock,
    ) -> Result<Focus, MutationError> {
        let mut focus = self
            .db
            .get_focus(user_id, focus_id)
            .await?
            .ok_or(MutationError::FocusNotFound)?;

        if focus.is_active {
            return Err(MutationError::AlreadyActive);
        }
        let ended_at = focus.ended_at.ok_or(MutationError::FocusNotFound)?;
        if clock.now - ended_at > Duration::milliseconds(threshold_ms as i64) {
            return Err(MutationError::ResumeWindowExpired);
        }

        focus.is_active = true;
        focus.ended_at = None;
        if let Some(keywords) = new_keywords {
            focus.keywords = merge_keywords(&focus.keywords, keywords, self.config.max_keywords);
        }
        focus.last_activity_at = clock.latest;
        focus.last_calculated_at = clock.latest;

        self.db.update_focus(&focus).await?;
        self.publish(user_id, &focus, FocusChangeType::Updated);
        Ok(focus)
    }

    async fn load_active(&self, user_id: &str, focus_id: &str) -> Result<Focus, MutationError> {
        let focus = self
            .db
            .get_focus(user_id, focus_id)
            .await?
            .ok_or(MutationError::FocusNotFound)?;
        if !focus.is_active {
            return Err(MutationError::NotActive);
        }
        Ok(focus)
    }

    fn publish(&self, user_id: &str, focus: &Focus, change_type: FocusChangeType) {
        debug!(
            "Publishing focus {} event for user {user_id} (focus {})",
            change_type.as_str(),
            focus.id
        );
        self.publisher.publish(FocusChanged {
            user_id: user_id.to_string(),
            focus: Some(focus.clone()),
            change_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingPublisher;
    use chrono::TimeZone;

    const THRESHOLD_MS: u64 = 30 * 60 * 1000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn clock() -> BatchClock {
        BatchClock {
            earliest: now() - Duration::minutes(2),
            latest: now() - Duration::minutes(1),
            now: now(),
        }
    }

    fn engine() -> (FocusMutationEngine, Database, Arc<RecordingPublisher>) {
        let db = Database::in_memory().unwrap();
        let publisher = Arc::new(RecordingPublisher::new());
        let engine =
            FocusMutationEngine::new(db.clone(), publisher.clone(), EngineConfig::default());
        (engine, db, publisher)
    }

    #[tokio::test]
    async fn create_stamps_batch_derived_timestamps() {
        let (engine, _db, publisher) = engine();

        let focus = engine
            .create("u1", "React Development", &["react".to_string()], clock())
            .await
            .unwrap();

        assert!(focus.is_active);
        assert_eq!(focus.started_at, clock().earliest);
        assert_eq!(focus.last_activity_at, clock().latest);
        assert_eq!(focus.last_calculated_at, clock().latest);

        let events = publisher.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, FocusChangeType::Created);
    }

    #[tokio::test]
    async fn update_merges_keywords_and_bumps_activity() {
        let (engine, _db, publisher) = engine();
        let focus = engine
            .create("u1", "React Development", &["react".to_string()], clock())
            .await
            .unwrap();
        publisher.clear();

        let later = BatchClock {
            earliest: now(),
            latest: now() + Duration::minutes(5),
            now: now() + Duration::minutes(5),
        };
        let updated = engine
            .update(
                "u1",
                &focus.id,
                &["Hooks".to_string(), "REACT".to_string()],
                Some("React Hooks"),
                later,
            )
            .await
            .unwrap();

        assert_eq!(updated.item, "React Hooks");
        assert_eq!(updated.keywords, vec!["react", "hooks"]);
        assert_eq!(updated.last_activity_at, later.latest);

        let events = publisher.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, FocusChangeType::Updated);
    }

    #[tokio::test]
    async fn operations_never_leak_foreign_focuses() {
        let (engine, _db, _publisher) = engine();
        let focus = engine
            .create("u1", "React Development", &[], clock())
            .await
            .unwrap();

        let err = engine
            .update("u2", &focus.id, &[], None, clock())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::FocusNotFound));

        let err = engine
            .end("u2", &focus.id, None, clock())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::FocusNotFound));
    }

    #[tokio::test]
    async fn merge_leaves_one_active_focus_with_union_keywords() {
        let (engine, db, publisher) = engine();
        let primary = engine
            .create(
                "u1",
                "JavaScript Basics",
                &["javascript".to_string(), "variables".to_string()],
                clock(),
            )
            .await
            .unwrap();
        let secondary = engine
            .create(
                "u1",
                "JavaScript Tutorial",
                &["javascript".to_string(), "functions".to_string()],
                clock(),
            )
            .await
            .unwrap();
        publisher.clear();

        let merged = engine
            .merge("u1", &primary.id, &secondary.id, "JavaScript Learning", clock())
            .await
            .unwrap();

        assert_eq!(merged.item, "JavaScript Learning");
        for keyword in ["javascript", "variables", "functions"] {
            assert!(merged.keywords.iter().any(|k| k == keyword));
        }

        let active = db.get_active_focuses("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, primary.id);

        let ended = db.get_focus("u1", &secondary.id).await.unwrap().unwrap();
        assert!(!ended.is_active);
        assert_eq!(ended.ended_at, Some(clock().latest));

        // Updated for the primary strictly before ended for the secondary
        let events = publisher.recorded();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].change_type, FocusChangeType::Updated);
        assert_eq!(events[0].focus.as_ref().unwrap().id, primary.id);
        assert_eq!(events[1].change_type, FocusChangeType::Ended);
        assert_eq!(events[1].focus.as_ref().unwrap().id, secondary.id);
    }

    #[tokio::test]
    async fn merge_with_self_is_rejected() {
        let (engine, _db, _publisher) = engine();
        let focus = engine.create("u1", "Topic", &[], clock()).await.unwrap();

        let err = engine
            .merge("u1", &focus.id, &focus.id, "Topic", clock())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::MergeSelf));
    }

    #[tokio::test]
    async fn resume_succeeds_exactly_at_threshold() {
        let (engine, db, publisher) = engine();
        let focus = engine.create("u1", "Topic", &[], clock()).await.unwrap();
        engine
            .end("u1", &focus.id, None, clock())
            .await
            .unwrap();

        // ended_at == clock().latest; pick `now` exactly threshold later
        let at_threshold = BatchClock {
            earliest: clock().latest,
            latest: clock().latest + Duration::milliseconds(THRESHOLD_MS as i64),
            now: clock().latest + Duration::milliseconds(THRESHOLD_MS as i64),
        };
        publisher.clear();

        let resumed = engine
            .resume("u1", &focus.id, Some(&["again".to_string()]), THRESHOLD_MS, at_threshold)
            .await
            .unwrap();

        assert!(resumed.is_active);
        assert_eq!(resumed.ended_at, None);
        assert_eq!(resumed.id, focus.id);
        assert!(resumed.keywords.iter().any(|k| k == "again"));

        // Identity preserved: an update event, never a second created
        let events = publisher.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, FocusChangeType::Updated);

        assert_eq!(db.get_active_focuses("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resume_fails_strictly_past_threshold() {
        let (engine, _db, _publisher) = engine();
        let focus = engine.create("u1", "Topic", &[], clock()).await.unwrap();
        engine.end("u1", &focus.id, None, clock()).await.unwrap();

        let past_threshold = BatchClock {
            earliest: clock().latest,
            latest: clock().latest,
            now: clock().latest + Duration::milliseconds(THRESHOLD_MS as i64 + 1),
        };

        let err = engine
            .resume("u1", &focus.id, None, THRESHOLD_MS, past_threshold)
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::ResumeWindowExpired));
    }

    #[tokio::test]
    async fn resume_fails_when_already_active() {
        let (engine, _db, _publisher) = engine();
        let focus = engine.create("u1", "Topic", &[], clock()).await.unwrap();

        let err = engine
            .resume("u1", &focus.id, None, THRESHOLD_MS, clock())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::AlreadyActive));
    }

    #[tokio::test]
    async fn resumable_list_is_ordered_and_capped() {
        let (engine, _db, _publisher) = engine();

        for i in 0..12 {
            let created = engine
                .create("u1", &format!("Topic {i}"), &[], clock())
                .await
                .unwrap();
            let end_clock = BatchClock {
                earliest: clock().latest,
                latest: clock().latest + Duration::seconds(i),
                now: clock().now,
            };
            engine
                .end("u1", &created.id, None, end_clock)
                .await
                .unwrap();
        }

        let resumable = engine
            .get_resumable_focuses("u1", THRESHOLD_MS, now())
            .await
            .unwrap();
        assert_eq!(resumable.len(), 10);
        assert_eq!(resumable[0].item, "Topic 11");
    }
}
