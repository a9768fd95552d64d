//! One processing cycle per user, wiring the guard, reaper, window
//! selection, content/dedup gates, decision policy, and mutation engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::dedup::DedupCache;
use super::guard::ProcessingGuard;
use super::mutation::{BatchClock, FocusMutationEngine};
use super::policy::{ClusteringContext, ClusteringDecisionPolicy};
use super::reaper::InactivityReaper;
use super::source::AttentionSource;
use super::window::select_window;
use crate::config::EngineConfig;
use crate::db::Database;
use crate::events::FocusEventPublisher;
use crate::models::DecisionAction;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Another cycle for this user is still in flight
    AlreadyProcessing,
    /// Focus calculation disabled in the user's settings
    Disabled,
    /// Batch empty or below the minimal-content thresholds
    InsufficientContent,
    /// Identical batch fingerprint seen within the dedup TTL
    DuplicateBatch,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub created: u32,
    pub updated: u32,
    pub merged: u32,
    pub ended: u32,
    pub resumed: u32,
    pub failed_actions: u32,
    pub reaped: u32,
}

/// Terminal state of one cycle. Failures surface as the `Err` side of
/// `process_user_focus` and are counted at the batch driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CycleOutcome {
    Completed(CycleSummary),
    Skipped(SkipReason),
}

pub struct FocusLifecycleOrchestrator {
    db: Database,
    guard: ProcessingGuard,
    dedup: Arc<DedupCache>,
    policy: Arc<dyn ClusteringDecisionPolicy>,
    source: Arc<dyn AttentionSource>,
    reaper: InactivityReaper,
    mutations: FocusMutationEngine,
    config: EngineConfig,
}

impl FocusLifecycleOrchestrator {
    pub fn new(
        db: Database,
        guard: ProcessingGuard,
        dedup: Arc<DedupCache>,
        publisher: Arc<dyn FocusEventPublisher>,
        policy: Arc<dyn ClusteringDecisionPolicy>,
        source: Arc<dyn AttentionSource>,
        config: EngineConfig,
    ) -> Self {
        let reaper = InactivityReaper::new(db.clone(), Arc::clone(&publisher));
        let mutations = FocusMutationEngine::new(db.clone(), publisher, config.clone());
        Self {
            db,
            guard,
            dedup,
            policy,
            source,
            reaper,
            mutations,
            config,
        }
    }

    pub fn mutations(&self) -> &FocusMutationEngine {
        &self.mutations
    }

    /// Run one cycle for a user. `force` bypasses the enabled check and
    /// the dedup gate (manual/debug runs) but never the guard.
    pub async fn process_user_focus(&self, user_id: &str, force: bool) -> Result<CycleOutcome> {
        // The permit is dropped on every exit path below, including `?`
        let _permit = match self.guard.try_acquire(user_id) {
            Some(permit) => permit,
            None => return Ok(CycleOutcome::Skipped(SkipReason::AlreadyProcessing)),
        };

        let settings = self
            .db
            .get_or_create_user_settings(user_id)
            .await
            .context("failed to load user settings")?;

        if !settings.focus_calculation_enabled && !force {
            return Ok(CycleOutcome::Skipped(SkipReason::Disabled));
        }

        let now = Utc::now();

        let reaped = self
            .reaper
            .check_and_end_inactive_focuses(user_id, settings.focus_inactivity_threshold_ms, now)
            .await
            .context("inactivity reaper failed")?;

        // Reaping may have just ended the last active focus, so the window
        // branch is decided on post-reap state
        let has_active = self.db.has_active_focus(user_id).await?;
        let last_ended = self.db.get_last_ended_focus(user_id).await?;
        let window = select_window(
            has_active,
            settings.last_focus_calculated_at,
            last_ended.and_then(|f| f.ended_at),
            now,
            &self.config,
        );

        let batch = self
            .source
            .fetch(user_id, &window)
            .await
            .context("attention fetch failed")?;

        if batch.is_empty() || !batch.has_minimal_content(&self.config) {
            self.db
                .set_last_focus_calculated_at(user_id, window.to)
                .await?;
            return Ok(CycleOutcome::Skipped(SkipReason::InsufficientContent));
        }

        let fingerprint = batch.fingerprint();
        if !force && self.dedup.is_duplicate(&fingerprint, now) {
            // Advance the marker anyway so this window is not retried forever
            self.db
                .set_last_focus_calculated_at(user_id, window.to)
                .await?;
            return Ok(CycleOutcome::Skipped(SkipReason::DuplicateBatch));
        }

        let clock = BatchClock::from_batch(&batch, now);

        let context = ClusteringContext {
            user_id: user_id.to_string(),
            active_focuses: self.mutations.get_active_focuses(user_id).await?,
            resumable_focuses: self
                .mutations
                .get_resumable_focuses(user_id, settings.focus_inactivity_threshold_ms, now)
                .await?,
            attention: batch.group_by_url(),
        };

        let actions = self
            .policy
            .propose(&context)
            .await
            .context("decision policy failed")?;

        let mut summary = CycleSummary {
            reaped: reaped.len() as u32,
            ..Default::default()
        };

        for action in actions.into_iter().take(self.config.max_actions_per_cycle) {
            self.apply_action(user_id, action, settings.focus_inactivity_threshold_ms, clock, &mut summary)
                .await;
        }

        self.db
            .set_last_focus_calculated_at(user_id, window.to)
            .await?;
        self.dedup.record(&fingerprint, now);

        info!(
            "Focus cycle for user {user_id}: {} created, {} updated, {} merged, {} ended, {} resumed, {} failed, {} reaped",
            summary.created,
            summary.updated,
            summary.merged,
            summary.ended,
            summary.resumed,
            summary.failed_actions,
            summary.reaped
        );

        Ok(CycleOutcome::Completed(summary))
    }

    /// Apply a single proposed action. Validation failures are terminal
    /// for this action only; there is no cross-action transaction.
    async fn apply_action(
        &self,
        user_id: &str,
        action: DecisionAction,
        inactivity_threshold_ms: u64,
        clock: BatchClock,
        summary: &mut CycleSummary,
    ) {
        enum Applied {
            Created,
            Updated,
            Merged,
            Ended,
            Resumed,
        }

        let result = match action {
            DecisionAction::Create { item, keywords } => self
                .mutations
                .create(user_id, &item, &keywords, clock)
                .await
                .map(|_| Applied::Created),
            DecisionAction::Update {
                focus_id,
                new_keywords,
                new_item,
            } => self
                .mutations
                .update(user_id, &focus_id, &new_keywords, new_item.as_deref(), clock)
                .await
                .map(|_| Applied::Updated),
            DecisionAction::Merge {
                primary_id,
                secondary_id,
                merged_item,
            } => self
                .mutations
                .merge(user_id, &primary_id, &secondary_id, &merged_item, clock)
                .await
                .map(|_| Applied::Merged),
            DecisionAction::End { focus_id, reason } => self
                .mutations
                .end(user_id, &focus_id, reason.as_deref(), clock)
                .await
                .map(|_| Applied::Ended),
            DecisionAction::Resume {
                focus_id,
                new_keywords,
            } => self
                .mutations
                .resume(
                    user_id,
                    &focus_id,
                    new_keywords.as_deref(),
                    inactivity_threshold_ms,
                    clock,
                )
                .await
                .map(|_| Applied::Resumed),
        };

        match result {
            Ok(Applied::Created) => summary.created += 1,
            Ok(Applied::Updated) => summary.updated += 1,
            Ok(Applied::Merged) => summary.merged += 1,
            Ok(Applied::Ended) => summary.ended += 1,
            Ok(Applied::Resumed) => summary.resumed += 1,
            Err(err) => {
                warn!("Rejected focus action for user {user_id}: {err}");
                summary.failed_actions += 1;
            }
        }
    }
}
