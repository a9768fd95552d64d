//! Focus change events and the publisher seam.
//!
//! Downstream state machines (e.g. a pomodoro-style timer that runs while
//! any focus is active) consume these. Publishing is fire-and-forget and
//! happens strictly after the underlying write is durable; ordering within
//! one mutation matters (merge publishes updated-then-ended so a consumer
//! never transiently observes zero active focuses).

use std::sync::Mutex;

use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::Focus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FocusChangeType {
    Created,
    Updated,
    Ended,
}

impl FocusChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusChangeType::Created => "created",
            FocusChangeType::Updated => "updated",
            FocusChangeType::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusChanged {
    pub user_id: String,
    pub focus: Option<Focus>,
    pub change_type: FocusChangeType,
}

pub trait FocusEventPublisher: Send + Sync {
    fn publish(&self, event: FocusChanged);
}

/// Publisher backed by a tokio broadcast channel. Lagging or absent
/// subscribers never block a processing cycle.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<FocusChanged>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FocusChanged> {
        self.tx.subscribe()
    }
}

impl FocusEventPublisher for BroadcastPublisher {
    fn publish(&self, event: FocusChanged) {
        // send only fails when there are no subscribers; that's fine
        let _ = self.tx.send(event);
    }
}

/// In-memory recorder used as the test double, so tests can assert event
/// ordering (e.g. merge's updated-then-ended).
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<FocusChanged>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<FocusChanged> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl FocusEventPublisher for RecordingPublisher {
    fn publish(&self, event: FocusChanged) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(_) => warn!("recording publisher mutex poisoned; dropping event"),
        }
    }
}
