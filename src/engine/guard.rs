use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// Per-user mutual exclusion for processing cycles. In-process only;
/// cross-process exclusion belongs to the external scheduler.
///
/// Cloning shares the underlying set, so one guard constructed at startup
/// serializes all cycles for a given user across the whole process.
#[derive(Clone, Default)]
pub struct ProcessingGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

/// RAII permit for one user's cycle. Dropping it releases the user on
/// every exit path, including early returns and propagated errors.
pub struct ProcessingPermit {
    user_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl ProcessingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, user_id: &str) -> Option<ProcessingPermit> {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if active.insert(user_id.to_string()) {
            Some(ProcessingPermit {
                user_id: user_id.to_string(),
                active: Arc::clone(&self.active),
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, user_id: &str) -> bool {
        match self.active.lock() {
            Ok(guard) => guard.contains(user_id),
            Err(poisoned) => poisoned.into_inner().contains(user_id),
        }
    }
}

impl Drop for ProcessingPermit {
    fn drop(&mut self) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&self.user_id);
    }
}
