use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user engine settings plus the processing marker. Rows are created
/// lazily with these defaults the first time a user is processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    pub focus_calculation_enabled: bool,
    pub focus_calculation_interval_ms: u64,
    pub focus_inactivity_threshold_ms: u64,
    /// Reserved for minimum-duration filtering; persisted but not yet applied
    pub focus_min_duration_ms: u64,
    pub last_focus_calculated_at: Option<DateTime<Utc>>,
}

impl UserSettings {
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            focus_calculation_enabled: true,
            focus_calculation_interval_ms: 5 * 60 * 1000,
            focus_inactivity_threshold_ms: 30 * 60 * 1000,
            focus_min_duration_ms: 60 * 1000,
            last_focus_calculated_at: None,
        }
    }
}
