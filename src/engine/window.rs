use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// The `[from, to]` span of attention to pull for one cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttentionWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Pick the attention window for the current cycle.
///
/// With an active focus only the incremental slice since the last run is
/// needed. With none, anchor at the last known boundary (the most recently
/// ended focus) so no activity is missed, bounded by the no-focus lookback
/// when there is no prior focus at all.
pub fn select_window(
    has_active_focus: bool,
    last_calculated_at: Option<DateTime<Utc>>,
    last_ended_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> AttentionWindow {
    let from = if has_active_focus {
        last_calculated_at
            .unwrap_or_else(|| now - Duration::milliseconds(config.max_active_window_ms as i64))
    } else {
        last_ended_at
            .unwrap_or_else(|| now - Duration::milliseconds(config.no_focus_window_ms as i64))
    };

    AttentionWindow { from, to: now }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn active_focus_uses_last_calculated_marker() {
        let config = EngineConfig::default();
        let marker = now() - Duration::minutes(3);

        let window = select_window(true, Some(marker), None, now(), &config);
        assert_eq!(window.from, marker);
        assert_eq!(window.to, now());
    }

    #[test]
    fn active_focus_without_marker_is_bounded() {
        let config = EngineConfig::default();

        let window = select_window(true, None, None, now(), &config);
        assert_eq!(
            window.from,
            now() - Duration::milliseconds(config.max_active_window_ms as i64)
        );
    }

    #[test]
    fn no_active_focus_anchors_at_last_ended() {
        let config = EngineConfig::default();
        let ended = now() - Duration::hours(3);

        // The marker is ignored on this branch; the ended boundary wins
        let window = select_window(false, Some(now() - Duration::minutes(3)), Some(ended), now(), &config);
        assert_eq!(window.from, ended);
    }

    #[test]
    fn no_focus_history_falls_back_to_long_lookback() {
        let config = EngineConfig::default();

        let window = select_window(false, None, None, now(), &config);
        assert_eq!(
            window.from,
            now() - Duration::milliseconds(config.no_focus_window_ms as i64)
        );
    }
}
