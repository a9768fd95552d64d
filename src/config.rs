/// Engine-wide tunable constants. Per-user knobs (interval, inactivity
/// threshold) live in the `user_settings` table instead.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum lookback when a focus is active but no marker exists yet
    pub max_active_window_ms: u64,

    /// Maximum lookback when no focus is active and none ever ended
    pub no_focus_window_ms: u64,

    /// How long a batch fingerprint stays in the dedup cache
    pub dedup_ttl_ms: u64,

    /// Keyword set cap per focus
    pub max_keywords: usize,

    /// Cap on decision-policy actions applied per cycle
    pub max_actions_per_cycle: usize,

    /// Cap on the resumable-focus list handed to the policy
    pub max_resumable_focuses: usize,

    /// Minimal-content gate thresholds
    pub min_read_text_chars: usize,
    pub min_described_images: usize,
    pub min_image_hover_ms: u64,
    pub min_caption_events: usize,
    pub min_titled_visits: usize,
    pub min_visit_active_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_window_ms: 30 * 60 * 1000,
            no_focus_window_ms: 24 * 60 * 60 * 1000,
            dedup_ttl_ms: 5 * 60 * 1000,
            max_keywords: 20,
            max_actions_per_cycle: 10,
            max_resumable_focuses: 10,
            min_read_text_chars: 50,
            min_described_images: 2,
            min_image_hover_ms: 1000,
            min_caption_events: 3,
            min_titled_visits: 2,
            min_visit_active_ms: 5000,
        }
    }
}
