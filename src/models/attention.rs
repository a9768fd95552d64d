//! Attention events and the per-cycle batch they arrive in.
//!
//! Events are immutable and owned by the capture subsystem; this crate only
//! reads them. The batch derives everything the engine needs: a dedup
//! fingerprint, the batch-reference timestamps, the minimal-content gate,
//! and the per-URL grouping handed to the decision policy.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub active_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextReadEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageViewEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub description: Option<String>,
    pub hover_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPlayEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoWatchEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub watched_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

/// All attention fetched for one processing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionBatch {
    pub visits: Vec<VisitEvent>,
    pub text_events: Vec<TextReadEvent>,
    pub image_events: Vec<ImageViewEvent>,
    pub audio_events: Vec<AudioPlayEvent>,
    pub video_events: Vec<VideoWatchEvent>,
}

/// One URL's worth of attention, aggregated across categories. The shape
/// the decision policy sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAttention {
    pub url: String,
    pub titles: Vec<String>,
    pub read_text: Vec<String>,
    pub image_descriptions: Vec<String>,
    pub captions: Vec<String>,
    pub visit_count: usize,
    pub total_active_ms: u64,
    pub latest_at: DateTime<Utc>,
}

impl AttentionBatch {
    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    pub fn event_count(&self) -> usize {
        self.visits.len()
            + self.text_events.len()
            + self.image_events.len()
            + self.audio_events.len()
            + self.video_events.len()
    }

    /// SHA-256 over the sorted ids of every constituent event. Stable
    /// across fetch ordering, so re-fetching the same window dedupes.
    pub fn fingerprint(&self) -> String {
        let mut ids: Vec<&str> = Vec::with_capacity(self.event_count());
        ids.extend(self.visits.iter().map(|e| e.id.as_str()));
        ids.extend(self.text_events.iter().map(|e| e.id.as_str()));
        ids.extend(self.image_events.iter().map(|e| e.id.as_str()));
        ids.extend(self.audio_events.iter().map(|e| e.id.as_str()));
        ids.extend(self.video_events.iter().map(|e| e.id.as_str()));
        ids.sort_unstable();

        let mut hasher = Sha256::new();
        for id in ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn earliest_at(&self) -> Option<DateTime<Utc>> {
        self.timestamps().min()
    }

    pub fn latest_at(&self) -> Option<DateTime<Utc>> {
        self.timestamps().max()
    }

    fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.visits
            .iter()
            .map(|e| e.occurred_at)
            .chain(self.text_events.iter().map(|e| e.occurred_at))
            .chain(self.image_events.iter().map(|e| e.occurred_at))
            .chain(self.audio_events.iter().map(|e| e.occurred_at))
            .chain(self.video_events.iter().map(|e| e.occurred_at))
    }

    /// Gate against processing noise-only batches. Passes when any one
    /// signal is strong enough on its own.
    pub fn has_minimal_content(&self, config: &EngineConfig) -> bool {
        let read_chars: usize = self.text_events.iter().map(|e| e.text.chars().count()).sum();
        if read_chars >= config.min_read_text_chars {
            return true;
        }

        let described_images = self
            .image_events
            .iter()
            .filter(|e| e.description.is_some() && e.hover_ms > config.min_image_hover_ms)
            .count();
        if described_images >= config.min_described_images {
            return true;
        }

        let caption_events = self
            .audio_events
            .iter()
            .filter(|e| e.caption.is_some())
            .count()
            + self
                .video_events
                .iter()
                .filter(|e| e.caption.is_some())
                .count();
        if caption_events >= config.min_caption_events {
            return true;
        }

        let titled_visits = self
            .visits
            .iter()
            .filter(|e| e.title.is_some() && e.active_ms > config.min_visit_active_ms)
            .count();
        titled_visits >= config.min_titled_visits
    }

    /// Aggregate by URL in deterministic order for the decision policy.
    pub fn group_by_url(&self) -> Vec<UrlAttention> {
        fn entry<'a>(
            groups: &'a mut BTreeMap<String, UrlAttention>,
            url: &str,
            at: DateTime<Utc>,
        ) -> &'a mut UrlAttention {
            let group = groups.entry(url.to_string()).or_insert_with(|| UrlAttention {
                url: url.to_string(),
                titles: Vec::new(),
                read_text: Vec::new(),
                image_descriptions: Vec::new(),
                captions: Vec::new(),
                visit_count: 0,
                total_active_ms: 0,
                latest_at: at,
            });
            if at > group.latest_at {
                group.latest_at = at;
            }
            group
        }

        let mut groups: BTreeMap<String, UrlAttention> = BTreeMap::new();

        for visit in &self.visits {
            let group = entry(&mut groups, &visit.url, visit.occurred_at);
            group.visit_count += 1;
            group.total_active_ms += visit.active_ms;
            if let Some(title) = &visit.title {
                group.titles.push(title.clone());
            }
        }
        for event in &self.text_events {
            entry(&mut groups, &event.url, event.occurred_at)
                .read_text
                .push(event.text.clone());
        }
        for event in &self.image_events {
            let group = entry(&mut groups, &event.url, event.occurred_at);
            if let Some(description) = &event.description {
                group.image_descriptions.push(description.clone());
            }
        }
        for event in &self.audio_events {
            let group = entry(&mut groups, &event.url, event.occurred_at);
            if let Some(caption) = &event.caption {
                group.captions.push(caption.clone());
            }
        }
        for event in &self.video_events {
            let group = entry(&mut groups, &event.url, event.occurred_at);
            if let Some(caption) = &event.caption {
                group.captions.push(caption.clone());
            }
        }

        groups.into_values().collect()
    }
}
