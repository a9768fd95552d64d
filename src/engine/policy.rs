//! The pluggable clustering decision step.
//!
//! The policy sees the user's current focus state plus the new attention,
//! grouped by URL, and proposes a bounded ordered list of actions. It is a
//! black box to the rest of the engine: proposals are candidates, and the
//! mutation engine re-validates every one. Backends can be heuristic rules
//! (below), a remote LLM, or a scripted fixture in tests.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DecisionAction, Focus, UrlAttention};

/// Everything a policy gets to look at for one cycle.
#[derive(Debug, Clone)]
pub struct ClusteringContext {
    pub user_id: String,
    pub active_focuses: Vec<Focus>,
    /// Focuses ended within the resume window, most recent first
    pub resumable_focuses: Vec<Focus>,
    pub attention: Vec<UrlAttention>,
}

#[async_trait]
pub trait ClusteringDecisionPolicy: Send + Sync {
    async fn propose(&self, ctx: &ClusteringContext) -> Result<Vec<DecisionAction>>;
}

#[derive(Debug, Clone)]
pub struct HeuristicPolicyConfig {
    /// Shared keywords needed before attention "plausibly relates" to a focus
    pub min_keyword_overlap: usize,
    /// Fraction of the smaller keyword set two actives must share to merge
    pub merge_overlap_ratio: f64,
    /// Keywords extracted per URL group
    pub max_group_keywords: usize,
    pub max_actions: usize,
}

impl Default for HeuristicPolicyConfig {
    fn default() -> Self {
        Self {
            min_keyword_overlap: 2,
            merge_overlap_ratio: 0.5,
            max_group_keywords: 8,
            max_actions: 10,
        }
    }
}

/// Keyword-overlap rules over URL groups. Honors the policy contract:
/// update before create, merge converged actives, resume inside the window
/// rather than create, create only when nothing else applies.
#[derive(Debug, Clone, Default)]
pub struct HeuristicPolicy {
    config: HeuristicPolicyConfig,
}

impl HeuristicPolicy {
    pub fn new(config: HeuristicPolicyConfig) -> Self {
        Self { config }
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "are", "was", "you", "your",
    "how", "what", "when", "where", "why", "not", "but", "all", "can", "has", "its", "into",
    "www", "com", "org", "net", "html", "http", "https",
];

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|word| word.to_lowercase())
        .filter(|word| word.len() >= 3 && !STOPWORDS.contains(&word.as_str()))
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Keywords for one URL group: site name first, then title, text,
/// description, and caption tokens, in first-seen order.
fn group_keywords(group: &UrlAttention, max: usize) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::with_capacity(max);
    let mut push = |keyword: String| {
        if keywords.len() < max && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    };

    if let Some(host) = host_of(&group.url) {
        if let Some(site) = host.split('.').next() {
            if site.len() >= 3 && !STOPWORDS.contains(&site) {
                push(site.to_string());
            }
        }
    }

    for title in &group.titles {
        tokenize(title).for_each(&mut push);
    }
    for text in &group.read_text {
        tokenize(text).for_each(&mut push);
    }
    for description in &group.image_descriptions {
        tokenize(description).for_each(&mut push);
    }
    for caption in &group.captions {
        tokenize(caption).for_each(&mut push);
    }

    keywords
}

fn overlap(candidate: &[String], focus_keywords: &[String]) -> usize {
    candidate
        .iter()
        .filter(|keyword| focus_keywords.iter().any(|k| k == *keyword))
        .count()
}

fn best_match<'a>(
    candidate: &[String],
    focuses: &'a [Focus],
    min_overlap: usize,
) -> Option<&'a Focus> {
    focuses
        .iter()
        .map(|focus| (overlap(candidate, &focus.keywords), focus))
        .filter(|(shared, _)| *shared >= min_overlap)
        .max_by_key(|(shared, _)| *shared)
        .map(|(_, focus)| focus)
}

fn item_label(group: &UrlAttention) -> String {
    if let Some(title) = group.titles.first() {
        let words: Vec<&str> = title.split_whitespace().take(3).collect();
        if !words.is_empty() {
            return words.join(" ");
        }
    }
    host_of(&group.url).unwrap_or_else(|| group.url.clone())
}

#[async_trait]
impl ClusteringDecisionPolicy for HeuristicPolicy {
    async fn propose(&self, ctx: &ClusteringContext) -> Result<Vec<DecisionAction>> {
        let min_overlap = self.config.min_keyword_overlap;

        // focus id -> accumulated keywords for a single Update per focus
        let mut updates: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut resumes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        // host -> (item, keywords) so one topic spread over pages creates once
        let mut creates: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();

        for group in &ctx.attention {
            let keywords = group_keywords(group, self.config.max_group_keywords);
            if keywords.is_empty() {
                continue;
            }

            if let Some(focus) = best_match(&keywords, &ctx.active_focuses, min_overlap) {
                updates.entry(focus.id.clone()).or_default().extend(keywords);
                continue;
            }

            if let Some(focus) = best_match(&keywords, &ctx.resumable_focuses, min_overlap) {
                resumes.entry(focus.id.clone()).or_default().extend(keywords);
                continue;
            }

            let host = host_of(&group.url).unwrap_or_else(|| group.url.clone());
            let entry = creates
                .entry(host)
                .or_insert_with(|| (item_label(group), Vec::new()));
            entry.1.extend(keywords);
        }

        let mut actions: Vec<DecisionAction> = Vec::new();

        for (focus_id, new_keywords) in updates {
            actions.push(DecisionAction::Update {
                focus_id,
                new_keywords,
                new_item: None,
            });
        }

        // Converged actives: share enough of the smaller keyword set
        for (i, a) in ctx.active_focuses.iter().enumerate() {
            for b in ctx.active_focuses.iter().skip(i + 1) {
                let shared = overlap(&a.keywords, &b.keywords);
                let smaller = a.keywords.len().min(b.keywords.len());
                if smaller == 0 || shared < min_overlap {
                    continue;
                }
                if (shared as f64) / (smaller as f64) >= self.config.merge_overlap_ratio {
                    // Most recently active focus survives
                    let (primary, secondary) = if a.last_activity_at >= b.last_activity_at {
                        (a, b)
                    } else {
                        (b, a)
                    };
                    actions.push(DecisionAction::Merge {
                        primary_id: primary.id.clone(),
                        secondary_id: secondary.id.clone(),
                        merged_item: primary.item.clone(),
                    });
                }
            }
        }

        for (focus_id, new_keywords) in resumes {
            actions.push(DecisionAction::Resume {
                focus_id,
                new_keywords: Some(new_keywords),
            });
        }

        for (_, (item, keywords)) in creates {
            actions.push(DecisionAction::Create { item, keywords });
        }

        actions.truncate(self.config.max_actions);
        Ok(actions)
    }
}
