use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trackable span of sustained attention on a topic. The id is stable
/// across resume cycles; keywords accumulate as the topic evolves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Focus {
    pub id: String,
    pub user_id: String,
    /// Short human label, 2-3 words
    pub item: String,
    pub keywords: Vec<String>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub last_calculated_at: DateTime<Utc>,
}

/// Case-folded union of two keyword sets, capped at `max`. Existing
/// keywords keep their slot; new ones append in first-seen order.
pub fn merge_keywords(existing: &[String], incoming: &[String], max: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(max);

    for keyword in existing.iter().chain(incoming.iter()) {
        if merged.len() >= max {
            break;
        }
        let folded = keyword.trim().to_lowercase();
        if folded.is_empty() {
            continue;
        }
        if !merged.contains(&folded) {
            merged.push(folded);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keywords_folds_case_and_dedupes() {
        let existing = vec!["React".to_string(), "hooks".to_string()];
        let incoming = vec!["REACT".to_string(), "jsx".to_string()];
        let merged = merge_keywords(&existing, &incoming, 20);
        assert_eq!(merged, vec!["react", "hooks", "jsx"]);
    }

    #[test]
    fn merge_keywords_respects_cap() {
        let existing: Vec<String> = (0..18).map(|i| format!("kw{i}")).collect();
        let incoming: Vec<String> = (18..25).map(|i| format!("kw{i}")).collect();
        let merged = merge_keywords(&existing, &incoming, 20);
        assert_eq!(merged.len(), 20);
        assert_eq!(merged[0], "kw0");
        assert_eq!(merged[19], "kw19");
    }

    #[test]
    fn merge_keywords_skips_blank_entries() {
        let existing = vec!["  ".to_string()];
        let incoming = vec!["rust".to_string(), "".to_string()];
        let merged = merge_keywords(&existing, &incoming, 20);
        assert_eq!(merged, vec!["rust"]);
    }
}
