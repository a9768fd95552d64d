use serde::{Deserialize, Serialize};

/// One proposed change to the user's focus set. Produced by the decision
/// policy, re-validated by the mutation engine before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecisionAction {
    Create {
        item: String,
        keywords: Vec<String>,
    },
    Update {
        focus_id: String,
        new_keywords: Vec<String>,
        new_item: Option<String>,
    },
    Merge {
        primary_id: String,
        secondary_id: String,
        merged_item: String,
    },
    End {
        focus_id: String,
        reason: Option<String>,
    },
    Resume {
        focus_id: String,
        new_keywords: Option<Vec<String>>,
    },
}
