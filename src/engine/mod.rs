pub mod dedup;
pub mod driver;
pub mod guard;
pub mod mutation;
pub mod orchestrator;
pub mod policy;
pub mod reaper;
pub mod source;
pub mod window;

pub use dedup::DedupCache;
pub use driver::{BatchTickSummary, FocusBatchDriver};
pub use guard::{ProcessingGuard, ProcessingPermit};
pub use mutation::{BatchClock, FocusMutationEngine};
pub use orchestrator::{CycleOutcome, CycleSummary, FocusLifecycleOrchestrator, SkipReason};
pub use policy::{
    ClusteringContext, ClusteringDecisionPolicy, HeuristicPolicy, HeuristicPolicyConfig,
};
pub use reaper::InactivityReaper;
pub use source::AttentionSource;
pub use window::{select_window, AttentionWindow};
