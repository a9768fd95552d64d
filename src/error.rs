use thiserror::Error;

/// Validation failures from the mutation layer. These are returned, not
/// thrown: the orchestrator treats each one as terminal for that single
/// action and moves on to the next.
///
/// `FocusNotFound` covers both a genuinely missing id and an id owned by
/// another user, so callers cannot probe for foreign focuses.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("focus not found")]
    FocusNotFound,

    #[error("focus is already active")]
    AlreadyActive,

    #[error("focus is not active")]
    NotActive,

    #[error("focus ended too long ago to resume")]
    ResumeWindowExpired,

    #[error("cannot merge a focus with itself")]
    MergeSelf,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
