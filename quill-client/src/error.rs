use std::fmt;

use crate::api;

/// Step of a comment deletion that failed
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeletePhase {
    /// Removing the replies below the comment
    Replies,

    /// Removing the comment itself, after its replies are gone
    Target,
}

impl fmt::Display for DeletePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePhase::Replies => f.write_str("replies"),
            DeletePhase::Target => f.write_str("comment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed loading comments: {0:#}")]
    FetchFailed(anyhow::Error),

    #[error("You must be logged in to do this")]
    Unauthorized,

    #[error("Only the author of a comment can delete it")]
    Forbidden,

    #[error("Failed deleting {phase}: {err:#}")]
    DeleteFailed {
        phase: DeletePhase,
        err: anyhow::Error,
    },

    #[error("Failed posting comment: {0:#}")]
    SubmitFailed(anyhow::Error),

    #[error(transparent)]
    Invalid(#[from] api::Error),
}

impl Error {
    pub fn delete_failed(phase: DeletePhase) -> impl FnOnce(anyhow::Error) -> Error {
        move |err| Error::DeleteFailed { phase, err }
    }

    /// Whether some replies may already be gone from the backend while the
    /// comment itself is still there
    pub fn partial_deletion(&self) -> bool {
        matches!(
            self,
            Error::DeleteFailed {
                phase: DeletePhase::Target,
                ..
            }
        )
    }
}
