//! Robber error types.

use eams_api::ApiError;
use thiserror::Error;

/// Errors that can occur while running or driving the robber.
#[derive(Debug, Error)]
pub enum RobberError {
    #[error("robber is already running")]
    AlreadyRunning,

    #[error("robber is not running")]
    NotRunning,

    #[error("no tokio runtime is available to run the robber loop")]
    NoRuntime,

    #[error("seat probe failed for lesson {lesson_id}: {source}")]
    ProbeFailed {
        lesson_id: i64,
        #[source]
        source: ApiError,
    },

    #[error("predicate rejected: {reason}")]
    PredicateRejected {
        reason: String,
        #[source]
        source: Option<ApiError>,
    },

    #[error("commit rejected: {reason}")]
    CommitRejected {
        reason: String,
        #[source]
        source: Option<ApiError>,
    },
}

impl RobberError {
    /// Whether the underlying client error was a session expiry. The
    /// caller has to obtain fresh cookies; the robber never does.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            RobberError::ProbeFailed { source, .. } => source.is_auth_expired(),
            RobberError::PredicateRejected { source, .. }
            | RobberError::CommitRejected { source, .. } => {
                source.as_ref().is_some_and(ApiError::is_auth_expired)
            }
            RobberError::AlreadyRunning | RobberError::NotRunning | RobberError::NoRuntime => false,
        }
    }
}

pub type RobberResult<T> = Result<T, RobberError>;
