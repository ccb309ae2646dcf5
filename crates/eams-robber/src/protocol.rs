//! Two-phase enrollment protocol.
//!
//! The service requires every add or drop to be validated before it is
//! committed. Each phase is a submission that returns a tracking id,
//! followed by polling that id until a verdict appears:
//!
//! ```text
//! Idle ─submit predicate─► PredicateSubmitted ─verdict ok─► PredicateValidated
//!   │                           │
//!   └──── PredicateRejected ◄───┘
//!
//! PredicateValidated ─submit commit─► CommitSubmitted ─verdict ok─► Committed
//!   │                                   │
//!   └──────── CommitRejected ◄──────────┘
//! ```
//!
//! The driver does not retry a rejected attempt. Retrying is the tick
//! loop's job.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use eams_api::{ApiError, CourseSelectService, OperationRequest, OperationResult};
use eams_core::config::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};

use crate::error::{RobberError, RobberResult};

const UNKNOWN_REASON: &str = "unknown error";
const POLL_TIMEOUT_REASON: &str = "timed out waiting for result";

/// Progress of a single add or drop attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    PredicateSubmitted { tracking_id: String },
    PredicateValidated,
    CommitSubmitted { tracking_id: String },
    Committed,
}

impl AttemptState {
    pub fn name(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::PredicateSubmitted { .. } => "predicate_submitted",
            AttemptState::PredicateValidated => "predicate_validated",
            AttemptState::CommitSubmitted { .. } => "commit_submitted",
            AttemptState::Committed => "committed",
        }
    }
}

/// How long to wait for a verdict after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between polls while the verdict is pending.
    pub interval: Duration,
    /// Give up once this much time has passed since the first poll.
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Predicate,
    Commit,
}

impl Phase {
    fn reject(self, reason: impl Into<String>, source: Option<ApiError>) -> RobberError {
        let reason = reason.into();
        match self {
            Phase::Predicate => RobberError::PredicateRejected { reason, source },
            Phase::Commit => RobberError::CommitRejected { reason, source },
        }
    }

    fn reject_api(self, err: ApiError) -> RobberError {
        self.reject(err.to_string(), Some(err))
    }
}

/// Runs validate-then-commit sequences against the service.
pub struct EnrollmentDriver<S> {
    service: Arc<S>,
    poll: PollSettings,
}

impl<S> Clone for EnrollmentDriver<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            poll: self.poll,
        }
    }
}

impl<S: CourseSelectService> EnrollmentDriver<S> {
    pub fn new(service: Arc<S>, poll: PollSettings) -> Self {
        Self { service, poll }
    }

    /// Validate and commit enrollment in one section.
    pub async fn try_add(
        &self,
        student_id: i64,
        turn_id: i64,
        lesson_id: i64,
        virtual_cost: i64,
    ) -> RobberResult<()> {
        self.run(OperationRequest::add(student_id, turn_id, lesson_id, virtual_cost))
            .await
    }

    /// Validate and commit dropping one section.
    pub async fn try_drop(&self, student_id: i64, turn_id: i64, lesson_id: i64) -> RobberResult<()> {
        self.run(OperationRequest::drop(student_id, turn_id, lesson_id))
            .await
    }

    /// Drive one attempt from `Idle` to `Committed` or a rejection.
    pub async fn run(&self, request: OperationRequest) -> RobberResult<()> {
        let mut state = AttemptState::Idle;
        loop {
            let next = self.step(&request, state).await?;
            debug!(
                kind = %request.kind,
                lesson_id = request.lesson_id,
                state = next.name(),
                "attempt advanced"
            );
            if next == AttemptState::Committed {
                info!(kind = %request.kind, lesson_id = request.lesson_id, "committed");
                return Ok(());
            }
            state = next;
        }
    }

    /// Perform the single transition out of `state`.
    pub async fn step(
        &self,
        request: &OperationRequest,
        state: AttemptState,
    ) -> RobberResult<AttemptState> {
        match state {
            AttemptState::Idle => {
                let tracking_id = self
                    .service
                    .submit_predicate(request)
                    .await
                    .map_err(|e| Phase::Predicate.reject_api(e))?;
                Ok(AttemptState::PredicateSubmitted { tracking_id })
            }
            AttemptState::PredicateSubmitted { tracking_id } => {
                self.await_verdict(Phase::Predicate, request.student_id, &tracking_id)
                    .await?;
                Ok(AttemptState::PredicateValidated)
            }
            AttemptState::PredicateValidated => {
                let tracking_id = self
                    .service
                    .submit_commit(request)
                    .await
                    .map_err(|e| Phase::Commit.reject_api(e))?;
                Ok(AttemptState::CommitSubmitted { tracking_id })
            }
            AttemptState::CommitSubmitted { tracking_id } => {
                self.await_verdict(Phase::Commit, request.student_id, &tracking_id)
                    .await?;
                Ok(AttemptState::Committed)
            }
            AttemptState::Committed => Ok(AttemptState::Committed),
        }
    }

    /// Poll until the verdict for `tracking_id` is in, then turn a
    /// negative verdict into the phase's rejection.
    async fn await_verdict(&self, phase: Phase, student_id: i64, tracking_id: &str) -> RobberResult<()> {
        let verdict = self.poll_until_terminal(phase, student_id, tracking_id).await?;
        if verdict.success {
            Ok(())
        } else {
            Err(phase.reject(
                verdict.reason.unwrap_or_else(|| UNKNOWN_REASON.to_string()),
                None,
            ))
        }
    }

    async fn poll_until_terminal(
        &self,
        phase: Phase,
        student_id: i64,
        tracking_id: &str,
    ) -> RobberResult<OperationResult> {
        // `None` when the timeout is too large to represent: wait forever.
        let deadline = Instant::now().checked_add(self.poll.timeout);
        loop {
            let polled = match phase {
                Phase::Predicate => {
                    self.service
                        .poll_predicate_result(student_id, tracking_id)
                        .await
                }
                Phase::Commit => self.service.poll_commit_result(student_id, tracking_id).await,
            };

            match polled {
                Ok(Some(verdict)) => return Ok(verdict),
                Ok(None) => {
                    if let Some(deadline) = deadline {
                        let next_poll = Instant::now().checked_add(self.poll.interval);
                        if next_poll.is_none_or(|next| next > deadline) {
                            return Err(phase.reject(POLL_TIMEOUT_REASON, None));
                        }
                    }
                    debug!(%tracking_id, "verdict pending");
                    tokio::time::sleep(self.poll.interval).await;
                }
                Err(e) => return Err(phase.reject_api(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, ScriptedService, Step};

    fn driver(service: &Arc<ScriptedService>) -> EnrollmentDriver<ScriptedService> {
        EnrollmentDriver::new(
            Arc::clone(service),
            PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_millis(200),
            },
        )
    }

    #[tokio::test]
    async fn add_runs_all_four_steps() {
        let service = Arc::new(ScriptedService::new());
        driver(&service).try_add(1001, 7, 12, 5).await.unwrap();

        assert_eq!(
            service.calls(),
            vec![
                Call::SubmitPredicate(12),
                Call::PollPredicate(12),
                Call::SubmitCommit(12),
                Call::PollCommit(12),
            ]
        );
    }

    #[tokio::test]
    async fn drop_uses_same_sequence() {
        let service = Arc::new(ScriptedService::new());
        driver(&service).try_drop(1001, 7, 12).await.unwrap();
        assert_eq!(service.calls().len(), 4);
        assert_eq!(service.drop_requests(), 2);
    }

    #[tokio::test]
    async fn predicate_rejection_stops_before_commit() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Reject("时间冲突".to_string()), Step::Accept);

        let err = driver(&service).try_add(1001, 7, 12, 0).await.unwrap_err();
        match err {
            RobberError::PredicateRejected { reason, source } => {
                assert_eq!(reason, "时间冲突");
                assert!(source.is_none());
            }
            other => panic!("expected PredicateRejected, got {other:?}"),
        }
        assert!(!service.calls().contains(&Call::SubmitCommit(12)));
    }

    #[tokio::test]
    async fn missing_reason_is_synthesized() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Accept, Step::RejectSilently);

        let err = driver(&service).try_add(1001, 7, 12, 0).await.unwrap_err();
        assert!(matches!(
            err,
            RobberError::CommitRejected { ref reason, .. } if reason == "unknown error"
        ));
    }

    #[tokio::test]
    async fn submit_failure_is_classified_by_phase() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::SubmitFails, Step::Accept);
        let err = driver(&service).try_add(1001, 7, 12, 0).await.unwrap_err();
        assert!(matches!(err, RobberError::PredicateRejected { source: Some(_), .. }));
        assert!(err.is_auth_expired());

        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Accept, Step::SubmitFails);
        let err = driver(&service).try_add(1001, 7, 12, 0).await.unwrap_err();
        assert!(matches!(err, RobberError::CommitRejected { source: Some(_), .. }));
    }

    #[tokio::test]
    async fn pending_verdict_is_polled_again() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Pending(3), Step::Accept);

        driver(&service).try_add(1001, 7, 12, 0).await.unwrap();
        let predicate_polls = service
            .calls()
            .iter()
            .filter(|c| **c == Call::PollPredicate(12))
            .count();
        assert_eq!(predicate_polls, 4);
    }

    #[tokio::test]
    async fn pending_forever_times_out() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Accept, Step::Pending(u32::MAX));

        let driver = EnrollmentDriver::new(
            Arc::clone(&service),
            PollSettings {
                interval: Duration::from_millis(5),
                timeout: Duration::from_millis(20),
            },
        );
        let err = driver.try_add(1001, 7, 12, 0).await.unwrap_err();
        assert!(matches!(
            err,
            RobberError::CommitRejected { ref reason, .. } if reason == "timed out waiting for result"
        ));
    }

    #[tokio::test]
    async fn huge_poll_timeout_does_not_overflow() {
        let service = Arc::new(ScriptedService::new());
        service.script(12, Step::Pending(2), Step::Accept);

        let driver = EnrollmentDriver::new(
            Arc::clone(&service),
            PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_secs(u64::MAX / 2),
            },
        );
        driver.try_add(1001, 7, 12, 0).await.unwrap();
    }

    #[tokio::test]
    async fn step_walks_the_state_machine() {
        let service = Arc::new(ScriptedService::new());
        let driver = driver(&service);
        let req = OperationRequest::add(1001, 7, 12, 0);

        let s1 = driver.step(&req, AttemptState::Idle).await.unwrap();
        assert!(matches!(s1, AttemptState::PredicateSubmitted { .. }));
        let s2 = driver.step(&req, s1).await.unwrap();
        assert_eq!(s2, AttemptState::PredicateValidated);
        let s3 = driver.step(&req, s2).await.unwrap();
        assert!(matches!(s3, AttemptState::CommitSubmitted { .. }));
        let s4 = driver.step(&req, s3).await.unwrap();
        assert_eq!(s4, AttemptState::Committed);
        assert_eq!(s4.name(), "committed");
    }
}
