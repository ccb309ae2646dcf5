//! Scripted `CourseSelectService` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use eams_api::{ApiError, ApiResult, CourseSelectService, OperationKind, OperationRequest, OperationResult};
use eams_core::SeatCount;

/// How one phase of the protocol should behave for a lesson.
#[derive(Debug, Clone)]
pub enum Step {
    Accept,
    Reject(String),
    /// `success = false` without an error message.
    RejectSilently,
    /// The submission itself fails with an expired session.
    SubmitFails,
    /// Report "no verdict yet" this many times, then accept.
    Pending(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(i64),
    SubmitPredicate(i64),
    PollPredicate(i64),
    SubmitCommit(i64),
    PollCommit(i64),
}

#[derive(Default)]
struct Inner {
    seats: HashMap<i64, SeatCount>,
    scripts: HashMap<i64, (Step, Step)>,
    pending: HashMap<String, u32>,
    calls: Vec<Call>,
    drops: usize,
}

/// Seat counts and protocol verdicts are configured per lesson. Lessons
/// without seats configured fail to probe; lessons without a script
/// accept both phases.
#[derive(Default)]
pub struct ScriptedService {
    inner: Mutex<Inner>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seats(&self, lesson_id: i64, capacity: i64, occupied: i64) {
        self.inner
            .lock()
            .unwrap()
            .seats
            .insert(lesson_id, SeatCount::new(capacity, occupied));
    }

    pub fn script(&self, lesson_id: i64, predicate: Step, commit: Step) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert(lesson_id, (predicate, commit));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn drop_requests(&self) -> usize {
        self.inner.lock().unwrap().drops
    }

    fn step_for(&self, lesson_id: i64, commit: bool) -> Step {
        let inner = self.inner.lock().unwrap();
        match inner.scripts.get(&lesson_id) {
            Some((p, c)) => if commit { c.clone() } else { p.clone() },
            None => Step::Accept,
        }
    }

    fn submit(&self, request: &OperationRequest, commit: bool) -> ApiResult<String> {
        let step = self.step_for(request.lesson_id, commit);
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(if commit {
            Call::SubmitCommit(request.lesson_id)
        } else {
            Call::SubmitPredicate(request.lesson_id)
        });
        if request.kind == OperationKind::Drop {
            inner.drops += 1;
        }
        if let Step::SubmitFails = step {
            return Err(ApiError::AuthExpired { status: 401 });
        }
        let prefix = if commit { "c" } else { "p" };
        Ok(format!("{prefix}-{}", request.lesson_id))
    }

    fn poll(&self, tracking_id: &str, commit: bool) -> ApiResult<Option<OperationResult>> {
        let lesson_id: i64 = tracking_id[2..].parse().unwrap();
        let step = self.step_for(lesson_id, commit);
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(if commit {
            Call::PollCommit(lesson_id)
        } else {
            Call::PollPredicate(lesson_id)
        });

        let verdict = match step {
            Step::Accept | Step::SubmitFails => OperationResult::accepted(),
            Step::Reject(reason) => OperationResult::rejected(reason),
            Step::RejectSilently => OperationResult {
                success: false,
                reason: None,
            },
            Step::Pending(times) => {
                let seen = inner.pending.entry(tracking_id.to_string()).or_insert(0);
                if *seen < times {
                    *seen += 1;
                    return Ok(None);
                }
                OperationResult::accepted()
            }
        };
        Ok(Some(verdict))
    }
}

#[async_trait]
impl CourseSelectService for ScriptedService {
    async fn seat_count(&self, lesson_id: i64) -> ApiResult<SeatCount> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Probe(lesson_id));
        inner.seats.get(&lesson_id).copied().ok_or(ApiError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }

    async fn submit_predicate(&self, request: &OperationRequest) -> ApiResult<String> {
        self.submit(request, false)
    }

    async fn poll_predicate_result(
        &self,
        _student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        self.poll(tracking_id, false)
    }

    async fn submit_commit(&self, request: &OperationRequest) -> ApiResult<String> {
        self.submit(request, true)
    }

    async fn poll_commit_result(
        &self,
        _student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        self.poll(tracking_id, true)
    }
}
